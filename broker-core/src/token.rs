//! Token Authority (C1): mint and verify short-lived scoped bearer tokens.
//!
//! Tokens are a compact `header.claims.signature` string, each part
//! URL-safe base64 with no padding. The header is the fixed object
//! `{"alg":"HS256"}`; `Verify` rejects any other `alg` before attempting
//! signature verification at all, which is the algorithm-substitution
//! defense called for in spec.md §4.1.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{BrokerError, BrokerResult};

type HmacSha256 = Hmac<Sha256>;

/// The wildcard scope, which subsumes every other scope (spec.md §6).
pub const SCOPE_WILDCARD: &str = "mcp:*";
pub const SCOPE_LIST_TOOLS: &str = "mcp:list_tools";
pub const SCOPE_CALL_TOOLS: &str = "mcp:call_tools";
pub const SCOPE_LIST_APPS: &str = "mcp:list_apps";
pub const SCOPE_CLOUD_CREDENTIALS: &str = "mcp:cloud_credentials";

/// The signing secret. Zeroized on drop since it is the only truly
/// process-wide secret the broker holds (spec.md §9, "Global state").
pub struct TokenSecret(Vec<u8>);

impl TokenSecret {
    /// Build a signing secret, requiring at least 32 bytes of entropy at
    /// construction (spec.md §4.1). The service must refuse to start
    /// otherwise.
    pub fn new(bytes: impl Into<Vec<u8>>) -> BrokerResult<Self> {
        let bytes = bytes.into();
        if bytes.len() < 32 {
            return Err(BrokerError::Internal(format!(
                "token secret must be at least 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }
}

impl Drop for TokenSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: &'static str,
}

/// Claims embedded in a session token (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub conversation_id: String,
    pub sandbox_id: String,
    pub scopes: Vec<String>,
    pub nonce: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub iss: String,
    pub sub: String,
}

impl Claims {
    /// True if `scope` is granted, either directly or via the wildcard.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope || s == SCOPE_WILDCARD)
    }
}

/// Mints and verifies session tokens. Stateless: no state survives beyond
/// the lifetime of an individual claim set (spec.md §4.1, "State machine").
pub struct TokenAuthority {
    secret: TokenSecret,
    ttl: Duration,
    issuer: String,
}

impl TokenAuthority {
    pub fn new(secret: TokenSecret, ttl: Duration, issuer: impl Into<String>) -> Self {
        Self {
            secret,
            ttl,
            issuer: issuer.into(),
        }
    }

    /// Issue a fresh token for `(user_id, conversation_id, sandbox_id)`
    /// carrying `scopes`. Fails only on entropy exhaustion.
    pub fn issue(
        &self,
        user_id: &str,
        conversation_id: &str,
        sandbox_id: &str,
        scopes: &[&str],
    ) -> BrokerResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let exp = now + chrono::Duration::from_std(self.ttl).map_err(|e| {
            BrokerError::Internal(format!("invalid token ttl: {e}"))
        })?;

        let mut nonce_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let claims = Claims {
            user_id: user_id.to_string(),
            conversation_id: conversation_id.to_string(),
            sandbox_id: sandbox_id.to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            nonce: hex::encode(nonce_bytes),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
        };

        let token = self.encode(&claims)?;
        Ok((token, exp))
    }

    fn encode(&self, claims: &Claims) -> BrokerResult<String> {
        let header = Header { alg: "HS256" };
        let header_json = serde_json::to_vec(&header)
            .map_err(|e| BrokerError::Internal(format!("header encode: {e}")))?;
        let claims_json = serde_json::to_vec(claims)
            .map_err(|e| BrokerError::Internal(format!("claims encode: {e}")))?;

        let header_b64 = URL_SAFE_NO_PAD.encode(&header_json);
        let claims_b64 = URL_SAFE_NO_PAD.encode(&claims_json);
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = HmacSha256::new_from_slice(&self.secret.0)
            .map_err(|e| BrokerError::Internal(format!("hmac init: {e}")))?;
        mac.update(signing_input.as_bytes());
        let sig = mac.finalize().into_bytes();
        let sig_b64 = URL_SAFE_NO_PAD.encode(sig);

        Ok(format!("{signing_input}.{sig_b64}"))
    }

    /// Parse, verify the signature, and check `nbf <= now < exp`. Rejects
    /// unknown signing algorithms without attempting verification.
    pub fn verify(&self, token: &str) -> BrokerResult<Claims> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header_b64, claims_b64, sig_b64] = parts.as_slice() else {
            return Err(BrokerError::Unauthenticated(
                "malformed token".to_string(),
            ));
        };

        let header_json = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| BrokerError::Unauthenticated("malformed token header".to_string()))?;
        let header: Header = serde_json::from_slice(&header_json)
            .map_err(|_| BrokerError::Unauthenticated("malformed token header".to_string()))?;
        if header.alg != "HS256" {
            return Err(BrokerError::Unauthenticated(format!(
                "unsupported signing algorithm: {}",
                header.alg
            )));
        }

        let signing_input = format!("{header_b64}.{claims_b64}");
        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| BrokerError::Unauthenticated("malformed token signature".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(&self.secret.0)
            .map_err(|e| BrokerError::Internal(format!("hmac init: {e}")))?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&sig)
            .map_err(|_| BrokerError::Unauthenticated("invalid token signature".to_string()))?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| BrokerError::Unauthenticated("malformed token claims".to_string()))?;
        let claims: Claims = serde_json::from_slice(&claims_json)
            .map_err(|_| BrokerError::Unauthenticated("malformed token claims".to_string()))?;

        let now = Utc::now().timestamp();
        if now < claims.nbf || now >= claims.exp {
            return Err(BrokerError::Unauthenticated("token expired".to_string()));
        }

        Ok(claims)
    }

    /// As `verify`, additionally rejecting tokens lacking `scope` (and
    /// lacking the wildcard).
    pub fn verify_with_scope(&self, token: &str, scope: &str) -> BrokerResult<Claims> {
        let claims = self.verify(token)?;
        if !claims.has_scope(scope) {
            return Err(BrokerError::Forbidden(format!(
                "token missing required scope: {scope}"
            )));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> TokenAuthority {
        let secret = TokenSecret::new(vec![7u8; 32]).unwrap();
        TokenAuthority::new(secret, Duration::from_secs(300), "dynamiq-broker")
    }

    #[test]
    fn secret_too_short_is_rejected() {
        assert!(TokenSecret::new(vec![1u8; 31]).is_err());
        assert!(TokenSecret::new(vec![1u8; 32]).is_ok());
    }

    #[test]
    fn issue_then_verify_round_trips_claims() {
        let auth = authority();
        let (token, expires_at) = auth
            .issue("user-1", "conv-1", "sb-1", &[SCOPE_LIST_TOOLS])
            .unwrap();
        let claims = auth.verify(&token).unwrap();
        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.conversation_id, "conv-1");
        assert_eq!(claims.sandbox_id, "sb-1");
        assert_eq!(claims.scopes, vec![SCOPE_LIST_TOOLS.to_string()]);
        assert_eq!(claims.exp, expires_at.timestamp());
        assert_eq!(claims.iss, "dynamiq-broker");
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn verify_with_scope_rejects_missing_scope() {
        let auth = authority();
        let (token, _) = auth
            .issue("user-1", "conv-1", "sb-1", &[SCOPE_CALL_TOOLS])
            .unwrap();
        let err = auth.verify_with_scope(&token, SCOPE_LIST_TOOLS).unwrap_err();
        assert_eq!(err.kind(), "forbidden");
    }

    #[test]
    fn wildcard_scope_satisfies_any_request() {
        let auth = authority();
        let (token, _) = auth
            .issue("user-1", "conv-1", "sb-1", &[SCOPE_WILDCARD])
            .unwrap();
        assert!(auth.verify_with_scope(&token, SCOPE_LIST_TOOLS).is_ok());
        assert!(auth.verify_with_scope(&token, SCOPE_CALL_TOOLS).is_ok());
    }

    #[test]
    fn rejects_tampered_signature() {
        let auth = authority();
        let (token, _) = auth.issue("u", "c", "s", &[SCOPE_WILDCARD]).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(auth.verify(&tampered).is_err());
    }

    #[test]
    fn rejects_unknown_algorithm() {
        let auth = authority();
        let claims_json = serde_json::json!({
            "user_id": "u", "conversation_id": "c", "sandbox_id": "s",
            "scopes": [SCOPE_WILDCARD], "nonce": "ab", "exp": 9999999999i64,
            "iat": 0, "nbf": 0, "iss": "x", "sub": "u"
        });
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let claims = URL_SAFE_NO_PAD.encode(claims_json.to_string());
        let forged = format!("{header}.{claims}.sig");
        let err = auth.verify(&forged).unwrap_err();
        assert_eq!(err.kind(), "unauthenticated");
    }

    #[test]
    fn two_issuances_never_reuse_a_nonce() {
        let auth = authority();
        let (t1, _) = auth.issue("u", "c", "s", &[SCOPE_WILDCARD]).unwrap();
        let (t2, _) = auth.issue("u", "c", "s", &[SCOPE_WILDCARD]).unwrap();
        let c1 = auth.verify(&t1).unwrap();
        let c2 = auth.verify(&t2).unwrap();
        assert_ne!(c1.nonce, c2.nonce);
    }
}
