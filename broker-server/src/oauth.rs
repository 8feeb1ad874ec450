//! OAuth2 / Connect-link Broker (C9): per-integration OAuth2 handlers
//! plus delegation to an adapter's own connect-link flow (spec.md §4.9).
//!
//! State-parameter signing reuses the HMAC-SHA256 machinery C1 already
//! pulls in for session tokens, rather than introducing a second signing
//! primitive for a much smaller payload.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use broker_core::types::IntegrationSecret;
use broker_core::{BrokerError, BrokerResult, CredentialStore};
use broker_providers::ProviderRegistry;
use chrono::{Duration as ChronoDuration, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct OAuthHandlerConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatePayload {
    user_id: String,
    integration_id: String,
    nonce: String,
    iat: i64,
}

pub struct OAuthBroker {
    handlers: HashMap<String, OAuthHandlerConfig>,
    /// Integrations whose consent flow is delegated to an adapter,
    /// mapped to the provider name that owns them.
    delegated: HashMap<String, String>,
    state_secret: Vec<u8>,
    http: reqwest::Client,
    registry: Arc<ProviderRegistry>,
    credentials: Arc<CredentialStore>,
}

impl OAuthBroker {
    pub fn new(
        handlers: HashMap<String, OAuthHandlerConfig>,
        delegated: HashMap<String, String>,
        registry: Arc<ProviderRegistry>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        let mut state_secret = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut state_secret);
        Self {
            handlers,
            delegated,
            state_secret,
            http: reqwest::Client::new(),
            registry,
            credentials,
        }
    }

    fn sign_state(&self, user_id: &str, integration_id: &str) -> BrokerResult<String> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let payload = StatePayload {
            user_id: user_id.to_string(),
            integration_id: integration_id.to_string(),
            nonce: hex::encode(nonce_bytes),
            iat: Utc::now().timestamp(),
        };
        let payload_json = serde_json::to_vec(&payload)
            .map_err(|e| BrokerError::Internal(format!("state encode: {e}")))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload_json);

        let mut mac = HmacSha256::new_from_slice(&self.state_secret)
            .map_err(|e| BrokerError::Internal(format!("hmac init: {e}")))?;
        mac.update(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload_b64}.{sig_b64}"))
    }

    /// Verify a callback's `state`, rejecting anything older than 10
    /// minutes (generous relative to the 5-minute session-token TTL,
    /// since the user interacts with the identity provider in between).
    fn verify_state(&self, state: &str) -> BrokerResult<StatePayload> {
        let (payload_b64, sig_b64) = state
            .split_once('.')
            .ok_or_else(|| BrokerError::Unauthenticated("malformed oauth state".to_string()))?;

        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| BrokerError::Unauthenticated("malformed oauth state signature".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(&self.state_secret)
            .map_err(|e| BrokerError::Internal(format!("hmac init: {e}")))?;
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&sig)
            .map_err(|_| BrokerError::Unauthenticated("invalid oauth state signature".to_string()))?;

        let payload_json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| BrokerError::Unauthenticated("malformed oauth state payload".to_string()))?;
        let payload: StatePayload = serde_json::from_slice(&payload_json)
            .map_err(|_| BrokerError::Unauthenticated("malformed oauth state payload".to_string()))?;

        let age = Utc::now().timestamp() - payload.iat;
        if age < 0 || age > ChronoDuration::minutes(10).num_seconds() {
            return Err(BrokerError::Unauthenticated("oauth state expired".to_string()));
        }

        Ok(payload)
    }

    /// Produce the URL the caller should redirect the user to in order
    /// to begin consent for `integration_id`.
    pub async fn start_url(
        &self,
        integration_id: &str,
        user_id: &str,
        success_redirect: Option<&str>,
        error_redirect: Option<&str>,
    ) -> BrokerResult<String> {
        if let Some(provider_name) = self.delegated.get(integration_id) {
            let token = self
                .registry
                .get_connect_token_for(provider_name, user_id, success_redirect, error_redirect)
                .await?;
            return token.connect_link_url.ok_or_else(|| {
                BrokerError::UpstreamFailed(format!(
                    "provider {provider_name} returned no connect-link URL"
                ))
            });
        }

        let handler = self
            .handlers
            .get(integration_id)
            .ok_or_else(|| BrokerError::NotFound(format!("no oauth handler for {integration_id}")))?;

        let state = self.sign_state(user_id, integration_id)?;
        let scope = handler.scopes.join(" ");

        Ok(format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            handler.auth_url,
            urlencode(&handler.client_id),
            urlencode(&handler.redirect_url),
            urlencode(&scope),
            urlencode(&state),
        ))
    }

    /// Validate `state`, exchange `code` for tokens, and persist the
    /// result via the Credential Store.
    pub async fn handle_callback(
        &self,
        integration_id: &str,
        code: &str,
        state: &str,
    ) -> BrokerResult<()> {
        let claims = self.verify_state(state)?;
        if claims.integration_id != integration_id {
            return Err(BrokerError::Forbidden(
                "oauth state does not match callback integration".to_string(),
            ));
        }

        let handler = self
            .handlers
            .get(integration_id)
            .ok_or_else(|| BrokerError::NotFound(format!("no oauth handler for {integration_id}")))?;

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            #[serde(default)]
            refresh_token: Option<String>,
            #[serde(default = "default_expires_in")]
            expires_in: i64,
            #[serde(default)]
            scope: Option<String>,
        }
        fn default_expires_in() -> i64 {
            3600
        }

        let response = self
            .http
            .post(&handler.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", handler.redirect_url.as_str()),
                ("client_id", handler.client_id.as_str()),
                ("client_secret", handler.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BrokerError::UpstreamFailed(format!("token exchange: {e}")))?;

        if !response.status().is_success() {
            return Err(BrokerError::UpstreamFailed(format!(
                "token exchange returned {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::UpstreamFailed(format!("token exchange body: {e}")))?;

        let scopes = body
            .scope
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_else(|| handler.scopes.clone());

        let secret = IntegrationSecret::OAuth2 {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_at: Utc::now() + ChronoDuration::seconds(body.expires_in),
            scopes,
        };

        self.credentials
            .put(&claims.user_id, integration_id, &secret, integration_id)?;

        Ok(())
    }
}

fn urlencode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_core::EncryptionKey;

    fn broker() -> OAuthBroker {
        let mut handlers = HashMap::new();
        handlers.insert(
            "gmail".to_string(),
            OAuthHandlerConfig {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                auth_url: "https://accounts.example.com/auth".to_string(),
                token_url: "https://accounts.example.com/token".to_string(),
                redirect_url: "https://broker.example.com/oauth/gmail/callback".to_string(),
                scopes: vec!["mail.read".to_string()],
            },
        );
        let registry = Arc::new(ProviderRegistry::new());
        let credentials = Arc::new(CredentialStore::new(EncryptionKey::new(vec![9u8; 32]).unwrap()));
        OAuthBroker::new(handlers, HashMap::new(), registry, credentials)
    }

    #[tokio::test]
    async fn start_url_embeds_a_verifiable_state() {
        let broker = broker();
        let url = broker.start_url("gmail", "user-1", None, None).await.unwrap();
        assert!(url.starts_with("https://accounts.example.com/auth?"));
        assert!(url.contains("state="));
    }

    #[tokio::test]
    async fn unknown_integration_fails_not_found() {
        let broker = broker();
        let err = broker
            .start_url("unknown", "user-1", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not-found");
    }

    #[test]
    fn verify_state_round_trips_sign_state() {
        let broker = broker();
        let state = broker.sign_state("user-1", "gmail").unwrap();
        let claims = broker.verify_state(&state).unwrap();
        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.integration_id, "gmail");
    }

    #[test]
    fn verify_state_rejects_tampered_signature() {
        let broker = broker();
        let mut state = broker.sign_state("user-1", "gmail").unwrap();
        state.push('x');
        assert!(broker.verify_state(&state).is_err());
    }

    #[tokio::test]
    async fn start_url_state_survives_a_real_callback_round_trip() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let token_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-1",
                "refresh_token": "rt-1",
                "expires_in": 3600,
                "scope": "mail.read",
            })))
            .mount(&token_server)
            .await;

        let mut handlers = HashMap::new();
        handlers.insert(
            "gmail".to_string(),
            OAuthHandlerConfig {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                auth_url: "https://accounts.example.com/auth".to_string(),
                token_url: format!("{}/token", token_server.uri()),
                redirect_url: "https://broker.example.com/oauth/gmail/callback".to_string(),
                scopes: vec!["mail.read".to_string()],
            },
        );
        let registry = Arc::new(ProviderRegistry::new());
        let credentials = Arc::new(CredentialStore::new(EncryptionKey::new(vec![9u8; 32]).unwrap()));
        let broker = OAuthBroker::new(handlers, HashMap::new(), registry, credentials);

        let url = broker.start_url("gmail", "user-1", None, None).await.unwrap();

        // Extract `state` the way a real redirect's query string would
        // arrive at the callback: percent-decoded, not re-decoded by us.
        let query = url.split_once('?').unwrap().1;
        let state = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("state="))
            .map(|raw| {
                percent_encoding::percent_decode_str(raw)
                    .decode_utf8()
                    .unwrap()
                    .into_owned()
            })
            .expect("start_url must embed a state parameter");

        broker.handle_callback("gmail", "auth-code", &state).await.unwrap();
    }

    #[test]
    fn verify_state_rejects_stale_payload() {
        let broker = broker();
        let payload = StatePayload {
            user_id: "user-1".to_string(),
            integration_id: "gmail".to_string(),
            nonce: "ab".to_string(),
            iat: Utc::now().timestamp() - ChronoDuration::minutes(20).num_seconds(),
        };
        let payload_json = serde_json::to_vec(&payload).unwrap();
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload_json);
        let mut mac = HmacSha256::new_from_slice(&broker.state_secret).unwrap();
        mac.update(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        let state = format!("{payload_b64}.{sig_b64}");

        let err = broker.verify_state(&state).unwrap_err();
        assert_eq!(err.kind(), "unauthenticated");
    }
}
