//! Shapes STS output into the `credential_process` JSON contract
//! (spec.md §4.5/§6): fixed `Version`, PascalCase keys, RFC3339
//! `Expiration`. Kept independent of the STS call itself so it is
//! unit-testable without a network client.

use broker_core::types::CredentialProcessOutput;
use chrono::{DateTime, Utc};

pub fn shape(
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: DateTime<Utc>,
) -> CredentialProcessOutput {
    CredentialProcessOutput {
        version: 1,
        access_key_id,
        secret_access_key,
        session_token,
        expiration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_fills_fixed_version() {
        let out = shape(
            "AKIA".to_string(),
            "secret".to_string(),
            "token".to_string(),
            Utc::now(),
        );
        assert_eq!(out.version, 1);
    }

    #[test]
    fn shape_serializes_with_pascal_case_keys() {
        let out = shape(
            "AKIA".to_string(),
            "secret".to_string(),
            "token".to_string(),
            Utc::now(),
        );
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("AccessKeyId").is_some());
        assert!(json.get("SecretAccessKey").is_some());
        assert!(json.get("SessionToken").is_some());
        assert!(json.get("Expiration").is_some());
        assert!(json.get("Version").is_some());
    }
}
