//! Cloud Credential Vendor (C5): short-lived AWS credentials for a
//! sandbox, via STS AssumeRole or GetSessionToken (spec.md §4.5).

pub mod credential_process;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_sts::config::Region;
use aws_sdk_sts::Client as StsClient;
use broker_core::error::{BrokerError, BrokerResult};
use broker_core::types::{CloudCredentialConfig, CredentialProcessOutput};
use chrono::{DateTime, Utc};
use serde::Serialize;

const MIN_DURATION_SECS: i32 = 900;
const MAX_DURATION_SECS: i32 = 43_200;
const DEFAULT_DURATION_SECS: i32 = 3_600;

/// Identity summary returned by `WhoAmI` (spec.md §4.5, GetCallerIdentity).
#[derive(Debug, Clone, Serialize)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
    pub user_id: String,
}

pub struct CloudCredentialVendor {
    default_client: StsClient,
}

fn clamp_duration(requested: Option<u32>) -> i32 {
    let requested = requested.map(|d| d as i32).unwrap_or(DEFAULT_DURATION_SECS);
    requested.clamp(MIN_DURATION_SECS, MAX_DURATION_SECS)
}

const SESSION_NAME_PREFIX: &str = "dynamiq-";
const STS_SESSION_NAME_MAX: usize = 64;

/// Session name for an AssumeRole call: `dynamiq-` followed by as much
/// of the sandbox id as fits in STS's 64-character `RoleSessionName`
/// limit (spec.md §4.5, Scenario 4).
fn session_name(sandbox_id: &str) -> String {
    let cut = sandbox_id
        .len()
        .min(STS_SESSION_NAME_MAX - SESSION_NAME_PREFIX.len());
    format!("{SESSION_NAME_PREFIX}{}", &sandbox_id[..cut])
}

impl CloudCredentialVendor {
    /// Build from the default AWS credential chain, matching the pattern
    /// already used for the Bedrock provider.
    pub async fn new() -> BrokerResult<Self> {
        let sdk_config = aws_config::load_from_env().await;
        Ok(Self {
            default_client: StsClient::new(&sdk_config),
        })
    }

    async fn client_for(&self, config: &CloudCredentialConfig) -> StsClient {
        match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => {
                let credentials = Credentials::new(
                    access_key_id.clone(),
                    secret_access_key.clone(),
                    None,
                    None,
                    "dynamiq-broker-supplied",
                );
                let region = config
                    .region
                    .clone()
                    .map(Region::new)
                    .unwrap_or_else(|| Region::new("us-east-1"));
                let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(credentials)
                    .load()
                    .await;
                StsClient::new(&sdk_config)
            }
            _ => self.default_client.clone(),
        }
    }

    /// Vend short-lived credentials for `sandbox_id`. A role reference
    /// (`role_arn`) calls AssumeRole; its absence falls back to
    /// GetSessionToken against the resolved access-key pair or the
    /// default credential chain.
    pub async fn vend_for_sandbox(
        &self,
        config: &CloudCredentialConfig,
        sandbox_id: &str,
    ) -> BrokerResult<CredentialProcessOutput> {
        let duration = clamp_duration(config.duration_seconds);
        let client = self.client_for(config).await;

        if let Some(role_arn) = &config.role_arn {
            let mut request = client
                .assume_role()
                .role_arn(role_arn)
                .role_session_name(session_name(sandbox_id))
                .duration_seconds(duration);
            if let Some(external_id) = &config.external_id {
                request = request.external_id(external_id);
            }

            let response = request
                .send()
                .await
                .map_err(|e| BrokerError::UpstreamFailed(format!("assume role: {e}")))?;

            let creds = response
                .credentials()
                .ok_or_else(|| BrokerError::UpstreamFailed("assume role returned no credentials".into()))?;

            Ok(shape_from_sts(
                creds.access_key_id().to_string(),
                creds.secret_access_key().to_string(),
                creds.session_token().to_string(),
                creds.expiration(),
            )?)
        } else {
            let response = client
                .get_session_token()
                .duration_seconds(duration)
                .send()
                .await
                .map_err(|e| BrokerError::UpstreamFailed(format!("get session token: {e}")))?;

            let creds = response
                .credentials()
                .ok_or_else(|| BrokerError::UpstreamFailed("get session token returned no credentials".into()))?;

            Ok(shape_from_sts(
                creds.access_key_id().to_string(),
                creds.secret_access_key().to_string(),
                creds.session_token().to_string(),
                creds.expiration(),
            )?)
        }
    }

    /// Resolve the identity backing the default credential chain.
    pub async fn who_am_i(&self) -> BrokerResult<CallerIdentity> {
        let response = self
            .default_client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| BrokerError::UpstreamFailed(format!("get caller identity: {e}")))?;

        Ok(CallerIdentity {
            account: response.account().unwrap_or_default().to_string(),
            arn: response.arn().unwrap_or_default().to_string(),
            user_id: response.user_id().unwrap_or_default().to_string(),
        })
    }
}

fn shape_from_sts(
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: &aws_sdk_sts::primitives::DateTime,
) -> BrokerResult<CredentialProcessOutput> {
    let expiration: DateTime<Utc> = DateTime::from_timestamp(expiration.secs(), 0)
        .ok_or_else(|| BrokerError::Internal("invalid STS expiration timestamp".to_string()))?;
    Ok(credential_process::shape(
        access_key_id,
        secret_access_key,
        session_token,
        expiration,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_name_truncates_sandbox_id_to_56_chars() {
        let sandbox_id = "a".repeat(64);
        let name = session_name(&sandbox_id);
        assert_eq!(name, format!("dynamiq-{}", "a".repeat(56)));
        assert_eq!(name.len(), 64);
    }

    #[test]
    fn session_name_matches_scenario_4_literal_input() {
        let sandbox_id = format!("sb-{}", "a".repeat(64));
        assert_eq!(sandbox_id.len(), 67);
        let name = session_name(&sandbox_id);
        assert_eq!(name, format!("dynamiq-sb-{}", "a".repeat(53)));
        assert_eq!(name.len(), 64);
    }

    #[test]
    fn session_name_passes_short_ids_through() {
        assert_eq!(session_name("sb-1"), "dynamiq-sb-1");
    }

    #[test]
    fn clamp_duration_enforces_floor() {
        assert_eq!(clamp_duration(Some(60)), MIN_DURATION_SECS as u32 as i32);
    }

    #[test]
    fn clamp_duration_enforces_ceiling() {
        assert_eq!(clamp_duration(Some(100_000)), MAX_DURATION_SECS);
    }

    #[test]
    fn clamp_duration_defaults_to_one_hour() {
        assert_eq!(clamp_duration(None), DEFAULT_DURATION_SECS);
    }
}
