//! Builds every provider named in a [`Config`] and registers it into a
//! [`ProviderRegistry`] (spec.md §4.4, "Construction"). Kept separate from
//! `factory.rs` so it can be exercised without a running server: the
//! actual HTTP bootstrap in `broker-server::main` is a thin caller of
//! [`register_all`].
//!
//! [`Config`]: broker_core::config::Config

use std::collections::HashMap;
use std::sync::Arc;

use broker_core::config::ProviderConfig;
use broker_core::error::{BrokerError, BrokerResult};
use broker_core::types::IntegrationSecret;
use broker_core::CredentialStore;
use serde_json::Value;

use super::factory;
use super::ProviderRegistry;
use crate::adapter::TokenProvider;

/// A `direct_mcp` adapter's per-user token comes from the Credential
/// Store rather than its own config blob (spec.md §4.3.c). `integration_id`
/// defaults to the provider's own name unless a `<NAME>_INTEGRATION`
/// env var names a different stored credential to look up.
fn credential_store_token_provider(
    credentials: Arc<CredentialStore>,
    integration_id: String,
) -> TokenProvider {
    Arc::new(move |user_id: String| {
        let credentials = credentials.clone();
        let integration_id = integration_id.clone();
        Box::pin(async move {
            match credentials.get(&user_id, &integration_id)? {
                IntegrationSecret::OAuth2 { access_token, .. } => Ok(access_token),
                _ => Err(BrokerError::InvalidArgument(format!(
                    "stored credential for '{integration_id}' is not an OAuth2 secret"
                ))),
            }
        })
    })
}

fn config_value(provider: &ProviderConfig) -> BrokerResult<Value> {
    let mut options: HashMap<String, String> = provider.options.clone();
    options.insert("name".to_string(), provider.name.clone());
    serde_json::to_value(options)
        .map_err(|e| BrokerError::InvalidArgument(format!("provider '{}' options: {e}", provider.name)))
}

/// Build and register every provider in `configs`, in order, then set
/// `default_provider` if one is given. Fails on the first adapter that
/// doesn't build rather than starting the server with a partial
/// registry.
pub async fn register_all(
    registry: &ProviderRegistry,
    configs: &[ProviderConfig],
    credentials: &Arc<CredentialStore>,
    default_provider: Option<&str>,
) -> BrokerResult<()> {
    for provider in configs {
        let token_provider = if provider.kind == "direct_mcp" {
            let integration_id = provider
                .options
                .get("integration")
                .cloned()
                .unwrap_or_else(|| provider.name.clone());
            Some(credential_store_token_provider(credentials.clone(), integration_id))
        } else {
            None
        };

        let adapter = factory::build_from_tag(&provider.kind, config_value(provider)?, token_provider)?;
        registry.register(&provider.name, adapter).await?;
    }

    if let Some(default) = default_provider {
        registry.set_default(default).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_core::credential_store::EncryptionKey;

    fn provider(name: &str, kind: &str, options: &[(&str, &str)]) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            kind: kind.to_string(),
            options: options.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[tokio::test]
    async fn registers_every_configured_provider_and_sets_default() {
        let registry = ProviderRegistry::new();
        let credentials = Arc::new(CredentialStore::new(EncryptionKey::new(vec![1u8; 32]).unwrap()));

        let configs = vec![
            provider(
                "aggA",
                "aggregator_a",
                &[
                    ("base_url", "https://agg-a.example.com"),
                    ("client_id", "id"),
                    ("client_secret", "secret"),
                    ("project_id", "proj"),
                    ("environment", "prod"),
                ],
            ),
            provider(
                "aggB",
                "aggregator_b",
                &[("base_url", "https://agg-b.example.com"), ("api_key", "key")],
            ),
        ];

        register_all(&registry, &configs, &credentials, Some("aggA")).await.unwrap();

        let mut names = registry.names().await;
        names.sort();
        assert_eq!(names, vec!["aggA".to_string(), "aggB".to_string()]);
    }

    #[tokio::test]
    async fn unknown_kind_fails_bootstrap() {
        let registry = ProviderRegistry::new();
        let credentials = Arc::new(CredentialStore::new(EncryptionKey::new(vec![1u8; 32]).unwrap()));
        let configs = vec![provider("aggA", "not_a_real_kind", &[])];

        let err = register_all(&registry, &configs, &credentials, None).await.unwrap_err();
        assert_eq!(err.kind(), "invalid-argument");
    }

    #[tokio::test]
    async fn direct_mcp_gets_a_credential_store_backed_token_provider() {
        let registry = ProviderRegistry::new();
        let credentials = Arc::new(CredentialStore::new(EncryptionKey::new(vec![1u8; 32]).unwrap()));
        let configs = vec![provider(
            "hosted",
            "direct_mcp",
            &[("base_url", "https://hosted.example.com")],
        )];

        register_all(&registry, &configs, &credentials, None).await.unwrap();
        assert_eq!(registry.names().await, vec!["hosted".to_string()]);
    }
}
