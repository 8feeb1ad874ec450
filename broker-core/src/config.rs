//! Minimal environment-variable configuration loader (spec.md §6).
//!
//! Configuration loading is explicitly out of scope for the broker's
//! core per spec.md §1, but the binaries still need *something* to read
//! the documented options from; this is grounded on the teacher's
//! smallest env-driven constructor,
//! `mixtape_anthropic_sdk::Anthropic::from_env`.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BrokerError, BrokerResult};

/// One provider registration read from the environment: a name, an
/// adapter-kind tag (spec.md §4.3.d), and the kind-specific fields the
/// matching adapter config expects, still keyed by their bare field name
/// (e.g. `"base_url"`, `"client_id"`) so the caller can assemble the JSON
/// blob `registry::factory::build_adapter` expects.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: String,
    pub options: HashMap<String, String>,
}

/// Broker-wide configuration, read once at startup and never mutated
/// (spec.md §9, "Global state").
#[derive(Debug, Clone)]
pub struct Config {
    pub token_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub default_provider: Option<String>,
    pub cloud_default_access_key: Option<String>,
    pub cloud_default_secret: Option<String>,
    pub cloud_default_region: String,
    pub executor_url: String,
    pub proxy_callback_url: String,
    /// One entry per name listed in `PROVIDERS`, ready to build an
    /// adapter from via `registry::factory::build_adapter`.
    pub provider_options: Vec<ProviderConfig>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Providers are declared with `PROVIDERS=<name>[,<name>...]`; each
    /// name `N` then requires `<N>_KIND` (one of `aggregator_a`,
    /// `aggregator_b`, `direct_mcp`, matching [`AdapterKind::parse`]) plus
    /// whatever other `<N>_*` fields that kind's config struct needs
    /// (e.g. `<N>_BASE_URL`, `<N>_CLIENT_ID`). The provider name itself is
    /// matched case-insensitively against its env prefix.
    ///
    /// [`AdapterKind::parse`]: ../../broker_providers/adapter/enum.AdapterKind.html
    pub fn from_env() -> BrokerResult<Self> {
        let token_secret = std::env::var("TOKEN_SECRET").map_err(|_| {
            BrokerError::Internal("TOKEN_SECRET environment variable is required".to_string())
        })?;

        let token_ttl = std::env::var("TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));

        let default_provider = std::env::var("DEFAULT_PROVIDER").ok().filter(|v| v != "auto");

        let cloud_default_region =
            std::env::var("CLOUD_DEFAULT_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        let executor_url = std::env::var("EXECUTOR_URL").unwrap_or_default();
        let proxy_callback_url = std::env::var("PROXY_CALLBACK_URL").unwrap_or_default();

        let env: HashMap<String, String> = std::env::vars().collect();
        let provider_options = Self::parse_provider_options(&env)?;

        Ok(Self {
            token_secret: token_secret.into_bytes(),
            token_ttl,
            default_provider,
            cloud_default_access_key: std::env::var("CLOUD_DEFAULT_ACCESS_KEY").ok(),
            cloud_default_secret: std::env::var("CLOUD_DEFAULT_SECRET").ok(),
            cloud_default_region,
            executor_url,
            proxy_callback_url,
            provider_options,
        })
    }

    fn parse_provider_options(env: &HashMap<String, String>) -> BrokerResult<Vec<ProviderConfig>> {
        let names: Vec<String> = env
            .get("PROVIDERS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        names
            .into_iter()
            .map(|name| {
                let prefix = format!("{}_", name.to_uppercase());
                let kind = env
                    .get(&format!("{prefix}KIND"))
                    .cloned()
                    .ok_or_else(|| {
                        BrokerError::InvalidArgument(format!(
                            "provider '{name}' is listed in PROVIDERS but has no {prefix}KIND"
                        ))
                    })?;

                let options = env
                    .iter()
                    .filter_map(|(key, value)| {
                        let field = key.strip_prefix(&prefix)?;
                        if field == "KIND" {
                            return None;
                        }
                        Some((field.to_lowercase(), value.clone()))
                    })
                    .collect();

                Ok(ProviderConfig { name, kind, options })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_provider_options_groups_fields_by_provider_prefix() {
        let mut env = HashMap::new();
        env.insert("PROVIDERS".to_string(), "aggA, aggB".to_string());
        env.insert("AGGA_KIND".to_string(), "aggregator_a".to_string());
        env.insert("AGGA_BASE_URL".to_string(), "https://a.example".to_string());
        env.insert("AGGA_CLIENT_ID".to_string(), "id-a".to_string());
        env.insert("AGGB_KIND".to_string(), "aggregator_b".to_string());
        env.insert("AGGB_BASE_URL".to_string(), "https://b.example".to_string());
        env.insert("AGGB_API_KEY".to_string(), "key-b".to_string());

        let mut configs = Config::parse_provider_options(&env).unwrap();
        configs.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].name, "aggA");
        assert_eq!(configs[0].kind, "aggregator_a");
        assert_eq!(configs[0].options.get("base_url").unwrap(), "https://a.example");
        assert_eq!(configs[0].options.get("client_id").unwrap(), "id-a");
        assert_eq!(configs[1].name, "aggB");
        assert_eq!(configs[1].kind, "aggregator_b");
        assert_eq!(configs[1].options.get("api_key").unwrap(), "key-b");
    }

    #[test]
    fn parse_provider_options_fails_when_kind_is_missing() {
        let mut env = HashMap::new();
        env.insert("PROVIDERS".to_string(), "aggA".to_string());
        env.insert("AGGA_BASE_URL".to_string(), "https://a.example".to_string());

        let err = Config::parse_provider_options(&env).unwrap_err();
        assert_eq!(err.kind(), "invalid-argument");
    }

    #[test]
    fn parse_provider_options_defaults_to_empty_when_providers_unset() {
        let env = HashMap::new();
        assert!(Config::parse_provider_options(&env).unwrap().is_empty());
    }
}
