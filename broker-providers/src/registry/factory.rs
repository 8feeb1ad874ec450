//! Builds a concrete adapter from a kind tag plus a JSON config blob
//! (spec.md §4.3.d). An unknown kind tag, or a config blob that doesn't
//! match the kind's expected shape, fails at construction time rather
//! than lazily on first use.

use std::sync::Arc;

use broker_core::error::{BrokerError, BrokerResult};
use serde_json::Value;

use crate::adapter::{
    AdapterKind, AggregatorAAdapter, AggregatorAConfig, AggregatorBAdapter, AggregatorBConfig,
    DirectMcpAdapter, DirectMcpConfig, ProviderAdapter, TokenProvider,
};

/// Construct an adapter for `kind` from `config`. `direct_mcp` additionally
/// requires a `token_provider`, since its per-user token comes from a
/// callback rather than from the config blob; omitting one for a
/// `direct_mcp` kind is a construction error.
pub fn build_adapter(
    kind: AdapterKind,
    config: Value,
    token_provider: Option<TokenProvider>,
) -> BrokerResult<Arc<dyn ProviderAdapter>> {
    match kind {
        AdapterKind::AggregatorA => {
            let config: AggregatorAConfig = serde_json::from_value(config).map_err(|e| {
                BrokerError::InvalidArgument(format!("aggregator_a config: {e}"))
            })?;
            Ok(Arc::new(AggregatorAAdapter::new(config)))
        }
        AdapterKind::AggregatorB => {
            let config: AggregatorBConfig = serde_json::from_value(config).map_err(|e| {
                BrokerError::InvalidArgument(format!("aggregator_b config: {e}"))
            })?;
            Ok(Arc::new(AggregatorBAdapter::new(config)))
        }
        AdapterKind::DirectMcp => {
            let config: DirectMcpConfig = serde_json::from_value(config).map_err(|e| {
                BrokerError::InvalidArgument(format!("direct_mcp config: {e}"))
            })?;
            let token_provider = token_provider.ok_or_else(|| {
                BrokerError::InvalidArgument(
                    "direct_mcp adapter requires a token provider".to_string(),
                )
            })?;
            Ok(Arc::new(DirectMcpAdapter::new(config, token_provider)))
        }
    }
}

/// Parse a kind tag and build the adapter in one step. Returns
/// `invalid-argument` for an unrecognized tag.
pub fn build_from_tag(
    kind_tag: &str,
    config: Value,
    token_provider: Option<TokenProvider>,
) -> BrokerResult<Arc<dyn ProviderAdapter>> {
    let kind = AdapterKind::parse(kind_tag)
        .ok_or_else(|| BrokerError::InvalidArgument(format!("unknown adapter kind '{kind_tag}'")))?;
    build_adapter(kind, config, token_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_kind_tag_fails_at_construction() {
        let err = build_from_tag("not_a_real_kind", json!({}), None).unwrap_err();
        assert_eq!(err.kind(), "invalid-argument");
    }

    #[test]
    fn aggregator_a_builds_from_matching_config() {
        let config = json!({
            "name": "aggA",
            "base_url": "https://agg-a.example.com",
            "client_id": "id",
            "client_secret": "secret",
            "project_id": "proj",
            "environment": "prod",
        });
        let adapter = build_adapter(AdapterKind::AggregatorA, config, None).unwrap();
        assert_eq!(adapter.info().name, "aggA");
    }

    #[test]
    fn aggregator_a_fails_on_mismatched_config_shape() {
        let err = build_adapter(AdapterKind::AggregatorA, json!({"unrelated": true}), None)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid-argument");
    }

    #[test]
    fn direct_mcp_requires_a_token_provider() {
        let config = json!({ "name": "hosted", "base_url": "https://hosted.example.com" });
        let err = build_adapter(AdapterKind::DirectMcp, config, None).unwrap_err();
        assert_eq!(err.kind(), "invalid-argument");
    }
}
