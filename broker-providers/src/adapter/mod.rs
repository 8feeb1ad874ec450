//! Provider Adapter (C3): the uniform surface every back-end protocol
//! variant implements, per spec.md §4.3.

mod aggregator_a;
mod aggregator_b;
mod direct_mcp;
mod upstream_token_cache;

pub use aggregator_a::{AggregatorAAdapter, AggregatorAConfig};
pub use aggregator_b::{AggregatorBAdapter, AggregatorBConfig};
pub use direct_mcp::{DirectMcpAdapter, DirectMcpConfig, TokenProvider};
pub use upstream_token_cache::UpstreamTokenCache;

use async_trait::async_trait;
use broker_core::error::BrokerResult;
use broker_core::types::{ConnectToken, ConnectedApp, ToolCallOutcome, ToolDescriptor};
use serde::Serialize;
use serde_json::Value;

/// Static description of a provider, independent of any particular user.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub kind: AdapterKind,
    pub description: String,
    pub base_url: Option<String>,
    pub advertised_apps: Option<Vec<String>>,
}

/// The kind tag a provider adapter is constructed from (spec.md §4.3.d).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    AggregatorA,
    AggregatorB,
    DirectMcp,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::AggregatorA => "aggregator_a",
            AdapterKind::AggregatorB => "aggregator_b",
            AdapterKind::DirectMcp => "direct_mcp",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "aggregator_a" => Some(AdapterKind::AggregatorA),
            "aggregator_b" => Some(AdapterKind::AggregatorB),
            "direct_mcp" => Some(AdapterKind::DirectMcp),
            _ => None,
        }
    }
}

/// The capability set every adapter variant implements, and that the
/// registry itself also satisfies (spec.md §4.3/§4.4/§9).
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn info(&self) -> ProviderInfo;

    async fn list_tools(&self, user_id: &str, app_slug: &str) -> BrokerResult<Vec<ToolDescriptor>>;

    async fn call_tool(
        &self,
        user_id: &str,
        app_slug: &str,
        tool_name: &str,
        arguments: Value,
    ) -> BrokerResult<ToolCallOutcome>;

    async fn get_connect_token(
        &self,
        user_id: &str,
        success_redirect: Option<&str>,
        error_redirect: Option<&str>,
    ) -> BrokerResult<ConnectToken>;

    async fn list_connected_apps(&self, user_id: &str) -> BrokerResult<Vec<ConnectedApp>>;
}
