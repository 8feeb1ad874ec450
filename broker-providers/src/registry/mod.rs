//! Provider Registry (C4): name-keyed collection of adapters that is
//! itself substitutable for a single adapter (spec.md §4.4/§9).

pub mod address;
pub mod bootstrap;
pub mod factory;
pub mod fanout;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use broker_core::error::{BrokerError, BrokerResult};
use broker_core::types::{ConnectToken, ConnectedApp, ToolCallOutcome, ToolDescriptor};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::adapter::{ProviderAdapter, ProviderInfo};

/// Registry of provider adapters. Mutations (register / set-default) take
/// an exclusive lock; reads snapshot the map under a shared lock before
/// making any outbound call, so upstream calls never hold the registry
/// lock (spec.md §4.4, "Connection safety").
pub struct ProviderRegistry {
    adapters: RwLock<BTreeMap<String, Arc<dyn ProviderAdapter>>>,
    default_provider: RwLock<Option<String>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            adapters: RwLock::new(BTreeMap::new()),
            default_provider: RwLock::new(None),
        }
    }

    /// Insert a ready-built adapter under `name`. Rejects duplicate names.
    pub async fn register(&self, name: &str, adapter: Arc<dyn ProviderAdapter>) -> BrokerResult<()> {
        let mut adapters = self.adapters.write().await;
        if adapters.contains_key(name) {
            return Err(BrokerError::InvalidArgument(format!(
                "provider '{name}' is already registered"
            )));
        }
        adapters.insert(name.to_string(), adapter);
        Ok(())
    }

    /// Set the default provider used for addresses with no `provider:`
    /// prefix. Rejects unknown names.
    pub async fn set_default(&self, name: &str) -> BrokerResult<()> {
        let adapters = self.adapters.read().await;
        if !adapters.contains_key(name) {
            return Err(BrokerError::InvalidArgument(format!(
                "cannot set default to unregistered provider '{name}'"
            )));
        }
        drop(adapters);
        *self.default_provider.write().await = Some(name.to_string());
        Ok(())
    }

    /// Registered provider names, sorted (spec.md §8: "Infos() contains
    /// p exactly once and in sorted order").
    pub async fn names(&self) -> Vec<String> {
        self.adapters.read().await.keys().cloned().collect()
    }

    pub async fn infos(&self) -> Vec<ProviderInfo> {
        self.adapters
            .read()
            .await
            .values()
            .map(|adapter| adapter.info())
            .collect()
    }

    async fn resolve(&self, addr: &str) -> BrokerResult<(String, Arc<dyn ProviderAdapter>)> {
        let parsed = address::parse(addr);
        let adapters = self.adapters.read().await;
        let default_provider = self.default_provider.read().await.clone();

        let provider_name = address::resolve(
            &parsed,
            |name| adapters.contains_key(name),
            default_provider.as_deref(),
        )?;

        let adapter = adapters
            .get(&provider_name)
            .cloned()
            .ok_or_else(|| BrokerError::ProviderUnavailable(provider_name.clone()))?;

        Ok((provider_name, adapter))
    }

    /// List tools for `addr` (`provider:app` or bare `app`), decorating
    /// each tool's description with `[provider-name]` to disambiguate
    /// duplicate tool names across adapters. The name itself is never
    /// rewritten (spec.md §4.3, "Tie-break and decoration rules").
    pub async fn list_tools(&self, user_id: &str, addr: &str) -> BrokerResult<Vec<ToolDescriptor>> {
        let (provider_name, adapter) = self.resolve(addr).await?;
        let app = address::parse(addr).app;
        let tools = adapter.list_tools(user_id, &app).await?;
        Ok(tools
            .into_iter()
            .map(|mut tool| {
                tool.description = format!("[{provider_name}] {}", tool.description);
                tool
            })
            .collect())
    }

    pub async fn call_tool(
        &self,
        user_id: &str,
        addr: &str,
        tool_name: &str,
        arguments: Value,
    ) -> BrokerResult<ToolCallOutcome> {
        let (_, adapter) = self.resolve(addr).await?;
        let app = address::parse(addr).app;
        adapter.call_tool(user_id, &app, tool_name, arguments).await
    }

    /// Query every registered adapter concurrently (spec.md §4.4,
    /// "ListConnectedApps fan-out").
    pub async fn list_connected_apps(&self, user_id: &str) -> BrokerResult<Vec<ConnectedApp>> {
        let snapshot: Vec<(String, Arc<dyn ProviderAdapter>)> = self
            .adapters
            .read()
            .await
            .iter()
            .map(|(name, adapter)| (name.clone(), adapter.clone()))
            .collect();
        fanout::list_connected_apps_fanout(snapshot, user_id).await
    }

    /// Get a connect token/link from a specific provider.
    pub async fn get_connect_token_for(
        &self,
        provider_name: &str,
        user_id: &str,
        success_redirect: Option<&str>,
        error_redirect: Option<&str>,
    ) -> BrokerResult<ConnectToken> {
        let adapter = self
            .adapters
            .read()
            .await
            .get(provider_name)
            .cloned()
            .ok_or_else(|| BrokerError::NotFound(format!("no provider '{provider_name}'")))?;
        adapter
            .get_connect_token(user_id, success_redirect, error_redirect)
            .await
    }
}

/// The registry itself satisfies the adapter surface (spec.md §4.4/§9),
/// substitutable for a single adapter. `app_slug`/addressing follows the
/// same `provider:app` convention as the explicit registry methods
/// above; `get_connect_token` uses the default provider since the trait
/// carries no app/provider parameter — callers that need an explicit
/// provider should use [`ProviderRegistry::get_connect_token_for`].
#[async_trait]
impl ProviderAdapter for ProviderRegistry {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "registry".to_string(),
            kind: crate::adapter::AdapterKind::DirectMcp,
            description: "Fan-out provider registry".to_string(),
            base_url: None,
            advertised_apps: None,
        }
    }

    async fn list_tools(&self, user_id: &str, app_slug: &str) -> BrokerResult<Vec<ToolDescriptor>> {
        ProviderRegistry::list_tools(self, user_id, app_slug).await
    }

    async fn call_tool(
        &self,
        user_id: &str,
        app_slug: &str,
        tool_name: &str,
        arguments: Value,
    ) -> BrokerResult<ToolCallOutcome> {
        ProviderRegistry::call_tool(self, user_id, app_slug, tool_name, arguments).await
    }

    async fn get_connect_token(
        &self,
        user_id: &str,
        success_redirect: Option<&str>,
        error_redirect: Option<&str>,
    ) -> BrokerResult<ConnectToken> {
        let default_provider = self.default_provider.read().await.clone().ok_or_else(|| {
            BrokerError::ProviderUnavailable("no default provider configured".to_string())
        })?;
        self.get_connect_token_for(&default_provider, user_id, success_redirect, error_redirect)
            .await
    }

    async fn list_connected_apps(&self, user_id: &str) -> BrokerResult<Vec<ConnectedApp>> {
        ProviderRegistry::list_connected_apps(self, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use broker_core::types::{ConnectToken, ToolCallOutcome, ToolDescriptor};

    struct StubAdapter {
        name: String,
    }

    #[async_trait]
    impl ProviderAdapter for StubAdapter {
        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: self.name.clone(),
                kind: crate::adapter::AdapterKind::AggregatorA,
                description: String::new(),
                base_url: None,
                advertised_apps: None,
            }
        }
        async fn list_tools(&self, _user_id: &str, app_slug: &str) -> BrokerResult<Vec<ToolDescriptor>> {
            Ok(vec![ToolDescriptor {
                name: "send".to_string(),
                description: format!("send via {app_slug}"),
                input_schema: Value::Null,
            }])
        }
        async fn call_tool(
            &self,
            _user_id: &str,
            _app_slug: &str,
            _tool_name: &str,
            _arguments: Value,
        ) -> BrokerResult<ToolCallOutcome> {
            Ok(ToolCallOutcome {
                content: Value::Null,
                is_error: false,
            })
        }
        async fn get_connect_token(
            &self,
            _user_id: &str,
            _success_redirect: Option<&str>,
            _error_redirect: Option<&str>,
        ) -> BrokerResult<ConnectToken> {
            Ok(ConnectToken {
                token: Some("tok".to_string()),
                connect_link_url: None,
                expires_at: None,
            })
        }
        async fn list_connected_apps(&self, _user_id: &str) -> BrokerResult<Vec<ConnectedApp>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn register_rejects_duplicate_names() {
        let registry = ProviderRegistry::new();
        registry
            .register("aggA", Arc::new(StubAdapter { name: "aggA".into() }))
            .await
            .unwrap();
        let err = registry
            .register("aggA", Arc::new(StubAdapter { name: "aggA".into() }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid-argument");
    }

    #[tokio::test]
    async fn names_and_infos_are_sorted() {
        let registry = ProviderRegistry::new();
        registry
            .register("zeta", Arc::new(StubAdapter { name: "zeta".into() }))
            .await
            .unwrap();
        registry
            .register("alpha", Arc::new(StubAdapter { name: "alpha".into() }))
            .await
            .unwrap();
        assert_eq!(registry.names().await, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn set_default_rejects_unknown_name() {
        let registry = ProviderRegistry::new();
        let err = registry.set_default("nope").await.unwrap_err();
        assert_eq!(err.kind(), "invalid-argument");
    }

    #[tokio::test]
    async fn list_tools_decorates_description_without_renaming() {
        let registry = ProviderRegistry::new();
        registry
            .register("aggA", Arc::new(StubAdapter { name: "aggA".into() }))
            .await
            .unwrap();
        registry.set_default("aggA").await.unwrap();

        let tools = registry.list_tools("user-1", "gmail").await.unwrap();
        assert_eq!(tools[0].name, "send");
        assert_eq!(tools[0].description, "[aggA] send via gmail");
    }

    #[tokio::test]
    async fn bare_address_falls_back_to_default_provider() {
        let registry = ProviderRegistry::new();
        registry
            .register("aggA", Arc::new(StubAdapter { name: "aggA".into() }))
            .await
            .unwrap();
        registry.set_default("aggA").await.unwrap();

        let tools = registry.list_tools("user-1", "gmail").await.unwrap();
        assert_eq!(tools[0].description, "[aggA] send via gmail");
    }

    #[tokio::test]
    async fn no_provider_and_no_default_fails() {
        let registry = ProviderRegistry::new();
        let err = registry.list_tools("user-1", "gmail").await.unwrap_err();
        assert_eq!(err.kind(), "provider-unavailable");
    }
}
