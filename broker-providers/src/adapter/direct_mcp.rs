//! Direct hosted-MCP adapter: a single first-party MCP endpoint whose
//! per-user access token comes from a `TokenProvider` callback supplied
//! at registration time, keeping this adapter decoupled from the
//! Credential Store and OAuth2 broker (spec.md §4.3.c/§9, "Cyclic
//! construction").

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use broker_core::error::{BrokerError, BrokerResult};
use broker_core::types::{ConnectToken, ConnectedApp, ToolCallOutcome, ToolDescriptor};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AdapterKind, ProviderAdapter, ProviderInfo};

/// Looks up the per-user OAuth2 access token for this endpoint. Injected
/// at construction time so the adapter never reaches into the Credential
/// Store directly.
pub type TokenProvider = Arc<
    dyn Fn(String) -> Pin<Box<dyn Future<Output = BrokerResult<String>> + Send>> + Send + Sync,
>;

#[derive(Clone, Deserialize)]
pub struct DirectMcpConfig {
    pub name: String,
    pub base_url: String,
}

pub struct DirectMcpAdapter {
    config: DirectMcpConfig,
    http: Client,
    token_provider: TokenProvider,
}

#[derive(Deserialize)]
struct JsonRpcFrame {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl DirectMcpAdapter {
    pub fn new(config: DirectMcpConfig, token_provider: TokenProvider) -> Self {
        Self {
            config,
            http: Client::new(),
            token_provider,
        }
    }

    async fn json_rpc(&self, user_id: &str, method: &str, params: Value) -> BrokerResult<Value> {
        let access_token = (self.token_provider)(user_id.to_string()).await?;

        let response = self
            .http
            .post(&self.config.base_url)
            .bearer_auth(access_token)
            .header("X-External-User-Id", user_id)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .map_err(|e| BrokerError::UpstreamFailed(format!("{method} request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BrokerError::UpstreamFailed(format!(
                "{method} returned {status}: {text}"
            )));
        }

        let frame: JsonRpcFrame = response
            .json()
            .await
            .map_err(|e| BrokerError::UpstreamFailed(format!("{method} body: {e}")))?;

        if let Some(error) = frame.error {
            return Err(BrokerError::UpstreamFailed(format!(
                "{method} returned an error: {error}"
            )));
        }

        frame.result.ok_or_else(|| {
            BrokerError::UpstreamFailed(format!("{method} response had neither result nor error"))
        })
    }
}

#[async_trait]
impl ProviderAdapter for DirectMcpAdapter {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.config.name.clone(),
            kind: AdapterKind::DirectMcp,
            description: "First-party hosted MCP endpoint".to_string(),
            base_url: Some(self.config.base_url.clone()),
            advertised_apps: None,
        }
    }

    async fn list_tools(&self, user_id: &str, _app_slug: &str) -> BrokerResult<Vec<ToolDescriptor>> {
        let result = self.json_rpc(user_id, "tools/list", json!({})).await?;

        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        tools
            .into_iter()
            .map(|tool| {
                Ok(ToolDescriptor {
                    name: tool
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| BrokerError::UpstreamFailed("tool missing name".into()))?
                        .to_string(),
                    description: tool
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    input_schema: tool.get("inputSchema").cloned().unwrap_or(json!({})),
                })
            })
            .collect()
    }

    async fn call_tool(
        &self,
        user_id: &str,
        _app_slug: &str,
        tool_name: &str,
        arguments: Value,
    ) -> BrokerResult<ToolCallOutcome> {
        let result = self
            .json_rpc(
                user_id,
                "tools/call",
                json!({ "name": tool_name, "arguments": arguments }),
            )
            .await?;

        Ok(ToolCallOutcome {
            is_error: result
                .get("isError")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            content: result.get("content").cloned().unwrap_or(json!(null)),
        })
    }

    async fn get_connect_token(
        &self,
        _user_id: &str,
        _success_redirect: Option<&str>,
        _error_redirect: Option<&str>,
    ) -> BrokerResult<ConnectToken> {
        // The direct endpoint's consent flow is handled entirely by the
        // OAuth2/Connect-link Broker (C9); this adapter never issues its
        // own connect tokens.
        Err(BrokerError::InvalidArgument(
            "direct MCP provider does not issue connect tokens; use the OAuth2 broker".to_string(),
        ))
    }

    async fn list_connected_apps(&self, user_id: &str) -> BrokerResult<Vec<ConnectedApp>> {
        // Only ever "connected" if a token is obtainable for this user.
        match (self.token_provider)(user_id.to_string()).await {
            Ok(_) => Ok(vec![ConnectedApp {
                provider: self.config.name.clone(),
                app_slug: self.config.name.clone(),
                remote_account_id: user_id.to_string(),
                display_name: self.config.name.clone(),
            }]),
            Err(_) => Ok(vec![]),
        }
    }
}
