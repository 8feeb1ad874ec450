//! Aggregator-B adapter: static API key auth, plain JSON over HTTP, and a
//! connect-link endpoint that returns a ready-to-use redirect URL rather
//! than a token+URL pair (spec.md §4.3.b).

use async_trait::async_trait;
use broker_core::error::{BrokerError, BrokerResult};
use broker_core::types::{ConnectToken, ConnectedApp, ToolCallOutcome, ToolDescriptor};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::{AdapterKind, ProviderAdapter, ProviderInfo};

/// Static configuration for one Aggregator-B provider registration.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorBConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    /// Optional per-app configuration passed through verbatim to the
    /// remote (e.g. a workspace subdomain), keyed by app slug.
    #[serde(default)]
    pub app_config: HashMap<String, Value>,
}

pub struct AggregatorBAdapter {
    config: AggregatorBConfig,
    http: Client,
}

impl AggregatorBAdapter {
    pub fn new(config: AggregatorBConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> BrokerResult<Value> {
        let response = self
            .http
            .post(format!("{}{}", self.config.base_url, path))
            .header("X-Api-Key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BrokerError::UpstreamFailed(format!("{path} request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BrokerError::UpstreamFailed(format!(
                "{path} returned {status}: {text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| BrokerError::UpstreamFailed(format!("{path} body: {e}")))
    }
}

#[async_trait]
impl ProviderAdapter for AggregatorBAdapter {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.config.name.clone(),
            kind: AdapterKind::AggregatorB,
            description: "Aggregator-B MCP hub".to_string(),
            base_url: Some(self.config.base_url.clone()),
            advertised_apps: None,
        }
    }

    async fn list_tools(&self, user_id: &str, app_slug: &str) -> BrokerResult<Vec<ToolDescriptor>> {
        let body = self
            .post(
                "/v1/tools/list",
                json!({
                    "user_id": user_id,
                    "app": app_slug,
                    "app_config": self.config.app_config.get(app_slug),
                }),
            )
            .await?;

        let tools = body
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
                    input_schema: tool.get("input_schema").cloned().unwrap_or(json!({})),
                })
            })
            .collect()
    }

    async fn call_tool(
        &self,
        user_id: &str,
        app_slug: &str,
        tool_name: &str,
        arguments: Value,
    ) -> BrokerResult<ToolCallOutcome> {
        let body = self
            .post(
                "/v1/tools/call",
                json!({
                    "user_id": user_id,
                    "app": app_slug,
                    "tool": tool_name,
                    "arguments": arguments,
                    "app_config": self.config.app_config.get(app_slug),
                }),
            )
            .await?;

        Ok(ToolCallOutcome {
            is_error: body.get("is_error").and_then(Value::as_bool).unwrap_or(false),
            content: body.get("content").cloned().unwrap_or(json!(null)),
        })
    }

    async fn get_connect_token(
        &self,
        user_id: &str,
        success_redirect: Option<&str>,
        error_redirect: Option<&str>,
    ) -> BrokerResult<ConnectToken> {
        let body = self
            .post(
                "/v1/connect-link",
                json!({
                    "user_id": user_id,
                    "success_redirect_uri": success_redirect,
                    "error_redirect_uri": error_redirect,
                }),
            )
            .await?;

        #[derive(Deserialize)]
        struct Resp {
            url: String,
        }
        let resp: Resp = serde_json::from_value(body)
            .map_err(|e| BrokerError::UpstreamFailed(format!("connect link body: {e}")))?;

        Ok(ConnectToken {
            token: None,
            connect_link_url: Some(resp.url),
            expires_at: None,
        })
    }

    async fn list_connected_apps(&self, user_id: &str) -> BrokerResult<Vec<ConnectedApp>> {
        let body = self
            .post("/v1/apps/list", json!({ "user_id": user_id }))
            .await?;

        let apps = body
            .get("apps")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(apps
            .into_iter()
            .filter_map(|app| {
                Some(ConnectedApp {
                    provider: self.config.name.clone(),
                    app_slug: app.get("slug")?.as_str()?.to_string(),
                    remote_account_id: app
                        .get("account_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    display_name: app
                        .get("display_name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
            })
            .collect())
    }
}
