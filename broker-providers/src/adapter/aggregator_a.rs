//! Aggregator-A adapter: JSON-RPC 2.0 over HTTP, SSE-capable responses
//! (spec.md §4.3.a).

use std::time::Duration;

use async_trait::async_trait;
use broker_core::error::{BrokerError, BrokerResult};
use broker_core::types::{ConnectToken, ConnectedApp, ToolCallOutcome, ToolDescriptor};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AdapterKind, ProviderAdapter, ProviderInfo, UpstreamTokenCache};

/// Static configuration for one Aggregator-A provider registration.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorAConfig {
    pub name: String,
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub project_id: String,
    pub environment: String,
}

pub struct AggregatorAAdapter {
    config: AggregatorAConfig,
    http: Client,
    upstream_token: UpstreamTokenCache,
}

#[derive(Deserialize)]
struct JsonRpcFrame {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct ClientCredentialsResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

impl AggregatorAAdapter {
    pub fn new(config: AggregatorAConfig) -> Self {
        Self {
            config,
            http: Client::new(),
            upstream_token: UpstreamTokenCache::new(),
        }
    }

    async fn upstream_access_token(&self) -> BrokerResult<String> {
        let config = &self.config;
        let http = self.http.clone();
        self.upstream_token
            .get_or_refresh(|| async move {
                let resp = http
                    .post(format!("{}/oauth/token", config.base_url))
                    .form(&[
                        ("grant_type", "client_credentials"),
                        ("client_id", config.client_id.as_str()),
                        ("client_secret", config.client_secret.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| BrokerError::UpstreamFailed(format!("token refresh: {e}")))?;

                if !resp.status().is_success() {
                    return Err(BrokerError::UpstreamFailed(format!(
                        "token refresh returned {}",
                        resp.status()
                    )));
                }

                let body: ClientCredentialsResponse = resp
                    .json()
                    .await
                    .map_err(|e| BrokerError::UpstreamFailed(format!("token refresh body: {e}")))?;

                Ok((body.access_token, Duration::from_secs(body.expires_in)))
            })
            .await
    }

    async fn json_rpc(
        &self,
        user_id: &str,
        app_slug: Option<&str>,
        method: &str,
        params: Value,
    ) -> BrokerResult<Value> {
        let access_token = self.upstream_access_token().await?;

        let mut request = self
            .http
            .post(format!("{}/rpc", self.config.base_url))
            .bearer_auth(access_token)
            .header("X-Project-Id", &self.config.project_id)
            .header("X-Environment", &self.config.environment)
            .header("X-External-User-Id", user_id);
        if let Some(app_slug) = app_slug {
            request = request.header("X-App-Slug", app_slug);
        }

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = request
            .json(&body)
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

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let text = response
            .text()
            .await
            .map_err(|e| BrokerError::UpstreamFailed(format!("{method} body: {e}")))?;

        let frame = if content_type.contains("text/event-stream") {
            parse_sse_frame(&text)?
        } else {
            serde_json::from_str::<JsonRpcFrame>(&text)
                .map_err(|e| BrokerError::UpstreamFailed(format!("{method} parse: {e}")))?
        };

        if let Some(error) = frame.error {
            return Err(BrokerError::UpstreamFailed(format!(
                "{method} returned an error: {error}"
            )));
        }

        frame
            .result
            .ok_or_else(|| BrokerError::UpstreamFailed(format!("{method} response had neither result nor error")))
    }
}

/// Scan `data:` lines in order, returning the first frame carrying either
/// a `result` or an `error`. Sentinel/keepalive lines without either key
/// are discarded (spec.md §4.3.a).
fn parse_sse_frame(body: &str) -> BrokerResult<JsonRpcFrame> {
    for line in body.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }
        let Ok(frame) = serde_json::from_str::<JsonRpcFrame>(data) else {
            continue;
        };
        if frame.result.is_some() || frame.error.is_some() {
            return Ok(frame);
        }
    }
    Err(BrokerError::UpstreamFailed(
        "event stream contained no result or error frame".to_string(),
    ))
}

#[async_trait]
impl ProviderAdapter for AggregatorAAdapter {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.config.name.clone(),
            kind: AdapterKind::AggregatorA,
            description: "Aggregator-A MCP hub".to_string(),
            base_url: Some(self.config.base_url.clone()),
            advertised_apps: None,
        }
    }

    async fn list_tools(&self, user_id: &str, app_slug: &str) -> BrokerResult<Vec<ToolDescriptor>> {
        let result = self
            .json_rpc(user_id, Some(app_slug), "tools/list", json!({}))
            .await?;

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
        app_slug: &str,
        tool_name: &str,
        arguments: Value,
    ) -> BrokerResult<ToolCallOutcome> {
        let result = self
            .json_rpc(
                user_id,
                Some(app_slug),
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
        user_id: &str,
        success_redirect: Option<&str>,
        error_redirect: Option<&str>,
    ) -> BrokerResult<ConnectToken> {
        let access_token = self.upstream_access_token().await?;

        let response = self
            .http
            .post(format!(
                "{}/projects/{}/tokens",
                self.config.base_url, self.config.project_id
            ))
            .bearer_auth(access_token)
            .json(&json!({
                "user_id": user_id,
                "success_redirect_uri": success_redirect,
                "error_redirect_uri": error_redirect,
            }))
            .send()
            .await
            .map_err(|e| BrokerError::UpstreamFailed(format!("connect token request: {e}")))?;

        if !response.status().is_success() {
            return Err(BrokerError::UpstreamFailed(format!(
                "connect token request returned {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct Resp {
            token: Option<String>,
            link_url: Option<String>,
            expires_at: Option<DateTime<Utc>>,
        }

        let body: Resp = response
            .json()
            .await
            .map_err(|e| BrokerError::UpstreamFailed(format!("connect token body: {e}")))?;

        Ok(ConnectToken {
            token: body.token,
            connect_link_url: body.link_url,
            expires_at: body.expires_at,
        })
    }

    async fn list_connected_apps(&self, user_id: &str) -> BrokerResult<Vec<ConnectedApp>> {
        let result = self
            .json_rpc(user_id, None, "apps/list", json!({}))
            .await?;

        let apps = result
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sse_frame_skips_sentinel_lines_and_finds_result() {
        let body = "data: {\"jsonrpc\":\"2.0\",\"id\":1}\n\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"tools\":[]}}\n\n";
        let frame = parse_sse_frame(body).unwrap();
        assert!(frame.result.is_some());
    }

    #[test]
    fn parse_sse_frame_finds_error_frame() {
        let body = "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"error\":{\"message\":\"boom\"}}\n\n";
        let frame = parse_sse_frame(body).unwrap();
        assert!(frame.error.is_some());
    }

    #[test]
    fn parse_sse_frame_fails_when_no_frame_carries_result_or_error() {
        let body = "data: {\"jsonrpc\":\"2.0\"}\n\n";
        assert!(parse_sse_frame(body).is_err());
    }

    fn config(base_url: String) -> AggregatorAConfig {
        AggregatorAConfig {
            name: "aggA".to_string(),
            base_url,
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            project_id: "proj-1".to_string(),
            environment: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn list_tools_round_trips_through_a_live_http_server() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "upstream-token",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "tools": [
                        { "name": "send", "description": "send a message", "inputSchema": {} },
                    ],
                },
            })))
            .mount(&server)
            .await;

        let adapter = AggregatorAAdapter::new(config(server.uri()));
        let tools = adapter.list_tools("user-1", "gmail").await.unwrap();

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "send");
    }

    #[tokio::test]
    async fn json_rpc_error_frame_surfaces_as_upstream_failed() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "upstream-token",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "message": "project not found" },
            })))
            .mount(&server)
            .await;

        let adapter = AggregatorAAdapter::new(config(server.uri()));
        let err = adapter.list_tools("user-1", "gmail").await.unwrap_err();
        assert_eq!(err.kind(), "upstream-failed");
    }
}
