//! Tool-Access Proxy (C6): single envelope endpoint dispatching to the
//! provider registry, after scope enforcement and catalog translation
//! (spec.md §4.6).

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use broker_core::token::{SCOPE_CALL_TOOLS, SCOPE_LIST_APPS, SCOPE_LIST_TOOLS};
use broker_core::BrokerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::extract_token;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ProxyMethod {
    ListTools,
    CallTool,
    ListApps,
}

impl ProxyMethod {
    fn required_scope(&self) -> &'static str {
        match self {
            ProxyMethod::ListTools => SCOPE_LIST_TOOLS,
            ProxyMethod::CallTool => SCOPE_CALL_TOOLS,
            ProxyMethod::ListApps => SCOPE_LIST_APPS,
        }
    }

    /// The wire name, used verbatim in the insufficient-scope error
    /// message (spec.md §8, Scenario 1).
    fn wire_name(&self) -> &'static str {
        match self {
            ProxyMethod::ListTools => "list_tools",
            ProxyMethod::CallTool => "call_tool",
            ProxyMethod::ListApps => "list_apps",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProxyRequest {
    method: ProxyMethod,
    #[serde(default)]
    app: String,
    #[serde(default)]
    tool: String,
    #[serde(default)]
    input: Value,
}

#[derive(Debug, Serialize)]
pub struct ProxyResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// `POST` handler for the tool-access envelope.
pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ProxyRequest>,
) -> ApiResult<Json<ProxyResponse>> {
    let token = extract_token(&headers)
        .ok_or_else(|| BrokerError::Unauthenticated("missing session token".to_string()))?;

    // Token validity (signature, expiry) is a 401 at the HTTP layer; scope
    // insufficiency is reported inside the envelope itself with a 200, per
    // spec.md §8 Scenario 1 (the token is legitimate, just not permitted
    // for this particular method).
    let claims = state.tokens.verify(&token)?;
    if !claims.has_scope(request.method.required_scope()) {
        return Ok(Json(ProxyResponse {
            success: false,
            data: None,
            error: Some(format!(
                "Insufficient permissions for {}",
                request.method.wire_name()
            )),
        }));
    }

    let address = state.catalog.translate(&request.app);

    log::info!(
        "proxy request user={} method={:?} app={} tool={}",
        claims.user_id,
        request.method,
        address,
        request.tool,
    );

    let data = match request.method {
        ProxyMethod::ListTools => {
            let tools = state.registry.list_tools(&claims.user_id, &address).await?;
            serde_json::to_value(tools).map_err(|e| BrokerError::Internal(e.to_string()))?
        }
        ProxyMethod::CallTool => {
            let outcome = state
                .registry
                .call_tool(&claims.user_id, &address, &request.tool, request.input)
                .await?;
            serde_json::to_value(outcome).map_err(|e| BrokerError::Internal(e.to_string()))?
        }
        ProxyMethod::ListApps => {
            let apps = state.registry.list_connected_apps(&claims.user_id).await?;
            serde_json::to_value(apps).map_err(|e| BrokerError::Internal(e.to_string()))?
        }
    };

    Ok(Json(ProxyResponse {
        success: true,
        data: Some(data),
        error: None,
    }))
}
