//! Cloud Credential Vendor (C5) HTTP surface: the credential-helper
//! contract endpoint plus a diagnostic identity endpoint (spec.md §4.5).

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use broker_core::token::SCOPE_CLOUD_CREDENTIALS;
use broker_core::types::{CloudCredentialConfig, CredentialProcessOutput};
use broker_core::BrokerError;
use serde::Serialize;

use crate::auth::extract_token;
use crate::error::ApiResult;
use crate::state::AppState;

/// `POST /cloud/vend` — exchange `userConfig` for short-lived credentials
/// scoped to the caller's sandbox. Request body is a `CloudCredentialConfig`;
/// response body is the exact credential-process shape (spec.md §6).
pub async fn vend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(config): Json<CloudCredentialConfig>,
) -> ApiResult<Json<CredentialProcessOutput>> {
    let token = extract_token(&headers)
        .ok_or_else(|| BrokerError::Unauthenticated("missing session token".to_string()))?;
    let claims = state
        .tokens
        .verify_with_scope(&token, SCOPE_CLOUD_CREDENTIALS)?;

    let output = state.cloud.vend_for_sandbox(&config, &claims.sandbox_id).await?;
    Ok(Json(output))
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    account: String,
    arn: String,
    user_id: String,
}

/// `GET /cloud/whoami` — diagnostic identity check against the default
/// credential chain.
pub async fn who_am_i(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<WhoAmIResponse>> {
    let token = extract_token(&headers)
        .ok_or_else(|| BrokerError::Unauthenticated("missing session token".to_string()))?;
    state.tokens.verify_with_scope(&token, SCOPE_CLOUD_CREDENTIALS)?;

    let identity = state.cloud.who_am_i().await?;
    Ok(Json(WhoAmIResponse {
        account: identity.account,
        arn: identity.arn,
        user_id: identity.user_id,
    }))
}
