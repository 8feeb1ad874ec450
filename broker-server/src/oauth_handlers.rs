//! HTTP wrappers around the OAuth2 / Connect-link Broker (C9).

use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    pub user_id: String,
    pub success_redirect: Option<String>,
    pub error_redirect: Option<String>,
}

/// `GET /oauth/:integration/start` — redirect the caller into the
/// integration's consent flow.
pub async fn start(
    State(state): State<AppState>,
    Path(integration_id): Path<String>,
    Query(query): Query<StartQuery>,
) -> ApiResult<Redirect> {
    let url = state
        .oauth
        .start_url(
            &integration_id,
            &query.user_id,
            query.success_redirect.as_deref(),
            query.error_redirect.as_deref(),
        )
        .await?;
    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

/// `GET /oauth/:integration/callback` — complete the consent flow and
/// persist the exchanged credential via C2.
pub async fn callback(
    State(state): State<AppState>,
    Path(integration_id): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<&'static str> {
    state
        .oauth
        .handle_callback(&integration_id, &query.code, &query.state)
        .await?;
    Ok("connected")
}
