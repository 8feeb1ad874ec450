//! Provider Registry (C4) diagnostic listing, used by the operator CLI's
//! `list-providers` subcommand. Not part of spec.md's external contract;
//! the registry itself carries no authentication boundary of its own.

use axum::extract::State;
use axum::Json;
use broker_providers::ProviderInfo;

use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Json<Vec<ProviderInfo>> {
    Json(state.registry.infos().await)
}
