//! Conversation Store (C8) HTTP surface: the minimal CRUD scaffolding a
//! caller needs to obtain a `conversation_id` before opening a turn (C7)
//! or inspecting its transcript. Not itself part of spec.md's external
//! interface contract, but required ambient plumbing for C8 to be
//! reachable at all.

use axum::extract::{Path, State};
use axum::Json;
use broker_core::types::Conversation;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub user_id: String,
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_title() -> String {
    "New conversation".to_string()
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<Conversation>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateConversationRequest>,
) -> Json<Conversation> {
    Json(state.conversations.create(&request.user_id, request.title))
}

pub async fn get(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<Conversation>> {
    Ok(Json(state.conversations.get(&conversation_id)?))
}

#[derive(Debug, Deserialize)]
pub struct ListConversationsQuery {
    pub user_id: String,
}

pub async fn list(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<ListConversationsQuery>,
) -> Json<ConversationListResponse> {
    Json(ConversationListResponse {
        conversations: state.conversations.list(&query.user_id),
    })
}

pub async fn delete(State(state): State<AppState>, Path(conversation_id): Path<String>) {
    state.conversations.delete(&conversation_id);
}
