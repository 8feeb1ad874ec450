//! Agent-Turn Orchestrator (C7): accepts a user turn, fans out to the
//! external executor, and multiplexes its event stream back to the
//! caller while projecting it into the conversation log (spec.md §4.7).
//!
//! Grounded on the teacher's `agui::handler::agui_handler`: a channel
//! bridges a spawned task (driving the upstream stream) to the SSE body
//! the caller actually reads, generalized from an in-process agent hook
//! to an upstream HTTP event-source.

use std::collections::HashMap;
use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use broker_core::token::SCOPE_WILDCARD;
use broker_core::types::{Message, Role, ToolCallRecord, TurnEvent};
use futures::stream::Stream;
use futures::StreamExt;
use reqwest_eventsource::{Event as SourceEvent, RequestBuilderExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::ApiResult;
use crate::state::AppState;

const TURN_TOKEN_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub content: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Render a `TurnEvent` as its wire form: an explicit SSE `event:` name
/// plus a `data:` payload carrying only that variant's fields (spec.md
/// §6, "Agent-turn event stream").
fn to_sse_fields(event: &TurnEvent) -> (&'static str, Value) {
    match event {
        TurnEvent::Message { content } => ("message", json!({ "content": content })),
        TurnEvent::ToolCall { id, name, arguments } => {
            ("tool_call", json!({ "id": id, "name": name, "arguments": arguments }))
        }
        TurnEvent::ToolResult { id, name, result } => {
            ("tool_result", json!({ "id": id, "name": name, "result": result }))
        }
        TurnEvent::Status { key, value } => ("status", json!({ "key": key, "value": value })),
        TurnEvent::Error { message } => ("error", json!({ "message": message })),
        TurnEvent::Done => ("done", json!({})),
    }
}

/// Inverse of [`to_sse_fields`]: reconstruct a `TurnEvent` from the
/// executor's `(event, data)` pair.
fn from_sse_fields(event_name: &str, data: &str) -> Option<TurnEvent> {
    let value: Value = serde_json::from_str(data).ok()?;
    match event_name {
        "message" => Some(TurnEvent::Message {
            content: value.get("content")?.as_str()?.to_string(),
        }),
        "tool_call" => Some(TurnEvent::ToolCall {
            id: value.get("id")?.as_str()?.to_string(),
            name: value.get("name")?.as_str()?.to_string(),
            arguments: value.get("arguments")?.as_str()?.to_string(),
        }),
        "tool_result" => Some(TurnEvent::ToolResult {
            id: value.get("id").and_then(Value::as_str).map(str::to_string),
            name: value.get("name").and_then(Value::as_str).map(str::to_string),
            result: value.get("result")?.as_str()?.to_string(),
        }),
        "status" => Some(TurnEvent::Status {
            key: value.get("key")?.as_str()?.to_string(),
            value: value.get("value")?.as_str()?.to_string(),
        }),
        "error" => Some(TurnEvent::Error {
            message: value.get("message")?.as_str()?.to_string(),
        }),
        "done" => Some(TurnEvent::Done),
        _ => None,
    }
}

/// Accumulates projection state for one turn (spec.md §4.7, "Projection
/// rules"). Not `Send`-shared; lives entirely inside the spawned task.
#[derive(Default)]
struct Projection {
    final_content: Option<String>,
    tool_calls: Vec<ToolCallRecord>,
    index_by_id: HashMap<String, usize>,
    sandbox_id: Option<String>,
}

impl Projection {
    fn apply(&mut self, event: &TurnEvent) {
        match event {
            TurnEvent::Message { content } => {
                self.final_content = Some(content.clone());
            }
            TurnEvent::ToolCall { id, name, arguments } => {
                let index = self.tool_calls.len();
                self.tool_calls.push(ToolCallRecord {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                    result: None,
                });
                self.index_by_id.insert(id.clone(), index);
            }
            TurnEvent::ToolResult { id, name, result } => {
                let matched = id
                    .as_ref()
                    .and_then(|id| self.index_by_id.get(id).copied())
                    .or_else(|| {
                        let name = name.as_ref()?;
                        self.tool_calls
                            .iter()
                            .position(|call| &call.name == name && call.result.is_none())
                    });
                if let Some(index) = matched {
                    self.tool_calls[index].result = Some(result.clone());
                }
            }
            TurnEvent::Status { key, value } => {
                if key == "sandbox_id" {
                    self.sandbox_id = Some(value.clone());
                }
            }
            TurnEvent::Error { .. } | TurnEvent::Done => {}
        }
    }

    fn has_content(&self) -> bool {
        self.final_content.is_some() || !self.tool_calls.is_empty()
    }
}

/// `POST /conversations/:id/turn` — opens the executor connection and
/// streams its projected events back to the caller.
pub async fn handle(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<TurnRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let conversation = state.conversations.get(&conversation_id)?;

    state.conversations.append_message(
        &conversation_id,
        Message::new(Role::User, request.content.clone()),
    )?;

    let sandbox_id = conversation.sandbox_id.clone().unwrap_or_default();
    let (token, _expires_at) = state.tokens.issue(
        &conversation.user_id,
        &conversation_id,
        &sandbox_id,
        &[SCOPE_WILDCARD],
    )?;

    let (tx, rx) = mpsc::channel::<TurnEvent>(256);

    let http = state.http.clone();
    let executor_url = (*state.executor_url).clone();
    let proxy_callback_url = (*state.proxy_callback_url).clone();
    let conversations = state.conversations.clone();
    let user_id = conversation.user_id.clone();
    let conversation_id_for_task = conversation_id.clone();

    tokio::spawn(async move {
        let body = json!({
            "message": request.content,
            "files": request.files,
            "user_id": user_id,
            "conversation_id": conversation_id_for_task,
            "session_token": token,
            "proxy_url": proxy_callback_url,
        });

        let mut source = match http.post(&executor_url).json(&body).eventsource() {
            Ok(source) => source,
            Err(e) => {
                let _ = tx
                    .send(TurnEvent::Error {
                        message: format!("failed to open executor connection: {e}"),
                    })
                    .await;
                let _ = tx.send(TurnEvent::Done).await;
                return;
            }
        };

        let mut projection = Projection::default();

        while let Some(event) = source.next().await {
            let turn_event = match event {
                Ok(SourceEvent::Open) => continue,
                Ok(SourceEvent::Message(msg)) => match from_sse_fields(&msg.event, &msg.data) {
                    Some(event) => event,
                    None => continue,
                },
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => TurnEvent::Error {
                    message: format!("executor stream error: {e}"),
                },
            };

            projection.apply(&turn_event);

            // Closing send means the caller disconnected; stop reading
            // from the executor, which drops `source` and cancels the
            // connection (spec.md §4.7, "Cancellation").
            if tx.send(turn_event).await.is_err() {
                source.close();
                return;
            }
        }
        source.close();

        if let Some(sandbox_id) = &projection.sandbox_id {
            let _ = conversations.set_sandbox_id(&conversation_id_for_task, sandbox_id.clone());
        }

        if projection.has_content() {
            let mut message = Message::new(
                Role::Assistant,
                projection.final_content.clone().unwrap_or_default(),
            );
            message.tool_calls = projection.tool_calls.clone();
            let _ = conversations.append_message(&conversation_id_for_task, message);
        }

        let _ = tx.send(TurnEvent::Done).await;
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        let (name, data) = to_sse_fields(&event);
        Ok::<_, Infallible>(Event::default().event(name).data(data.to_string()))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(TURN_TOKEN_TTL / 10)))
}
