//! Core data model shared by every crate in the workspace (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Opaque user identifier, stable across conversations. Externally
/// assigned by an upstream authenticator; the broker never mints one.
pub type UserId = String;

/// Identifier of a conversation, immutable once created.
pub type ConversationId = String;

/// Identifier of an ephemeral sandbox execution environment.
pub type SandboxId = String;

/// Identifier of a stored integration (e.g. `"gmail"`, `"aws"`).
pub type IntegrationId = String;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// Record of a tool invocation attached to a message. The `result` field
/// is populated out of order, once the executor reports completion
/// (spec.md §3, "Message / Tool-call record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: String,
    #[serde(default)]
    pub result: Option<String>,
}

/// A single message in a conversation's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Tool-call id this message answers, when `role == Tool`.
    #[serde(default)]
    pub in_reply_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            in_reply_to: None,
            created_at: Utc::now(),
        }
    }
}

/// A conversation: owning user, append-only message log, and optional
/// sandbox binding and enabled-tool allow-list (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: UserId,
    pub title: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub sandbox_id: Option<SandboxId>,
    #[serde(default)]
    pub enabled_tools: Option<HashSet<IntegrationId>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, user_id: UserId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            title: title.into(),
            messages: Vec::new(),
            sandbox_id: None,
            enabled_tools: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Descriptor of a tool exposed by a provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Result of a tool invocation, as returned by an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    pub content: Value,
    pub is_error: bool,
}

/// A connected third-party app/account, produced by an adapter and tagged
/// with its source provider by the registry's fan-out (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedApp {
    pub provider: String,
    pub app_slug: String,
    pub remote_account_id: String,
    pub display_name: String,
}

/// Connect-token/link response from an adapter's consent-flow kickoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectToken {
    pub token: Option<String>,
    pub connect_link_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Tagged union over the kinds of secret a stored integration credential
/// can hold (spec.md §3, "Stored integration credential").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrationSecret {
    OAuth2 {
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
        scopes: Vec<String>,
    },
    ApiKey {
        key: String,
    },
    ServiceAccountJson {
        json_blob: String,
    },
    CloudRole {
        role_arn: String,
        external_id: Option<String>,
        region: Option<String>,
    },
    CloudAccessKey {
        access_key_id: String,
        secret_access_key: String,
    },
    DatabaseParams {
        host: String,
        port: u16,
        database: String,
        username: String,
        password: String,
    },
}

/// Non-secret display metadata returned by `CredentialStore::list`
/// without touching the encrypted payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredentialMeta {
    pub integration_id: IntegrationId,
    pub display_name: String,
}

/// Ephemeral, per-request configuration for a cloud credential exchange
/// (spec.md §3, "Cloud credential configuration").
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudCredentialConfig {
    pub role_arn: Option<String>,
    pub external_id: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    /// Session duration in seconds; clamped to `[900, 43200]` default `3600`.
    pub duration_seconds: Option<u32>,
}

/// Credential-helper contract output (spec.md §6): exact keys, PascalCase.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialProcessOutput {
    #[serde(rename = "Version")]
    pub version: u8,
    #[serde(rename = "AccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "SessionToken")]
    pub session_token: String,
    #[serde(rename = "Expiration")]
    pub expiration: DateTime<Utc>,
}

/// Streaming event emitted by the Agent-Turn Orchestrator (spec.md §3/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    Message {
        content: String,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    ToolResult {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        result: String,
    },
    Status {
        key: String,
        value: String,
    },
    Error {
        message: String,
    },
    Done,
}
