//! Application state shared across every HTTP handler.

use std::sync::Arc;

use broker_core::{ConversationStore, CredentialStore, TokenAuthority};
use broker_providers::{CloudCredentialVendor, ProviderRegistry};

use crate::catalog::IntegrationCatalog;
use crate::oauth::OAuthBroker;

/// Shared application state, cloned (cheaply, via `Arc`s) into each
/// request handler — mirrors the teacher's `AppState::from_arc` pattern
/// generalized from a single agent to the broker's five subsystems.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenAuthority>,
    pub conversations: Arc<ConversationStore>,
    pub credentials: Arc<CredentialStore>,
    pub registry: Arc<ProviderRegistry>,
    pub cloud: Arc<CloudCredentialVendor>,
    pub catalog: Arc<IntegrationCatalog>,
    pub oauth: Arc<OAuthBroker>,
    pub http: reqwest::Client,
    pub executor_url: Arc<String>,
    pub proxy_callback_url: Arc<String>,
}
