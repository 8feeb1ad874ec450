use std::collections::HashMap;
use std::sync::Arc;

use broker_core::{Config, ConversationStore, CredentialStore, EncryptionKey, TokenAuthority, TokenSecret};
use broker_providers::{register_all, CloudCredentialVendor, ProviderRegistry};
use broker_server::catalog::IntegrationCatalog;
use broker_server::oauth::OAuthBroker;
use broker_server::state::AppState;
use sha2::{Digest, Sha256};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_env()?;

    let secret = TokenSecret::new(config.token_secret.clone())?;
    let tokens = Arc::new(TokenAuthority::new(secret, config.token_ttl, "dynamiq-broker"));

    // Derive a distinct 32-byte encryption key from the token secret via a
    // domain-separated hash, rather than requiring a second environment
    // variable the broker's own boundary doesn't otherwise need.
    let mut hasher = Sha256::new();
    hasher.update(b"dynamiq-broker-credential-store-key:");
    hasher.update(&config.token_secret);
    let encryption_key = EncryptionKey::new(hasher.finalize().to_vec())?;
    let credentials = Arc::new(CredentialStore::new(encryption_key));

    let conversations = Arc::new(ConversationStore::new());
    let registry = Arc::new(ProviderRegistry::new());
    register_all(
        &registry,
        &config.provider_options,
        &credentials,
        config.default_provider.as_deref(),
    )
    .await?;
    let cloud = Arc::new(CloudCredentialVendor::new().await?);
    let catalog = Arc::new(IntegrationCatalog::empty());
    let oauth = Arc::new(OAuthBroker::new(
        HashMap::new(),
        HashMap::new(),
        registry.clone(),
        credentials.clone(),
    ));

    let state = AppState {
        tokens,
        conversations,
        credentials,
        registry,
        cloud,
        catalog,
        oauth,
        http: reqwest::Client::new(),
        executor_url: Arc::new(config.executor_url.clone()),
        proxy_callback_url: Arc::new(config.proxy_callback_url.clone()),
    };

    let app = broker_server::router::build(state);

    let addr = std::env::var("BROKER_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    log::info!("dynamiq broker listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
