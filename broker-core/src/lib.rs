//! Data model, Token Authority (C1), Credential Store (C2), and
//! Conversation Store (C8) for the dynamiq credential and tool-access
//! broker.
//!
//! This crate has no knowledge of HTTP, provider wire protocols, or the
//! cloud credential vendor — those live in `broker-providers` and
//! `broker-server`, which depend on the types and stores defined here.

pub mod config;
pub mod conversation_store;
pub mod credential_store;
pub mod error;
pub mod token;
pub mod types;

pub use config::Config;
pub use conversation_store::ConversationStore;
pub use credential_store::{CredentialStore, EncryptionKey};
pub use error::{BrokerError, BrokerResult};
pub use token::{Claims, TokenAuthority, TokenSecret};
