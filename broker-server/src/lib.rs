pub mod auth;
pub mod catalog;
pub mod cloud_endpoint;
pub mod conversations;
pub mod error;
pub mod oauth;
pub mod oauth_handlers;
pub mod providers;
pub mod proxy;
pub mod router;
pub mod state;
pub mod turn;

pub use state::AppState;
