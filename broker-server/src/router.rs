//! HTTP router assembly. A direct `Router::new()` chain rather than the
//! teacher's fluent `MixtapeRouter` builder: the broker's surface is a
//! fixed, fully-known set of routes with no optional feature toggles to
//! build up incrementally.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{cloud_endpoint, conversations, oauth_handlers, providers, proxy, turn};

pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/conversations", post(conversations::create).get(conversations::list))
        .route(
            "/conversations/:id",
            get(conversations::get).delete(conversations::delete),
        )
        .route("/conversations/:id/turn", post(turn::handle))
        .route("/proxy", post(proxy::handle))
        .route("/providers", get(providers::list))
        .route("/cloud/vend", post(cloud_endpoint::vend))
        .route("/cloud/whoami", get(cloud_endpoint::who_am_i))
        .route("/oauth/:integration/start", get(oauth_handlers::start))
        .route("/oauth/:integration/callback", get(oauth_handlers::callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
