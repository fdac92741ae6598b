//! # Web Layer
//!
//! Carries the external interfaces: the provider webhook, admin suppression
//! management, scheduler triggers, and a health probe.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use errors::{ApiError, ApiResult};
pub use state::AppState;

use axum::routing::{delete, get, post};
use axum::Router;
use tracing::warn;

/// Build the router over a wired [`AppState`].
pub fn build_router(state: AppState) -> Router {
    if state.config.webhook.signing_secret.is_none() {
        warn!("no webhook signing secret configured; accepting unsigned delivery events");
    }

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/v1/webhooks/email", post(handlers::webhooks::email_events))
        .route("/v1/suppressions", get(handlers::suppressions::list))
        .route("/v1/suppressions", post(handlers::suppressions::create))
        .route(
            "/v1/suppressions/{address}",
            delete(handlers::suppressions::remove),
        )
        .route("/v1/jobs/retry-sweep", post(handlers::jobs::retry_sweep))
        .route(
            "/v1/jobs/escalation-sweep",
            post(handlers::jobs::escalation_sweep),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::resolve_identity,
        ))
        .with_state(state)
}
