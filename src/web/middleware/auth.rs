//! # Identity Middleware
//!
//! Resolves `Authorization: Bearer` tokens through the external identity
//! provider and attaches the caller identity as a request extension.
//! Resolution is optional here; endpoints that require a caller or an admin
//! enforce it themselves, which lets the webhook route (signature-secured)
//! share the same router.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::auth::{require_admin, Identity};
use crate::web::errors::ApiError;
use crate::web::state::AppState;

/// Attach the resolved identity when a valid bearer token is present;
/// otherwise pass the request through unauthenticated.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&request) {
        match state.identity_resolver.resolve(&token).await {
            Ok(identity) => {
                debug!(uid = %identity.uid, "caller identity resolved");
                request.extensions_mut().insert(identity);
            }
            Err(e) => {
                debug!(error = %e, "bearer token resolution failed");
            }
        }
    }
    next.run(request).await
}

fn bearer_token(request: &Request) -> Option<String> {
    let header = request.headers().get("authorization")?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Extract an admin-level identity from request extensions, mirroring the
/// identity-provider permission threshold check.
pub fn require_admin_identity(
    identity: Option<&Identity>,
    state: &AppState,
) -> Result<Identity, ApiError> {
    let identity = identity.ok_or_else(|| ApiError::unauthorized("authentication required"))?;
    require_admin(identity, &state.config.auth)?;
    Ok(identity.clone())
}
