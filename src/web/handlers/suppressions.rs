//! Admin suppression management: list, add, remove. All three require an
//! identity at or above the configured admin permission level.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::models::{SuppressionReason, SuppressionRecord};
use crate::web::errors::ApiResult;
use crate::web::middleware::require_admin_identity;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub suppressions: Vec<SuppressionRecord>,
    pub limit: usize,
    pub offset: usize,
}

/// GET /v1/suppressions
pub async fn list(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListResponse>> {
    require_admin_identity(identity.as_deref(), &state)?;
    let suppressions = state.registry.list(query.limit.min(500), query.offset).await?;
    Ok(Json(ListResponse {
        suppressions,
        limit: query.limit.min(500),
        offset: query.offset,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SuppressRequest {
    pub address: String,
    #[serde(default)]
    pub reason: Option<SuppressionReason>,
}

#[derive(Debug, Serialize)]
pub struct SuppressResponse {
    pub address: String,
    pub suppressed: bool,
}

/// POST /v1/suppressions
pub async fn create(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    Json(request): Json<SuppressRequest>,
) -> ApiResult<Json<SuppressResponse>> {
    let admin = require_admin_identity(identity.as_deref(), &state)?;
    let address = crate::suppression::normalize_address(&request.address);
    state
        .registry
        .suppress(
            &address,
            request.reason.unwrap_or(SuppressionReason::Manual),
            None,
            None,
            None,
            &admin.uid,
        )
        .await?;
    Ok(Json(SuppressResponse {
        address,
        suppressed: true,
    }))
}

/// DELETE /v1/suppressions/{address}
pub async fn remove(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    Path(address): Path<String>,
) -> ApiResult<Json<SuppressResponse>> {
    let admin = require_admin_identity(identity.as_deref(), &state)?;
    let address = crate::suppression::normalize_address(&address);
    state.registry.unsuppress(&address, &admin.uid).await?;
    Ok(Json(SuppressResponse {
        address,
        suppressed: false,
    }))
}
