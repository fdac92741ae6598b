//! Scheduler trigger endpoints for the external cron invoker. A failed
//! sweep returns 500 and is simply re-run on the next trigger; no partial
//! sweep state is persisted as complete.

use axum::extract::State;
use axum::{Extension, Json};

use crate::auth::Identity;
use crate::scheduler::{EscalationSweepOutcome, RetrySweepOutcome};
use crate::web::errors::ApiResult;
use crate::web::middleware::require_admin_identity;
use crate::web::state::AppState;

/// POST /v1/jobs/retry-sweep (reference cadence: every 5 minutes)
pub async fn retry_sweep(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
) -> ApiResult<Json<RetrySweepOutcome>> {
    require_admin_identity(identity.as_deref(), &state)?;
    let outcome = state.retry_scheduler.run_sweep().await?;
    Ok(Json(outcome))
}

/// POST /v1/jobs/escalation-sweep (reference cadence: once daily)
pub async fn escalation_sweep(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
) -> ApiResult<Json<EscalationSweepOutcome>> {
    require_admin_identity(identity.as_deref(), &state)?;
    let outcome = state.escalation_scheduler.run_sweep().await?;
    Ok(Json(outcome))
}
