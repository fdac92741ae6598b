//! # Provider Webhook Handler
//!
//! Receives delivery event batches from the mail provider. Invalid
//! signature is a 401 with no state change; malformed JSON is a 400;
//! everything else replies 200 on best-effort processing so the provider
//! does not redeliver the whole batch over one bad event.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ingestion::{IngestOutcome, ProviderEvent};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

/// Header carrying the hex-encoded HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub events: Vec<ProviderEvent>,
}

#[derive(Debug, Default, Serialize)]
pub struct WebhookSummary {
    pub received: usize,
    pub processed: usize,
    pub duplicates: usize,
    pub errors: usize,
}

/// POST /v1/webhooks/email
pub async fn email_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookSummary>> {
    if let Some(secret) = &state.config.webhook.signing_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing webhook signature"))?;
        if !crate::ingestion::verify_signature(secret, &body, signature) {
            return Err(ApiError::unauthorized("invalid webhook signature"));
        }
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("malformed webhook payload: {e}")))?;

    let mut summary = WebhookSummary {
        received: payload.events.len(),
        ..Default::default()
    };

    for event in &payload.events {
        match state.ingestion.ingest(event).await {
            Ok(IngestOutcome::DuplicateEvent) => summary.duplicates += 1,
            Ok(_) => summary.processed += 1,
            Err(e) => {
                // Best-effort: one bad event never fails the batch.
                warn!(event_id = %event.event_id, error = %e, "event ingestion failed");
                summary.errors += 1;
            }
        }
    }

    info!(
        received = summary.received,
        processed = summary.processed,
        duplicates = summary.duplicates,
        errors = summary.errors,
        "webhook batch processed"
    );
    Ok(Json(summary))
}
