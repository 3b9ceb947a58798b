//! Event ingestion handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::Instrument;
use warden_types::{EventKind, MutationEvent};

/// Ingestion acknowledgement
#[derive(Debug, Serialize)]
pub struct EventAccepted {
    pub accepted: bool,
    pub kind: EventKind,
}

/// Accept one mutation event from the gateway relay.
///
/// The event is handled on its own task; the response only confirms receipt.
pub async fn ingest_event(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<EventAccepted>)> {
    let event: MutationEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid event payload: {}", e)))?;
    let kind = event.kind();

    let guard = state.guard.clone();
    let span = tracing::info_span!("ingest", kind = %kind);
    tokio::spawn(
        async move {
            let report = guard.handle(&event).await;
            tracing::debug!(
                attributable = report.attributable(),
                punished = report.punished(),
                "Event handled"
            );
        }
        .instrument(span),
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(EventAccepted {
            accepted: true,
            kind,
        }),
    ))
}

/// Batch trigger response
#[derive(Debug, Serialize)]
pub struct BatchTriggered {
    pub triggered: bool,
}

/// Run a continuity batch without waiting for the next tick
pub async fn trigger_batch(State(state): State<AppState>) -> (StatusCode, Json<BatchTriggered>) {
    let triggered = state.scheduler.trigger_batch().await;
    (StatusCode::ACCEPTED, Json(BatchTriggered { triggered }))
}
