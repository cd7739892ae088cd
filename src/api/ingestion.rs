use crate::config::{self, SharedRuntimeConfig};
use crate::ingest::IngestionFrontDoor;
use crate::report::PositionReport;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct IngestionAppState {
    pub front_door: IngestionFrontDoor,
    pub runtime_config: SharedRuntimeConfig,
}

/// Success response for report ingestion
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AcceptedResponse {
    report_id: String,
    agent_id: String,
    status: &'static str,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Batch request
#[derive(Deserialize)]
struct BatchRequest {
    reports: Vec<PositionReport>,
}

/// Batch response
#[derive(Serialize)]
struct BatchResponse {
    accepted: usize,
    rejected: usize,
    results: Vec<BatchResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchResult {
    report_id: Option<String>,
    agent_id: Option<String>,
    error: Option<String>,
}

/// Create API router with ingestion endpoints
pub fn create_ingestion_router(state: IngestionAppState) -> Router {
    Router::new()
        .route("/api/locations", post(submit_location))
        .route("/api/locations/batch", post(submit_batch))
        .with_state(Arc::new(state))
}

/// POST /api/locations - Submit a single position report
///
/// 202 means handed to the pipeline, not yet queryable.
async fn submit_location(
    State(state): State<Arc<IngestionAppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    // Check body size against runtime-configurable limit
    let limit = config::current(&state.runtime_config).body_size_limit_single_bytes;
    if body.len() > limit {
        return Err(AppError::PayloadTooLarge);
    }

    // Deserialize from checked bytes
    let report: PositionReport = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let accepted = state
        .front_door
        .submit(report)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            report_id: accepted.report_id,
            agent_id: accepted.agent_id,
            status: "accepted",
        }),
    ))
}

/// POST /api/locations/batch - Submit multiple reports; each is accepted or rejected on its own
async fn submit_batch(
    State(state): State<Arc<IngestionAppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<BatchResponse>), AppError> {
    // Check body size against runtime-configurable limit
    let limit = config::current(&state.runtime_config).body_size_limit_batch_bytes;
    if body.len() > limit {
        return Err(AppError::PayloadTooLarge);
    }

    let request: BatchRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    if request.reports.is_empty() {
        return Err(AppError::ValidationError(
            "Batch request must contain at least one report".to_string(),
        ));
    }

    info!(count = request.reports.len(), "Ingesting position report batch");

    let mut accepted = 0;
    let mut rejected = 0;
    let mut results = Vec::with_capacity(request.reports.len());

    for report in request.reports {
        let agent_id = report.agent_id.clone();
        match state.front_door.submit(report) {
            Ok(ack) => {
                accepted += 1;
                results.push(BatchResult {
                    report_id: Some(ack.report_id),
                    agent_id: Some(ack.agent_id),
                    error: None,
                });
            }
            Err(e) => {
                rejected += 1;
                results.push(BatchResult {
                    report_id: None,
                    agent_id,
                    error: Some(format!("validation failed: {}", e)),
                });
            }
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchResponse {
            accepted,
            rejected,
            results,
        }),
    ))
}

/// Application error types
enum AppError {
    ValidationError(String),
    PayloadTooLarge,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload too large".to_string(),
            ),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
