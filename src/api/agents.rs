use super::admin::validate_admin_token;
use crate::confidence::confidence_label;
use crate::identity::normalize_agent_id;
use crate::report::PositionReport;
use crate::store::{DetailStore, SpatialIndex, StoreError};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared state for the agent lookup / purge API
#[derive(Clone)]
pub struct AgentsAppState {
    pub spatial: Arc<dyn SpatialIndex>,
    pub details: Arc<dyn DetailStore>,
    /// Required bearer token for DELETE. None = unrestricted.
    pub admin_token: Option<String>,
}

/// Last-known report for one agent
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub agent_id: String,
    pub report: PositionReport,
    pub indexed_at: DateTime<Utc>,
    /// GPS trust score, e.g. "90%"
    pub confidence: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PurgeResponse {
    agent_id: String,
    position_removed: bool,
    detail_removed: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create agents API router
pub fn create_agents_router(state: AgentsAppState) -> Router {
    Router::new()
        .route("/api/agents/:id", get(get_agent).delete(delete_agent))
        .with_state(Arc::new(state))
}

/// GET /api/agents/:id - Point lookup in the detail store
///
/// The id is normalized the same way as at ingestion, so `rider-1` and
/// `rider1` address the same agent.
async fn get_agent(
    State(state): State<Arc<AgentsAppState>>,
    Path(id): Path<String>,
) -> Result<Json<AgentResponse>, AgentsError> {
    let key = normalize_agent_id(&id);
    let detail = state
        .details
        .get(&key)
        .await?
        .ok_or(AgentsError::NotFound(id))?;

    Ok(Json(AgentResponse {
        confidence: confidence_label(detail.report.accuracy),
        agent_id: detail.agent_id,
        report: detail.report,
        indexed_at: detail.indexed_at,
    }))
}

/// DELETE /api/agents/:id - Administrative purge from both stores
async fn delete_agent(
    State(state): State<Arc<AgentsAppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PurgeResponse>, AgentsError> {
    if !validate_admin_token(&headers, &state.admin_token) {
        return Err(AgentsError::Unauthorized);
    }

    let key = normalize_agent_id(&id);
    let (position_removed, detail_removed) =
        tokio::join!(state.spatial.remove(&key), state.details.remove(&key));
    let (position_removed, detail_removed) = (position_removed?, detail_removed?);

    if !position_removed && !detail_removed {
        return Err(AgentsError::NotFound(id));
    }

    info!(agent_id = %key, position_removed, detail_removed, "Purged agent");

    Ok(Json(PurgeResponse {
        agent_id: key,
        position_removed,
        detail_removed,
    }))
}

/// Agents API error types
enum AgentsError {
    NotFound(String),
    Unauthorized,
    Store(StoreError),
}

impl From<StoreError> for AgentsError {
    fn from(e: StoreError) -> Self {
        AgentsError::Store(e)
    }
}

impl IntoResponse for AgentsError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AgentsError::NotFound(id) => (StatusCode::NOT_FOUND, format!("Agent not found: {}", id)),
            AgentsError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AgentsError::Store(e) => {
                error!(error = %e, "Agent store access failed");
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
