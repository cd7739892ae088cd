use crate::config::{self, SharedRuntimeConfig};
use crate::freshness::{FreshnessMonitor, StageSnapshot};
use crate::ingest::{IngestCounts, IngestStats};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// State for the admin API.
#[derive(Clone)]
pub struct AdminAppState {
    pub runtime_config: SharedRuntimeConfig,
    /// Required bearer token for PUT /api/admin/config. None = PUT unrestricted.
    pub admin_token: Option<String>,
    pub freshness: FreshnessMonitor,
    pub ingest_stats: Arc<IngestStats>,
}

/// Partial update body: only fields present in the request are changed.
#[derive(Deserialize)]
pub struct RuntimeConfigUpdate {
    pub knn_backstop_radius_m: Option<f64>,
    pub query_timeout_ms: Option<u64>,
    pub pip_filter_margin: Option<f64>,
    pub body_size_limit_single_bytes: Option<usize>,
    pub body_size_limit_batch_bytes: Option<usize>,
}

impl RuntimeConfigUpdate {
    fn check(&self) -> Result<(), String> {
        if let Some(v) = self.knn_backstop_radius_m {
            if !(v > 0.0 && v.is_finite()) {
                return Err("knn_backstop_radius_m must be positive".to_string());
            }
        }
        if self.query_timeout_ms == Some(0) {
            return Err("query_timeout_ms must be positive".to_string());
        }
        if let Some(v) = self.pip_filter_margin {
            // Below 1.0 the filter circle could miss polygon corners
            if !(v >= 1.0 && v.is_finite()) {
                return Err("pip_filter_margin must be at least 1.0".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct FreshnessResponse {
    stages: Vec<StageSnapshot>,
    ingest: IngestCounts,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn create_admin_router(state: AdminAppState) -> Router {
    Router::new()
        .route("/api/admin/config", get(get_config).put(put_config))
        .route("/api/admin/freshness", get(get_freshness))
        .with_state(Arc::new(state))
}

/// GET /api/admin/config - Returns current RuntimeConfig.
async fn get_config(State(state): State<Arc<AdminAppState>>) -> Response {
    Json(config::current(&state.runtime_config)).into_response()
}

/// PUT /api/admin/config - Partial update. Requires GEOTRACK_ADMIN_TOKEN bearer.
async fn put_config(
    State(state): State<Arc<AdminAppState>>,
    headers: HeaderMap,
    Json(update): Json<RuntimeConfigUpdate>,
) -> Response {
    // Admin token check
    if !validate_admin_token(&headers, &state.admin_token) {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized".to_string());
    }

    if let Err(msg) = update.check() {
        return error_response(StatusCode::BAD_REQUEST, msg);
    }

    // Apply partial update
    let mut cfg = match state.runtime_config.write() {
        Ok(cfg) => cfg,
        Err(poisoned) => poisoned.into_inner(),
    };

    if let Some(v) = update.knn_backstop_radius_m {
        cfg.knn_backstop_radius_m = v;
    }
    if let Some(v) = update.query_timeout_ms {
        cfg.query_timeout_ms = v;
    }
    if let Some(v) = update.pip_filter_margin {
        cfg.pip_filter_margin = v;
    }
    if let Some(v) = update.body_size_limit_single_bytes {
        cfg.body_size_limit_single_bytes = v;
    }
    if let Some(v) = update.body_size_limit_batch_bytes {
        cfg.body_size_limit_batch_bytes = v;
    }

    info!(config = ?*cfg, "Runtime config updated");
    Json(cfg.clone()).into_response()
}

/// GET /api/admin/freshness - Per-stage lag distribution plus ingest counters.
async fn get_freshness(State(state): State<Arc<AdminAppState>>) -> Response {
    Json(FreshnessResponse {
        stages: state.freshness.snapshot().stages,
        ingest: state.ingest_stats.snapshot(),
    })
    .into_response()
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// Returns true if the bearer token in `Authorization` matches the expected admin token.
/// Returns true (no restriction) when `expected` is None.
pub(crate) fn validate_admin_token(headers: &HeaderMap, expected: &Option<String>) -> bool {
    let Some(expected_token) = expected else {
        // No admin token configured → unrestricted (dev mode)
        return true;
    };

    let Some(auth_header) = headers.get("Authorization") else {
        return false;
    };
    let Ok(value) = auth_header.to_str() else {
        return false;
    };
    let Some(token) = value.strip_prefix("Bearer ") else {
        return false;
    };

    token == expected_token
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", value.parse().unwrap());
        headers
    }

    #[test]
    fn test_validate_admin_token() {
        let expected = Some("secret".to_string());
        assert!(validate_admin_token(&headers_with("Bearer secret"), &expected));
        assert!(!validate_admin_token(&headers_with("Bearer nope"), &expected));
        assert!(!validate_admin_token(&headers_with("secret"), &expected));
        assert!(!validate_admin_token(&HeaderMap::new(), &expected));
        assert!(validate_admin_token(&HeaderMap::new(), &None));
    }

    #[test]
    fn test_update_check() {
        let update = |json: &str| serde_json::from_str::<RuntimeConfigUpdate>(json).unwrap();

        assert!(update(r#"{"knn_backstop_radius_m": 2500.0}"#).check().is_ok());
        assert!(update(r#"{"knn_backstop_radius_m": 0.0}"#).check().is_err());
        assert!(update(r#"{"query_timeout_ms": 0}"#).check().is_err());
        assert!(update(r#"{"pip_filter_margin": 0.9}"#).check().is_err());
        assert!(update("{}").check().is_ok());
    }
}
