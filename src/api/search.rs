use crate::geometry::GeoPoint;
use crate::query::{QueryError, QueryEvaluator, QueryResult};
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

/// Shared state for the search API
#[derive(Clone)]
pub struct SearchAppState {
    pub evaluator: QueryEvaluator,
}

/// Range query: `?lat=..&lng=..&radius=..` or the same fields as JSON
#[derive(Deserialize)]
pub struct RangeParams {
    pub lat: f64,
    pub lng: f64,
    /// Meters
    pub radius: f64,
}

/// KNN query: `?lat=..&lng=..&k=..` or the same fields as JSON
#[derive(Deserialize)]
pub struct KnnParams {
    pub lat: f64,
    pub lng: f64,
    pub k: usize,
}

/// PIP query string: comma-separated vertex lists, e.g. `?lats=0,0,10&lngs=0,10,10`
#[derive(Deserialize)]
pub struct PipQueryParams {
    pub lats: String,
    pub lngs: String,
}

/// PIP request body
#[derive(Deserialize)]
pub struct PipBody {
    pub lats: Vec<f64>,
    pub lngs: Vec<f64>,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create search API router
pub fn create_search_router(state: SearchAppState) -> Router {
    Router::new()
        .route("/api/search/range", get(range_get).post(range_post))
        .route("/api/search/knn", get(knn_get).post(knn_post))
        .route("/api/search/pip", get(pip_get).post(pip_post))
        .with_state(Arc::new(state))
}

/// GET /api/search/range - Agents within `radius` meters, closest first
async fn range_get(
    State(state): State<Arc<SearchAppState>>,
    params: Result<Query<RangeParams>, QueryRejection>,
) -> Result<Json<Vec<QueryResult>>, SearchError> {
    range(&state, query_params(params)?).await
}

/// POST /api/search/range
async fn range_post(
    State(state): State<Arc<SearchAppState>>,
    body: Bytes,
) -> Result<Json<Vec<QueryResult>>, SearchError> {
    range(&state, json_body(&body)?).await
}

async fn range(
    state: &SearchAppState,
    params: RangeParams,
) -> Result<Json<Vec<QueryResult>>, SearchError> {
    let center = GeoPoint::new(params.lat, params.lng);
    let results = state.evaluator.range(center, params.radius).await?;
    Ok(Json(results))
}

/// GET /api/search/knn - The `k` closest agents
async fn knn_get(
    State(state): State<Arc<SearchAppState>>,
    params: Result<Query<KnnParams>, QueryRejection>,
) -> Result<Json<Vec<QueryResult>>, SearchError> {
    knn(&state, query_params(params)?).await
}

/// POST /api/search/knn
async fn knn_post(
    State(state): State<Arc<SearchAppState>>,
    body: Bytes,
) -> Result<Json<Vec<QueryResult>>, SearchError> {
    knn(&state, json_body(&body)?).await
}

async fn knn(
    state: &SearchAppState,
    params: KnnParams,
) -> Result<Json<Vec<QueryResult>>, SearchError> {
    let center = GeoPoint::new(params.lat, params.lng);
    let results = state.evaluator.knn(center, params.k).await?;
    Ok(Json(results))
}

/// GET /api/search/pip - Agents inside the polygon
async fn pip_get(
    State(state): State<Arc<SearchAppState>>,
    params: Result<Query<PipQueryParams>, QueryRejection>,
) -> Result<Json<Vec<QueryResult>>, SearchError> {
    let params = query_params(params)?;
    let lats = parse_coordinate_list("lats", &params.lats)?;
    let lngs = parse_coordinate_list("lngs", &params.lngs)?;
    let results = state.evaluator.within_polygon(&lats, &lngs).await?;
    Ok(Json(results))
}

/// POST /api/search/pip
async fn pip_post(
    State(state): State<Arc<SearchAppState>>,
    body: Bytes,
) -> Result<Json<Vec<QueryResult>>, SearchError> {
    let body: PipBody = json_body(&body)?;
    let results = state.evaluator.within_polygon(&body.lats, &body.lngs).await?;
    Ok(Json(results))
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, SearchError> {
    params
        .map(|Query(params)| params)
        .map_err(|e| SearchError::BadParameter(e.body_text()))
}

fn json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, SearchError> {
    serde_json::from_slice(body).map_err(|e| SearchError::BadParameter(e.to_string()))
}

/// Parse a comma-separated vertex list.
///
/// An empty string (or a lone trailing comma) is an empty list; any other
/// blank entry is an error so vertices are never silently re-paired.
fn parse_coordinate_list(name: &str, raw: &str) -> Result<Vec<f64>, SearchError> {
    let raw = raw.trim();
    let raw = raw.strip_suffix(',').unwrap_or(raw);
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    raw.split(',')
        .map(str::trim)
        .enumerate()
        .map(|(index, s)| {
            if s.is_empty() {
                return Err(SearchError::BadParameter(format!(
                    "{}: entry {} is empty",
                    name, index
                )));
            }
            s.parse::<f64>()
                .map_err(|_| SearchError::BadParameter(format!("{}: '{}' is not a number", name, s)))
        })
        .collect()
}

/// Search error types
enum SearchError {
    Query(QueryError),
    BadParameter(String),
}

impl From<QueryError> for SearchError {
    fn from(e: QueryError) -> Self {
        SearchError::Query(e)
    }
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        let message = match self {
            SearchError::Query(e) => e.to_string(),
            SearchError::BadParameter(msg) => msg,
        };

        (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate_list() {
        let parsed = parse_coordinate_list("lats", "0, 0,10.5 ,10").ok().unwrap();
        assert_eq!(parsed, vec![0.0, 0.0, 10.5, 10.0]);

        assert!(parse_coordinate_list("lats", "").ok().unwrap().is_empty());
        assert!(parse_coordinate_list("lngs", "1,abc,3").is_err());

        // Trailing comma tolerated, interior gaps are not
        assert_eq!(
            parse_coordinate_list("lats", "1,2,3,").ok().unwrap(),
            vec![1.0, 2.0, 3.0]
        );
        assert!(parse_coordinate_list("lats", "0,,10,10").is_err());
        assert!(parse_coordinate_list("lats", ",1,2").is_err());
        assert!(parse_coordinate_list("lats", "1,2,,").is_err());
    }
}
