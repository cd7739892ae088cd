// Query evaluator: range, KNN and point-in-polygon over the spatial index


use crate::config::{self, SharedRuntimeConfig};
use crate::freshness::{FreshnessMonitor, Stage};
use crate::geometry::{GeoPoint, PolygonError, PolygonRegion};
use crate::store::{Neighbor, SpatialIndex};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// One agent in a query response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub agent_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Range/KNN: distance from the query center.
    /// PIP: distance from the polygon's MBR center, which says nothing about
    /// how far the agent is from the polygon boundary.
    pub distance_meters: f64,
}

impl From<Neighbor> for QueryResult {
    fn from(neighbor: Neighbor) -> Self {
        Self {
            agent_id: neighbor.position.agent_id,
            latitude: neighbor.position.lat,
            longitude: neighbor.position.lon,
            distance_meters: neighbor.distance_m,
        }
    }
}

/// Query input rejected before touching the index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("center out of range: latitude {lat}, longitude {lon}")]
    InvalidCenter { lat: f64, lon: f64 },
    #[error("radius must be a positive number of meters, got {0}")]
    InvalidRadius(f64),
    #[error("k must be a positive integer")]
    InvalidK,
    #[error("invalid polygon: {0}")]
    InvalidPolygon(#[from] PolygonError),
}

/// Stateless evaluator; cheap to clone and safe to share across requests.
///
/// Backend failures and timeouts degrade to an empty result, never an error.
#[derive(Clone)]
pub struct QueryEvaluator {
    spatial: Arc<dyn SpatialIndex>,
    runtime_config: SharedRuntimeConfig,
    freshness: FreshnessMonitor,
}

impl QueryEvaluator {
    pub fn new(
        spatial: Arc<dyn SpatialIndex>,
        runtime_config: SharedRuntimeConfig,
        freshness: FreshnessMonitor,
    ) -> Self {
        Self {
            spatial,
            runtime_config,
            freshness,
        }
    }

    /// Every agent within `radius_m` of `center`, closest first. Uncapped.
    pub async fn range(
        &self,
        center: GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<QueryResult>, QueryError> {
        check_center(center)?;
        if !(radius_m > 0.0 && radius_m.is_finite()) {
            return Err(QueryError::InvalidRadius(radius_m));
        }

        let timeout = config::current(&self.runtime_config).query_timeout();
        let hits = self.fetch("range", center, radius_m, None, timeout).await;
        Ok(self.finish(hits))
    }

    /// The `k` closest agents within the backstop radius, closest first.
    ///
    /// Returns fewer than `k` results when fewer agents are inside the
    /// backstop radius; the radius is never widened.
    pub async fn knn(&self, center: GeoPoint, k: usize) -> Result<Vec<QueryResult>, QueryError> {
        check_center(center)?;
        if k == 0 {
            return Err(QueryError::InvalidK);
        }

        let runtime = config::current(&self.runtime_config);
        let mut hits = self
            .fetch(
                "knn",
                center,
                runtime.knn_backstop_radius_m,
                Some(k),
                runtime.query_timeout(),
            )
            .await;
        hits.truncate(k);
        Ok(self.finish(hits))
    }

    /// Agents inside the polygon given as parallel latitude/longitude arrays.
    ///
    /// Filter: radius query over a circle covering the inflated MBR.
    /// Refine: exact planar containment per candidate.
    pub async fn within_polygon(
        &self,
        lats: &[f64],
        lngs: &[f64],
    ) -> Result<Vec<QueryResult>, QueryError> {
        let region = PolygonRegion::new(lats, lngs)?;
        let runtime = config::current(&self.runtime_config);
        let (center, radius_m) = region.filter_circle(runtime.pip_filter_margin);

        let candidates = self
            .fetch("pip", center, radius_m, None, runtime.query_timeout())
            .await;
        let candidate_count = candidates.len();

        let inside: Vec<Neighbor> = candidates
            .into_iter()
            .filter(|n| region.contains(n.position.point()))
            .collect();

        debug!(
            vertices = region.vertex_count(),
            filter_radius_m = radius_m,
            candidates = candidate_count,
            matched = inside.len(),
            "Polygon query refined"
        );

        Ok(self.finish(inside))
    }

    async fn fetch(
        &self,
        query: &'static str,
        center: GeoPoint,
        radius_m: f64,
        limit: Option<usize>,
        timeout: Duration,
    ) -> Vec<Neighbor> {
        match tokio::time::timeout(timeout, self.spatial.query_radius(center, radius_m, limit))
            .await
        {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                warn!(
                    query,
                    backend = self.spatial.backend(),
                    error = %e,
                    "Spatial index query failed, returning empty result"
                );
                Vec::new()
            }
            Err(_) => {
                warn!(
                    query,
                    backend = self.spatial.backend(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Spatial index query timed out, returning empty result"
                );
                Vec::new()
            }
        }
    }

    fn finish(&self, hits: Vec<Neighbor>) -> Vec<QueryResult> {
        let now_ms = Utc::now().timestamp_millis();
        for hit in hits.iter().filter(|h| h.position.timestamp > 0) {
            self.freshness
                .record(Stage::Query, hit.position.timestamp, now_ms);
        }
        hits.into_iter().map(QueryResult::from).collect()
    }
}

fn check_center(center: GeoPoint) -> Result<(), QueryError> {
    if center.is_valid() {
        Ok(())
    } else {
        Err(QueryError::InvalidCenter {
            lat: center.lat,
            lon: center.lon,
        })
    }
}
