// Spatial index and detail store capabilities plus their in-memory backends

mod detail;
mod spatial;
mod sweeper;

pub use detail::MemoryDetailStore;
pub use spatial::MemorySpatialIndex;
pub use sweeper::{run_expiry_sweeper, sweep_once, SweepReport};

use crate::geometry::GeoPoint;
use crate::report::AgentDetail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Spatial-index projection of an agent's latest report. One per agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedPosition {
    /// Normalized agent key
    pub agent_id: String,
    pub lon: f64,
    pub lat: f64,
    /// Producer timestamp of the report this position came from (epoch ms)
    pub timestamp: i64,
}

impl IndexedPosition {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// A radius-query hit.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
    pub position: IndexedPosition,
    pub distance_m: f64,
}

/// Storage backend failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("{backend} backend unavailable: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },
    #[error("{backend} backend rejected the operation: {reason}")]
    Rejected {
        backend: &'static str,
        reason: String,
    },
}

/// Geo index keyed by agent: "where is everyone".
///
/// Backends (in-memory, Redis GEO, PostGIS, ...) are interchangeable; picking
/// one is a deployment decision. Every backend must return radius hits sorted
/// ascending by distance, ties broken by agent key.
#[async_trait]
pub trait SpatialIndex: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Insert or overwrite the agent's position (last writer wins).
    async fn upsert(&self, position: IndexedPosition) -> Result<(), StoreError>;

    /// All positions within `radius_m` of `center`, closest first, at most `limit`.
    async fn query_radius(
        &self,
        center: GeoPoint,
        radius_m: f64,
        limit: Option<usize>,
    ) -> Result<Vec<Neighbor>, StoreError>;

    /// Remove an agent. Returns true if it was present.
    async fn remove(&self, agent_id: &str) -> Result<bool, StoreError>;

    /// Drop positions not written within `max_age`. Returns the number evicted.
    async fn evict_stale(&self, max_age: Duration) -> Result<usize, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;
}

/// Full last-known report per agent with sliding expiration: "what else do we know".
#[async_trait]
pub trait DetailStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Insert or overwrite, resetting the expiry clock to `ttl` from now.
    async fn set(&self, agent_id: &str, detail: AgentDetail, ttl: Duration)
        -> Result<(), StoreError>;

    /// Live (unexpired) detail for the agent, if any.
    async fn get(&self, agent_id: &str) -> Result<Option<AgentDetail>, StoreError>;

    async fn remove(&self, agent_id: &str) -> Result<bool, StoreError>;

    /// Drop expired entries. Returns the number removed.
    async fn purge_expired(&self) -> Result<usize, StoreError>;

    /// Number of stored entries, including expired ones not yet purged.
    async fn len(&self) -> Result<usize, StoreError>;
}
