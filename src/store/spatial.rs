use super::{IndexedPosition, Neighbor, SpatialIndex, StoreError};
use crate::geometry::{haversine_distance, GeoPoint};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

struct Slot {
    position: IndexedPosition,
    written_at: Instant,
}

/// In-memory spatial index.
///
/// Radius queries scan every entry and rank by Haversine distance, which is
/// plenty for a single-node fleet of a few hundred thousand agents.
pub struct MemorySpatialIndex {
    /// Lock-free concurrent map for fast reads
    slots: DashMap<String, Slot>,

    /// Positions older than this are invisible to queries (None = never stale)
    max_age: Option<Duration>,
}

impl MemorySpatialIndex {
    pub fn new() -> Self {
        Self::with_max_age(None)
    }

    pub fn with_max_age(max_age: Option<Duration>) -> Self {
        Self {
            slots: DashMap::new(),
            max_age,
        }
    }

    /// Current position for an agent, stale or not.
    pub fn get(&self, agent_id: &str) -> Option<IndexedPosition> {
        self.slots.get(agent_id).map(|slot| slot.position.clone())
    }

    fn is_live(&self, slot: &Slot, now: Instant) -> bool {
        match self.max_age {
            Some(max_age) => now.saturating_duration_since(slot.written_at) < max_age,
            None => true,
        }
    }
}

impl Default for MemorySpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpatialIndex for MemorySpatialIndex {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, position: IndexedPosition) -> Result<(), StoreError> {
        self.slots.insert(
            position.agent_id.clone(),
            Slot {
                position,
                written_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn query_radius(
        &self,
        center: GeoPoint,
        radius_m: f64,
        limit: Option<usize>,
    ) -> Result<Vec<Neighbor>, StoreError> {
        if !(radius_m >= 0.0) {
            return Ok(Vec::new());
        }

        let now = Instant::now();
        let mut hits: Vec<Neighbor> = self
            .slots
            .iter()
            .filter(|slot| self.is_live(slot.value(), now))
            .filter_map(|slot| {
                let position = &slot.value().position;
                let distance_m = haversine_distance(center, position.point());
                (distance_m <= radius_m).then(|| Neighbor {
                    position: position.clone(),
                    distance_m,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then_with(|| a.position.agent_id.cmp(&b.position.agent_id))
        });

        if let Some(limit) = limit {
            hits.truncate(limit);
        }

        Ok(hits)
    }

    async fn remove(&self, agent_id: &str) -> Result<bool, StoreError> {
        Ok(self.slots.remove(agent_id).is_some())
    }

    async fn evict_stale(&self, max_age: Duration) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut evicted = 0;
        self.slots.retain(|_, slot| {
            let keep = now.saturating_duration_since(slot.written_at) < max_age;
            if !keep {
                evicted += 1;
            }
            keep
        });
        Ok(evicted)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.slots.len())
    }
}
