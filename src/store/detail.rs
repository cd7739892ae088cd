use super::{DetailStore, StoreError};
use crate::report::AgentDetail;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

struct StoredDetail {
    detail: AgentDetail,
    ttl: Duration,
    expires_at: Instant,
}

/// In-memory detail store with sliding expiration.
///
/// Every `set` pushes the expiry out to a full TTL. With `refresh_on_read`
/// a successful `get` does the same. Expired entries are never returned and
/// are removed lazily on access or by `purge_expired`.
pub struct MemoryDetailStore {
    entries: DashMap<String, StoredDetail>,
    refresh_on_read: bool,
}

impl MemoryDetailStore {
    pub fn new() -> Self {
        Self::with_refresh_on_read(false)
    }

    pub fn with_refresh_on_read(refresh_on_read: bool) -> Self {
        Self {
            entries: DashMap::new(),
            refresh_on_read,
        }
    }

    /// Remaining lifetime of a live entry.
    pub fn time_to_live(&self, agent_id: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(agent_id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.expires_at - now)
    }
}

impl Default for MemoryDetailStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DetailStore for MemoryDetailStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn set(
        &self,
        agent_id: &str,
        detail: AgentDetail,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.entries.insert(
            agent_id.to_string(),
            StoredDetail {
                detail,
                ttl,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, agent_id: &str) -> Result<Option<AgentDetail>, StoreError> {
        let now = Instant::now();

        // The guard must be dropped before removing from the same shard
        match self.entries.get_mut(agent_id) {
            None => return Ok(None),
            Some(mut entry) => {
                if entry.expires_at > now {
                    if self.refresh_on_read {
                        entry.expires_at = now + entry.ttl;
                    }
                    return Ok(Some(entry.detail.clone()));
                }
            }
        }

        // Re-check so a concurrent write is not thrown away
        self.entries
            .remove_if(agent_id, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn remove(&self, agent_id: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(agent_id).is_some())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.expires_at > now;
            if !keep {
                purged += 1;
            }
            keep
        });
        Ok(purged)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries.len())
    }
}
