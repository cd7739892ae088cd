// Dual-write indexer: spatial index + detail store per validated report

mod consumer;
#[cfg(test)]
mod tests;

pub use consumer::{run_nats_consumer, run_partition_worker, spawn_partition_workers};

use crate::freshness::{FreshnessMonitor, Stage};
use crate::report::{prepare, AgentDetail, InvalidReason, PositionReport, TimestampPolicy};
use crate::store::{DetailStore, IndexedPosition, SpatialIndex, StoreError};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Which of the two stores a write went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    Spatial,
    Detail,
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteTarget::Spatial => write!(f, "spatial index"),
            WriteTarget::Detail => write!(f, "detail store"),
        }
    }
}

/// A store write that failed. Logged, never retried inline, never reported
/// back to the producer.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{target} write for '{agent_key}' failed: {source}")]
pub struct IndexWriteError {
    pub target: WriteTarget,
    pub agent_key: String,
    pub source: StoreError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexOutcome {
    /// Both writes landed
    Indexed { agent_key: String },
    /// At least one write failed; the other was still attempted
    Degraded {
        agent_key: String,
        failures: Vec<IndexWriteError>,
    },
    /// Payload failed validation and was dropped
    Rejected(InvalidReason),
}

/// Merges validated reports into the spatial index and detail store.
pub struct DualWriteIndexer {
    spatial: Arc<dyn SpatialIndex>,
    details: Arc<dyn DetailStore>,
    freshness: FreshnessMonitor,
    detail_ttl: Duration,
    policy: TimestampPolicy,
}

impl DualWriteIndexer {
    pub fn new(
        spatial: Arc<dyn SpatialIndex>,
        details: Arc<dyn DetailStore>,
        freshness: FreshnessMonitor,
        detail_ttl: Duration,
    ) -> Self {
        Self {
            spatial,
            details,
            freshness,
            detail_ttl,
            policy: TimestampPolicy::Substitute,
        }
    }

    /// Policy for payloads that arrive without a timestamp.
    pub fn with_timestamp_policy(mut self, policy: TimestampPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Index one report.
    ///
    /// The report is validated again since transport payloads may come from
    /// any producer. Both writes are issued together and each is attempted
    /// regardless of the other's result. Writes for the same agent are
    /// last-writer-wins by completion order, not by report timestamp.
    pub async fn index(&self, report: PositionReport) -> IndexOutcome {
        let prepared = match prepare(report, self.policy, Utc::now().timestamp_millis()) {
            Ok(prepared) => prepared,
            Err(reason) => {
                warn!(reason = %reason, "Dropping invalid position report");
                return IndexOutcome::Rejected(reason);
            }
        };

        let agent_key = prepared.agent_key.clone();
        let timestamp = prepared.timestamp;

        let position = IndexedPosition {
            agent_id: agent_key.clone(),
            lon: prepared.longitude,
            lat: prepared.latitude,
            timestamp,
        };
        let detail = AgentDetail {
            agent_id: agent_key.clone(),
            report: prepared.report,
            indexed_at: Utc::now(),
        };

        let (spatial_result, detail_result) = tokio::join!(
            self.spatial.upsert(position),
            self.details.set(&agent_key, detail, self.detail_ttl),
        );

        let failures: Vec<IndexWriteError> = [
            (WriteTarget::Spatial, spatial_result),
            (WriteTarget::Detail, detail_result),
        ]
        .into_iter()
        .filter_map(|(target, result)| {
            result.err().map(|source| IndexWriteError {
                target,
                agent_key: agent_key.clone(),
                source,
            })
        })
        .collect();

        for failure in &failures {
            error!(
                agent_id = %agent_key,
                target = %failure.target,
                error = %failure.source,
                "Index write failed"
            );
        }

        // Nothing landed, so there is no index latency to report
        if timestamp > 0 && failures.len() < 2 {
            let lag_ms = self.freshness.record_now(Stage::IndexWrite, timestamp);
            debug!(agent_id = %agent_key, lag_ms, "Indexed position report");
        }

        if failures.is_empty() {
            IndexOutcome::Indexed { agent_key }
        } else {
            IndexOutcome::Degraded {
                agent_key,
                failures,
            }
        }
    }
}
