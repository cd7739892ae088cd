use crate::transport::{PublishReceipt, TransportError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error};

/// Result of a single asynchronous hand-off to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Delivered {
        agent_key: String,
        report_id: String,
        receipt: PublishReceipt,
    },
    /// The producer already got "accepted": this report is lost.
    Failed {
        agent_key: String,
        report_id: String,
        error: TransportError,
    },
}

impl PublishOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, PublishOutcome::Delivered { .. })
    }
}

/// Front door counters
#[derive(Debug, Default)]
pub struct IngestStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    delivered: AtomicU64,
    lost: AtomicU64,
}

/// Point-in-time copy of `IngestStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestCounts {
    pub accepted: u64,
    pub rejected: u64,
    pub delivered: u64,
    pub lost: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestCounts {
        IngestCounts {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
        }
    }
}

/// Completion handler for publish outcomes: logs and counts.
pub fn handle_publish_outcome(outcome: &PublishOutcome, stats: &IngestStats) {
    match outcome {
        PublishOutcome::Delivered {
            agent_key,
            report_id,
            receipt,
        } => {
            stats.delivered.fetch_add(1, Ordering::Relaxed);
            debug!(
                agent_id = %agent_key,
                report_id = %report_id,
                transport = receipt.transport,
                route = %receipt.route,
                sequence = ?receipt.sequence,
                "Position report handed off"
            );
        }
        PublishOutcome::Failed {
            agent_key,
            report_id,
            error,
        } => {
            stats.lost.fetch_add(1, Ordering::Relaxed);
            error!(
                agent_id = %agent_key,
                report_id = %report_id,
                error = %error,
                "Position report lost after acceptance"
            );
        }
    }
}
