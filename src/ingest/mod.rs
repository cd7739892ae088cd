// Ingestion front door: validate, normalize, hand off, acknowledge

mod outcome;
#[cfg(test)]
mod tests;

pub use outcome::{handle_publish_outcome, IngestCounts, IngestStats, PublishOutcome};

use crate::confidence::confidence_label;
use crate::freshness::{FreshnessMonitor, Stage};
use crate::report::{prepare, InvalidReason, PositionReport, TimestampPolicy};
use crate::transport::ReportTransport;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Acknowledgment returned once a report is handed to the transport task.
///
/// It does not mean the report is indexed yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accepted {
    pub report_id: String,
    /// Agent id as sent by the producer
    pub agent_id: String,
    /// Normalized index key
    pub agent_key: String,
}

/// Accepts position reports and hands them to the asynchronous pipeline.
#[derive(Clone)]
pub struct IngestionFrontDoor {
    transport: Arc<dyn ReportTransport>,
    freshness: FreshnessMonitor,
    policy: TimestampPolicy,
    stats: Arc<IngestStats>,
}

impl IngestionFrontDoor {
    pub fn new(
        transport: Arc<dyn ReportTransport>,
        freshness: FreshnessMonitor,
        policy: TimestampPolicy,
    ) -> Self {
        Self {
            transport,
            freshness,
            policy,
            stats: Arc::new(IngestStats::new()),
        }
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Validate and accept a report (fire-and-forget hand-off).
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, report: PositionReport) -> Result<Accepted, InvalidReason> {
        self.submit_tracked(report).map(|(accepted, _)| accepted)
    }

    /// Like `submit`, also returning the hand-off task.
    ///
    /// Each report is published from its own task, so two reports for the
    /// same agent submitted back to back may reach the transport in either order.
    pub fn submit_tracked(
        &self,
        report: PositionReport,
    ) -> Result<(Accepted, JoinHandle<PublishOutcome>), InvalidReason> {
        let now_ms = Utc::now().timestamp_millis();

        let prepared = match prepare(report, self.policy, now_ms) {
            Ok(prepared) => prepared,
            Err(reason) => {
                self.stats.record_rejected();
                warn!(reason = %reason, "Rejected position report");
                return Err(reason);
            }
        };

        // Unset or pre-epoch producer clocks say nothing about lag
        if prepared.timestamp > 0 {
            self.freshness.record(Stage::Ingest, prepared.timestamp, now_ms);
        }
        self.stats.record_accepted();

        debug!(
            agent_id = %prepared.agent_key,
            report_id = %prepared.report_id,
            confidence = %confidence_label(prepared.report.accuracy),
            "Accepted position report"
        );

        let accepted = Accepted {
            report_id: prepared.report_id.clone(),
            agent_id: prepared.report.agent_id.clone().unwrap_or_default(),
            agent_key: prepared.agent_key.clone(),
        };

        let transport = Arc::clone(&self.transport);
        let stats = Arc::clone(&self.stats);
        let handle = tokio::spawn(async move {
            let outcome = match transport.publish(&prepared).await {
                Ok(receipt) => PublishOutcome::Delivered {
                    agent_key: prepared.agent_key,
                    report_id: prepared.report_id,
                    receipt,
                },
                Err(error) => PublishOutcome::Failed {
                    agent_key: prepared.agent_key,
                    report_id: prepared.report_id,
                    error,
                },
            };
            handle_publish_outcome(&outcome, &stats);
            outcome
        });

        Ok((accepted, handle))
    }
}
