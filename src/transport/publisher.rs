use super::{PublishReceipt, ReportTransport, TransportError};
use crate::report::PreparedReport;
use async_nats::{header::NATS_MESSAGE_ID, jetstream, HeaderMap};
use async_trait::async_trait;
use tracing::debug;

/// Position report publisher for NATS JetStream
#[derive(Clone)]
pub struct NatsReportPublisher {
    jetstream: jetstream::Context,
    subject_prefix: String,
}

impl NatsReportPublisher {
    pub fn new(jetstream: jetstream::Context, subject_prefix: impl Into<String>) -> Self {
        Self {
            jetstream,
            subject_prefix: subject_prefix.into(),
        }
    }
}

#[async_trait]
impl ReportTransport for NatsReportPublisher {
    fn name(&self) -> &'static str {
        "nats"
    }

    /// Publish a report and wait for the JetStream ack.
    ///
    /// Subject format: {prefix}.{agentKey}, so one agent's reports stay on one subject.
    /// The report id doubles as the JetStream message id for duplicate suppression.
    async fn publish(&self, report: &PreparedReport) -> Result<PublishReceipt, TransportError> {
        let subject = format!("{}.{}", self.subject_prefix, report.agent_key);
        let payload = serde_json::to_vec(&report.report)
            .map_err(|e| TransportError::Serialize(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(NATS_MESSAGE_ID, report.report_id.as_str());

        debug!(
            report_id = %report.report_id,
            agent_id = %report.agent_key,
            subject = %subject,
            "Publishing position report to NATS"
        );

        let ack = self
            .jetstream
            .publish_with_headers(subject.clone(), headers, payload.into())
            .await
            .map_err(|e| TransportError::Publish {
                route: subject.clone(),
                reason: e.to_string(),
            })?
            .await
            .map_err(|e| TransportError::Ack {
                route: subject.clone(),
                reason: e.to_string(),
            })?;

        Ok(PublishReceipt {
            transport: self.name(),
            route: subject,
            sequence: Some(ack.sequence),
        })
    }
}
