// Hand-off between the ingestion front door and the indexer

mod channel;
mod client;
mod publisher;

pub use channel::{partition_for, ChannelTransport};
pub use client::{NatsClient, NatsConfig};
pub use publisher::NatsReportPublisher;

use crate::report::PreparedReport;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Where a report ended up once the transport accepted it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    pub transport: &'static str,
    /// NATS subject or channel partition
    pub route: String,
    /// Stream sequence, when the transport assigns one
    pub sequence: Option<u64>,
}

/// Hand-off failure. The producer has already been told "accepted" when
/// this happens, so the report is lost unless it is sent again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("failed to serialize report: {0}")]
    Serialize(String),
    #[error("publish to '{route}' failed: {reason}")]
    Publish { route: String, reason: String },
    #[error("no ack for '{route}': {reason}")]
    Ack { route: String, reason: String },
    #[error("'{route}' is closed")]
    Closed { route: String },
}

/// At-least-once delivery channel from the front door to the indexer,
/// routed by agent key.
#[async_trait]
pub trait ReportTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, report: &PreparedReport) -> Result<PublishReceipt, TransportError>;
}
