use super::{PublishReceipt, ReportTransport, TransportError};
use crate::report::{PositionReport, PreparedReport};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::mpsc;

/// Partition index for an agent key. Stable for the life of the process.
pub fn partition_for(agent_key: &str, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    agent_key.hash(&mut hasher);
    (hasher.finish() % partitions.max(1) as u64) as usize
}

/// In-process transport: one bounded channel per partition.
///
/// Every report for an agent lands on the same partition, so a single worker
/// per partition sees that agent's reports in submission order. Not durable:
/// anything buffered is lost on shutdown.
#[derive(Clone)]
pub struct ChannelTransport {
    partitions: Vec<mpsc::Sender<PositionReport>>,
}

impl ChannelTransport {
    /// Create the transport and the receivers to hand to indexing workers.
    pub fn new(partitions: usize, capacity: usize) -> (Self, Vec<mpsc::Receiver<PositionReport>>) {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..partitions.max(1))
            .map(|_| mpsc::channel(capacity.max(1)))
            .unzip();
        (
            Self {
                partitions: senders,
            },
            receivers,
        )
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

#[async_trait]
impl ReportTransport for ChannelTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    /// Waits for buffer space, so a full partition applies backpressure.
    async fn publish(&self, report: &PreparedReport) -> Result<PublishReceipt, TransportError> {
        let partition = partition_for(&report.agent_key, self.partitions.len());
        let route = format!("partition-{}", partition);

        self.partitions[partition]
            .send(report.report.clone())
            .await
            .map_err(|_| TransportError::Closed { route: route.clone() })?;

        Ok(PublishReceipt {
            transport: self.name(),
            route,
            sequence: None,
        })
    }
}
