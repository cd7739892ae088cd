use super::DualWriteIndexer;
use crate::report::PositionReport;
use crate::transport::NatsConfig;
use anyhow::{Context, Result};
use async_nats::jetstream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Consume position reports from JetStream and index them.
///
/// Messages are acked after indexing (at-least-once). Up to `concurrency`
/// messages are indexed at once, so two reports for the same agent can
/// finish out of order. Malformed payloads are acked and skipped.
pub async fn run_nats_consumer(
    indexer: Arc<DualWriteIndexer>,
    jetstream: jetstream::Context,
    config: NatsConfig,
    concurrency: usize,
) -> Result<()> {
    info!(
        stream = %config.stream_name,
        consumer = %config.consumer_name,
        concurrency,
        "Starting position indexer NATS consumer"
    );

    let stream = jetstream
        .get_stream(&config.stream_name)
        .await
        .with_context(|| format!("Failed to get {} stream", config.stream_name))?;

    let consumer = stream
        .get_or_create_consumer(
            &config.consumer_name,
            jetstream::consumer::pull::Config {
                durable_name: Some(config.consumer_name.clone()),
                filter_subject: config.subject_filter(),
                ..Default::default()
            },
        )
        .await
        .context("Failed to get or create consumer")?;

    info!("Position indexer consumer created, processing reports...");

    let messages = consumer.messages().await?;

    messages
        .for_each_concurrent(concurrency.max(1), |msg| {
            let indexer = Arc::clone(&indexer);
            async move {
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => {
                        error!(error = %e, "Error receiving message");
                        return;
                    }
                };

                match serde_json::from_slice::<PositionReport>(&msg.payload) {
                    Ok(report) => {
                        indexer.index(report).await;
                        if let Err(e) = msg.ack().await {
                            error!(error = %e, "Failed to acknowledge message");
                        }
                    }
                    Err(e) => {
                        error!(
                            error = %e,
                            subject = %msg.subject,
                            "Failed to deserialize position report, skipping"
                        );
                        // Acknowledge to prevent redelivery of malformed messages
                        let _ = msg.ack().await;
                    }
                }
            }
        })
        .await;

    warn!("Position indexer consumer stream ended");
    Ok(())
}

/// Index reports from one in-process partition, in arrival order.
///
/// Returns when every sender for the partition has been dropped.
pub async fn run_partition_worker(
    indexer: Arc<DualWriteIndexer>,
    partition: usize,
    mut rx: mpsc::Receiver<PositionReport>,
) {
    info!(partition, "Starting partition indexer");

    while let Some(report) = rx.recv().await {
        indexer.index(report).await;
    }

    info!(partition, "Partition closed, indexer stopping");
}

/// One worker task per partition receiver.
pub fn spawn_partition_workers(
    indexer: Arc<DualWriteIndexer>,
    receivers: Vec<mpsc::Receiver<PositionReport>>,
) -> Vec<JoinHandle<()>> {
    receivers
        .into_iter()
        .enumerate()
        .map(|(partition, rx)| {
            tokio::spawn(run_partition_worker(Arc::clone(&indexer), partition, rx))
        })
        .collect()
}
