use super::FreshnessMonitor;
use crate::ingest::IngestStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Periodically log a freshness summary per stage plus ingest counters.
///
/// Stages with no samples yet are skipped.
pub async fn run_freshness_reporter(
    monitor: FreshnessMonitor,
    ingest_stats: Arc<IngestStats>,
    interval_seconds: u64,
) {
    let mut ticker = interval(Duration::from_secs(interval_seconds.max(1)));

    // Skip missed ticks to prevent backlog under load
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        for stage in monitor.snapshot().stages.iter().filter(|s| s.count > 0) {
            info!(
                stage = stage.stage.as_str(),
                samples = stage.count,
                p50_ms = ?stage.p50_ms,
                p95_ms = ?stage.p95_ms,
                max_ms = ?stage.max_ms,
                "Freshness"
            );
        }

        let counts = ingest_stats.snapshot();
        info!(
            accepted = counts.accepted,
            delivered = counts.delivered,
            lost = counts.lost,
            "Ingest hand-off"
        );
    }
}
