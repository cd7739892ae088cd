use super::{DetailStore, SpatialIndex};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Result of one expiry pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub details_purged: usize,
    pub positions_evicted: usize,
}

/// Run a single expiry pass over both stores.
///
/// Spatial entries are evicted only when `spatial_ttl` is set, which keeps
/// them in lockstep with the detail TTL. Failures are logged and counted as zero.
pub async fn sweep_once(
    spatial: &dyn SpatialIndex,
    details: &dyn DetailStore,
    spatial_ttl: Option<Duration>,
) -> SweepReport {
    let details_purged = match details.purge_expired().await {
        Ok(n) => n,
        Err(e) => {
            error!(error = %e, "Failed to purge expired agent details");
            0
        }
    };

    let positions_evicted = match spatial_ttl {
        Some(ttl) => match spatial.evict_stale(ttl).await {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "Failed to evict stale positions");
                0
            }
        },
        None => 0,
    };

    SweepReport {
        details_purged,
        positions_evicted,
    }
}

/// Periodically expire stale entries from both stores.
///
/// Runs until the task is cancelled.
pub async fn run_expiry_sweeper(
    spatial: Arc<dyn SpatialIndex>,
    details: Arc<dyn DetailStore>,
    spatial_ttl: Option<Duration>,
    interval_seconds: u64,
) {
    info!(
        interval_seconds,
        spatial_ttl = ?spatial_ttl,
        "Starting expiry sweeper"
    );

    let mut ticker = interval(Duration::from_secs(interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let report = sweep_once(spatial.as_ref(), details.as_ref(), spatial_ttl).await;
        if report.details_purged > 0 || report.positions_evicted > 0 {
            info!(
                details_purged = report.details_purged,
                positions_evicted = report.positions_evicted,
                "Expired stale agents"
            );
        } else {
            debug!("Expiry sweep found nothing to remove");
        }
    }
}
