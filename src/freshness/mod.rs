// Event-to-observation latency tracking (observability only)

mod reporter;

pub use reporter::run_freshness_reporter;

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Recent samples kept per stage for percentile estimates
const WINDOW_CAPACITY: usize = 1024;

/// Pipeline stage a freshness sample was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Report accepted by the front door
    Ingest,
    /// Report written to the index
    IndexWrite,
    /// Position served by a query
    Query,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Ingest, Stage::IndexWrite, Stage::Query];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::IndexWrite => "index_write",
            Stage::Query => "query",
        }
    }

    fn slot(&self) -> usize {
        match self {
            Stage::Ingest => 0,
            Stage::IndexWrite => 1,
            Stage::Query => 2,
        }
    }
}

#[derive(Default)]
struct StageStats {
    count: u64,
    sum: i128,
    min: Option<i64>,
    max: Option<i64>,
    last: Option<i64>,
    window: VecDeque<i64>,
}

impl StageStats {
    fn record(&mut self, lag_ms: i64) {
        self.count += 1;
        self.sum += lag_ms as i128;
        self.min = Some(self.min.map_or(lag_ms, |m| m.min(lag_ms)));
        self.max = Some(self.max.map_or(lag_ms, |m| m.max(lag_ms)));
        self.last = Some(lag_ms);

        if self.window.len() == WINDOW_CAPACITY {
            self.window.pop_front();
        }
        self.window.push_back(lag_ms);
    }

    fn snapshot(&self, stage: Stage) -> StageSnapshot {
        let mut sorted: Vec<i64> = self.window.iter().copied().collect();
        sorted.sort_unstable();

        StageSnapshot {
            stage,
            count: self.count,
            mean_ms: (self.count > 0).then(|| self.sum as f64 / self.count as f64),
            min_ms: self.min,
            max_ms: self.max,
            last_ms: self.last,
            p50_ms: percentile(&sorted, 0.50),
            p95_ms: percentile(&sorted, 0.95),
            p99_ms: percentile(&sorted, 0.99),
        }
    }
}

/// Nearest-rank percentile over an ascending slice
fn percentile(sorted: &[i64], q: f64) -> Option<i64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (q * sorted.len() as f64).ceil() as usize;
    Some(sorted[rank.clamp(1, sorted.len()) - 1])
}

/// Records `observation_time − event_timestamp` lags per pipeline stage.
///
/// Recording never blocks on anything but a short per-stage write lock and
/// never fails. Negative lags (producer clock ahead of ours) are kept as-is.
#[derive(Clone, Default)]
pub struct FreshnessMonitor {
    stages: Arc<[RwLock<StageStats>; 3]>,
}

impl FreshnessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample and return the lag in milliseconds.
    pub fn record(&self, stage: Stage, event_timestamp_ms: i64, observed_at_ms: i64) -> i64 {
        let lag_ms = observed_at_ms.saturating_sub(event_timestamp_ms);

        match self.stages[stage.slot()].write() {
            Ok(mut stats) => stats.record(lag_ms),
            Err(poisoned) => poisoned.into_inner().record(lag_ms),
        }

        debug!(stage = stage.as_str(), lag_ms, "Freshness sample");
        lag_ms
    }

    /// Record against the current wall clock.
    pub fn record_now(&self, stage: Stage, event_timestamp_ms: i64) -> i64 {
        self.record(stage, event_timestamp_ms, chrono::Utc::now().timestamp_millis())
    }

    pub fn stage_snapshot(&self, stage: Stage) -> StageSnapshot {
        match self.stages[stage.slot()].read() {
            Ok(stats) => stats.snapshot(stage),
            Err(poisoned) => poisoned.into_inner().snapshot(stage),
        }
    }

    pub fn snapshot(&self) -> FreshnessSnapshot {
        FreshnessSnapshot {
            stages: Stage::ALL.iter().map(|s| self.stage_snapshot(*s)).collect(),
        }
    }
}

/// Distribution summary for one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSnapshot {
    pub stage: Stage,
    pub count: u64,
    pub mean_ms: Option<f64>,
    pub min_ms: Option<i64>,
    pub max_ms: Option<i64>,
    pub last_ms: Option<i64>,
    pub p50_ms: Option<i64>,
    pub p95_ms: Option<i64>,
    pub p99_ms: Option<i64>,
}

/// Summary across all stages
#[derive(Debug, Clone, Serialize)]
pub struct FreshnessSnapshot {
    pub stages: Vec<StageSnapshot>,
}
