use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Runtime-configurable limits. Changes via PUT /api/admin/config take effect immediately
/// without restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Search radius used to approximate KNN (meters)
    pub knn_backstop_radius_m: f64,
    /// Upper bound on a single spatial-index call during a query
    pub query_timeout_ms: u64,
    /// Inflation applied to the polygon MBR diagonal before the filter pass.
    /// 1.1 covers small polygons; wide boxes far from the equator need more
    /// (see `PolygonRegion::filter_circle`).
    pub pip_filter_margin: f64,
    pub body_size_limit_single_bytes: usize,
    pub body_size_limit_batch_bytes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            knn_backstop_radius_m: 5_000.0,
            query_timeout_ms: 3_000,
            pip_filter_margin: 1.1,
            body_size_limit_single_bytes: 65_536,     // 64 KB
            body_size_limit_batch_bytes: 10_485_760,  // 10 MB
        }
    }
}

impl RuntimeConfig {
    /// Build from env vars, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_parse("GEOTRACK_KNN_BACKSTOP_RADIUS_M") {
            cfg.knn_backstop_radius_m = v;
        }
        if let Some(v) = env_parse("GEOTRACK_QUERY_TIMEOUT_MS") {
            cfg.query_timeout_ms = v;
        }
        if let Some(v) = env_parse("GEOTRACK_PIP_FILTER_MARGIN") {
            cfg.pip_filter_margin = v;
        }
        if let Some(v) = env_parse("GEOTRACK_BODY_SIZE_LIMIT_SINGLE_BYTES") {
            cfg.body_size_limit_single_bytes = v;
        }
        if let Some(v) = env_parse("GEOTRACK_BODY_SIZE_LIMIT_BATCH_BYTES") {
            cfg.body_size_limit_batch_bytes = v;
        }

        cfg
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}

pub type SharedRuntimeConfig = Arc<RwLock<RuntimeConfig>>;

pub fn new_runtime_config() -> SharedRuntimeConfig {
    Arc::new(RwLock::new(RuntimeConfig::from_env()))
}

/// Copy of the current runtime config. A poisoned lock still yields the last
/// written values.
pub fn current(config: &SharedRuntimeConfig) -> RuntimeConfig {
    match config.read() {
        Ok(cfg) => cfg.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}
