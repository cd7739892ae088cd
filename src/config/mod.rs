pub mod runtime;
pub use runtime::{current, new_runtime_config, RuntimeConfig, SharedRuntimeConfig};

use crate::report::TimestampPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// Re-export existing config types
pub use crate::transport::NatsConfig;

/// Complete geotrack configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Hand-off between ingestion and indexing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// NATS JetStream (durable, at-least-once)
    #[default]
    Nats,
    /// In-process partitioned channels (single node, not durable)
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,
    /// Partition count for the in-process transport
    #[serde(default = "default_partitions")]
    pub partitions: usize,
    /// Buffered reports per partition
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_partitions() -> usize {
    4
}

fn default_channel_capacity() -> usize {
    10_000
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            partitions: default_partitions(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Spatial index and detail store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Sliding expiration of agent details
    #[serde(default = "default_ttl_seconds")]
    pub detail_ttl_seconds: u64,
    /// Age after which a position drops out of the spatial index (0 = never)
    #[serde(default = "default_ttl_seconds")]
    pub spatial_ttl_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Reset the detail TTL on reads as well as writes
    #[serde(default)]
    pub refresh_on_read: bool,
}

fn default_ttl_seconds() -> u64 {
    1800 // 30 minutes
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            detail_ttl_seconds: default_ttl_seconds(),
            spatial_ttl_seconds: default_ttl_seconds(),
            sweep_interval_seconds: default_sweep_interval(),
            refresh_on_read: false,
        }
    }
}

impl StoreConfig {
    pub fn detail_ttl(&self) -> Duration {
        Duration::from_secs(self.detail_ttl_seconds)
    }

    pub fn spatial_ttl(&self) -> Option<Duration> {
        (self.spatial_ttl_seconds > 0).then(|| Duration::from_secs(self.spatial_ttl_seconds))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    /// Messages indexed at once by the NATS consumer
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub timestamp_policy: TimestampPolicy,
}

fn default_concurrency() -> usize {
    16
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timestamp_policy: TimestampPolicy::default(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// How often to log the freshness summary (seconds)
    #[serde(default = "default_report_interval")]
    pub report_interval_seconds: u64,
}

fn default_report_interval() -> u64 {
    30
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_seconds: default_report_interval(),
        }
    }
}

/// API configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Bearer token for PUT /api/admin/config (None = unrestricted)
    #[serde(default)]
    pub admin_token: Option<String>,
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<ServiceConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: ServiceConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Load from `path` if it exists (defaults otherwise), then apply env overrides.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ServiceConfig> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        load_config(path)?
    } else {
        ServiceConfig::default()
    };
    config.apply_env_overrides();
    Ok(config)
}

impl ServiceConfig {
    /// NATS_URL, GEOTRACK_BIND_ADDR and GEOTRACK_ADMIN_TOKEN win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("NATS_URL") {
            self.nats.url = url;
        }
        if let Ok(addr) = std::env::var("GEOTRACK_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Ok(token) = std::env::var("GEOTRACK_ADMIN_TOKEN") {
            if !token.is_empty() {
                self.api.admin_token = Some(token);
            }
        }
    }
}
