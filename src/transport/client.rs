use anyhow::{Context, Result};
use async_nats::jetstream::{self, stream};
use serde::Deserialize;
use tracing::info;

/// NATS configuration
#[derive(Clone, Debug, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_stream_name")]
    pub stream_name: String,
    /// Reports are published to `{subject_prefix}.{agentKey}`
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: i64,
}

fn default_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

fn default_stream_name() -> String {
    "POSITION_REPORTS".to_string()
}

fn default_subject_prefix() -> String {
    "positions.reports".to_string()
}

fn default_consumer_name() -> String {
    "position-indexer".to_string()
}

fn default_max_age_hours() -> u64 {
    24
}

fn default_max_bytes() -> i64 {
    1024 * 1024 * 1024 // 1GB
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            stream_name: default_stream_name(),
            subject_prefix: default_subject_prefix(),
            consumer_name: default_consumer_name(),
            max_age_hours: default_max_age_hours(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl NatsConfig {
    /// Wildcard covering every agent subject
    pub fn subject_filter(&self) -> String {
        format!("{}.>", self.subject_prefix)
    }

    /// Subject for one agent
    pub fn subject_for(&self, agent_key: &str) -> String {
        format!("{}.{}", self.subject_prefix, agent_key)
    }
}

/// NATS client with JetStream
pub struct NatsClient {
    jetstream: jetstream::Context,
    config: NatsConfig,
}

impl NatsClient {
    /// Connect to NATS and initialize JetStream
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        info!(url = %config.url, "Connecting to NATS");

        let client = async_nats::connect(&config.url)
            .await
            .context("Failed to connect to NATS")?;

        let jetstream = jetstream::new(client);

        let nats_client = Self { jetstream, config };
        nats_client.ensure_stream().await?;

        Ok(nats_client)
    }

    /// Ensure the position report stream exists.
    ///
    /// Limits retention: the stream is a hand-off buffer, not the system of record.
    async fn ensure_stream(&self) -> Result<()> {
        if self
            .jetstream
            .get_stream(&self.config.stream_name)
            .await
            .is_ok()
        {
            info!(stream = %self.config.stream_name, "Stream already exists");
            return Ok(());
        }

        let stream_config = stream::Config {
            name: self.config.stream_name.clone(),
            subjects: vec![self.config.subject_filter()],
            max_age: std::time::Duration::from_secs(self.config.max_age_hours * 3600),
            max_bytes: self.config.max_bytes,
            storage: stream::StorageType::File,
            retention: stream::RetentionPolicy::Limits,
            ..Default::default()
        };

        self.jetstream
            .create_stream(stream_config)
            .await
            .context("Failed to create JetStream stream")?;

        info!(stream = %self.config.stream_name, "Created JetStream stream");
        Ok(())
    }

    /// JetStream context for publishing and consuming
    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects() {
        let config = NatsConfig {
            subject_prefix: "positions.reports".to_string(),
            ..NatsConfig::default()
        };
        assert_eq!(config.subject_filter(), "positions.reports.>");
        assert_eq!(config.subject_for("rider_1"), "positions.reports.rider_1");
    }
}
