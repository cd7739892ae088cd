use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::{is_valid_coordinate, prepare, validate, InvalidReason, TimestampPolicy};

/// PositionReport is a single raw position sample sent by a mobile agent.
///
/// Every field is optional on the wire so that a malformed report can be
/// deserialized and rejected with a precise reason instead of a parse error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    /// Time-ordered report identifier (UUIDv7).
    /// Assigned at ingestion if not provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,

    /// Rider / vehicle identity as sent by the producer.
    #[serde(default, alias = "userId")]
    pub agent_id: Option<String>,

    /// Free-form category tag (e.g. "DELIVERY", "TAXI", "car")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,

    /// Degrees, [-90, 90]
    #[serde(default)]
    pub latitude: Option<f64>,

    /// Degrees, [-180, 180]
    #[serde(default)]
    pub longitude: Option<f64>,

    /// Direction of travel in degrees, [0, 360]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    /// GPS error radius in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,

    /// Free-form lifecycle tag (e.g. "AVAILABLE", "ON_TASK", "OFF_LINE")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Unix epoch milliseconds (producer time)
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// A report that passed validation and carries a normalized index key.
///
/// Only prepared reports are handed to the transport; the indexer can still
/// re-check them because transport payloads may come from other producers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedReport {
    /// Normalized key: `[A-Za-z0-9_]+`
    pub agent_key: String,
    pub report_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Producer timestamp, or processing time when the producer sent none
    pub timestamp: i64,
    /// The full report as received (with `reportId` and `timestamp` filled in)
    pub report: PositionReport,
}

/// Last-known full report for an agent, kept in the detail store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDetail {
    pub agent_id: String,
    pub report: PositionReport,
    pub indexed_at: DateTime<Utc>,
}

impl PositionReport {
    /// Convenience constructor for a report carrying only the required fields.
    pub fn at(agent_id: impl Into<String>, latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            latitude: Some(latitude),
            longitude: Some(longitude),
            timestamp: Some(timestamp),
            ..Default::default()
        }
    }

    /// Validates the report without modifying it.
    pub fn validate(&self, policy: TimestampPolicy) -> Result<(), InvalidReason> {
        validation::validate(self, policy)
    }
}
