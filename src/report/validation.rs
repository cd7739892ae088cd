use super::{PositionReport, PreparedReport};
use crate::identity::normalize_agent_id;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// Reasons a position report is rejected before entering the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidReason {
    #[error("agentId is required")]
    MissingIdentity,
    #[error("latitude and longitude are required")]
    MissingCoordinates,
    #[error("coordinate out of range: latitude {latitude}, longitude {longitude}")]
    CoordinateOutOfRange { latitude: f64, longitude: f64 },
    #[error("timestamp is required")]
    MissingTimestamp,
    #[error("heading must be within [0, 360], got {0}")]
    HeadingOutOfRange(f64),
    #[error("speed must be zero or positive, got {0}")]
    NegativeSpeed(f64),
}

/// What to do with a report that carries no producer timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    /// Accept and stamp with processing time (freshness reads as ~0 lag).
    #[default]
    Substitute,
    /// Reject with `MissingTimestamp`.
    Require,
}

/// Validates a PositionReport.
///
/// Validation rules:
/// - agentId: present and not blank
/// - latitude, longitude: present, finite, within [-90, 90] / [-180, 180]
/// - heading (optional): within [0, 360]
/// - speed (optional): zero or positive
/// - timestamp: only checked under `TimestampPolicy::Require`
pub fn validate(report: &PositionReport, policy: TimestampPolicy) -> Result<(), InvalidReason> {
    match report.agent_id.as_deref() {
        Some(id) if !id.trim().is_empty() => {}
        _ => return Err(InvalidReason::MissingIdentity),
    }

    let (latitude, longitude) = match (report.latitude, report.longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(InvalidReason::MissingCoordinates),
    };

    if !is_valid_coordinate(latitude, longitude) {
        return Err(InvalidReason::CoordinateOutOfRange {
            latitude,
            longitude,
        });
    }

    if let Some(heading) = report.heading {
        if !(0.0..=360.0).contains(&heading) {
            return Err(InvalidReason::HeadingOutOfRange(heading));
        }
    }

    if let Some(speed) = report.speed {
        // NaN fails the range check too
        if !(speed >= 0.0 && speed.is_finite()) {
            return Err(InvalidReason::NegativeSpeed(speed));
        }
    }

    if policy == TimestampPolicy::Require && report.timestamp.is_none() {
        return Err(InvalidReason::MissingTimestamp);
    }

    Ok(())
}

/// Validates a report and turns it into a PreparedReport.
///
/// This function:
/// - Runs `validate`
/// - Normalizes the agent id into an index key (rejecting ids with no safe characters)
/// - Substitutes `now_ms` for a missing timestamp
/// - Generates a UUIDv7 report id if missing or empty
pub fn prepare(
    mut report: PositionReport,
    policy: TimestampPolicy,
    now_ms: i64,
) -> Result<PreparedReport, InvalidReason> {
    validate(&report, policy)?;

    let agent_key = normalize_agent_id(report.agent_id.as_deref().unwrap_or_default());
    if agent_key.is_empty() {
        return Err(InvalidReason::MissingIdentity);
    }

    let timestamp = *report.timestamp.get_or_insert(now_ms);

    if report.report_id.as_ref().map_or(true, |id| id.is_empty()) {
        report.report_id = Some(Uuid::now_v7().to_string());
    }
    let report_id = report.report_id.clone().unwrap_or_default();

    // validate() guarantees both coordinates are present
    let (latitude, longitude) = match (report.latitude, report.longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(InvalidReason::MissingCoordinates),
    };

    Ok(PreparedReport {
        agent_key,
        report_id,
        latitude,
        longitude,
        timestamp,
        report,
    })
}

/// True if `lat`/`lon` are finite and within [-90, 90] / [-180, 180].
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    is_valid_latitude(lat) && is_valid_longitude(lon)
}

pub(crate) fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat)
}

pub(crate) fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon)
}
