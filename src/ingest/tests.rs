use super::*;
use crate::report::PreparedReport;
use crate::transport::{ChannelTransport, PublishReceipt, TransportError};
use async_trait::async_trait;

struct BrokenTransport;

#[async_trait]
impl ReportTransport for BrokenTransport {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn publish(&self, report: &PreparedReport) -> Result<PublishReceipt, TransportError> {
        Err(TransportError::Publish {
            route: format!("broken.{}", report.agent_key),
            reason: "connection refused".to_string(),
        })
    }
}

fn front_door(transport: Arc<dyn ReportTransport>) -> (IngestionFrontDoor, FreshnessMonitor) {
    let freshness = FreshnessMonitor::new();
    let door = IngestionFrontDoor::new(transport, freshness.clone(), TimestampPolicy::Substitute);
    (door, freshness)
}

#[tokio::test]
async fn test_accepted_report_reaches_transport() {
    let (transport, mut receivers) = ChannelTransport::new(1, 8);
    let (door, freshness) = front_door(Arc::new(transport));
    assert_eq!(door.transport_name(), "memory");

    let (accepted, handle) = door
        .submit_tracked(PositionReport::at("rider-42", 1.3, 103.8, 1_000))
        .unwrap();
    assert_eq!(accepted.agent_id, "rider-42");
    assert_eq!(accepted.agent_key, "rider42");
    assert!(!accepted.report_id.is_empty());

    let outcome = handle.await.unwrap();
    assert!(outcome.is_delivered());

    let delivered = receivers[0].recv().await.unwrap();
    assert_eq!(delivered.report_id.as_deref(), Some(accepted.report_id.as_str()));
    assert_eq!(delivered.agent_id.as_deref(), Some("rider-42"));

    let counts = door.stats().snapshot();
    assert_eq!(counts.accepted, 1);
    assert_eq!(counts.delivered, 1);
    assert_eq!(counts.lost, 0);
    assert_eq!(freshness.stage_snapshot(Stage::Ingest).count, 1);
}

#[tokio::test]
async fn test_invalid_report_is_rejected_synchronously() {
    let (transport, mut receivers) = ChannelTransport::new(1, 8);
    let (door, freshness) = front_door(Arc::new(transport));

    let result = door.submit(PositionReport::at("rider_1", 91.0, 0.0, 1_000));
    assert!(matches!(
        result,
        Err(InvalidReason::CoordinateOutOfRange { .. })
    ));

    let result = door.submit(PositionReport::at("---", 1.0, 1.0, 1_000));
    assert_eq!(result, Err(InvalidReason::MissingIdentity));

    assert!(receivers[0].try_recv().is_err());
    let counts = door.stats().snapshot();
    assert_eq!(counts.accepted, 0);
    assert_eq!(counts.rejected, 2);
    assert_eq!(freshness.stage_snapshot(Stage::Ingest).count, 0);
}

#[tokio::test]
async fn test_transport_failure_after_acceptance_is_counted_as_lost() {
    let (door, _) = front_door(Arc::new(BrokenTransport));

    // The producer is told "accepted" even though the hand-off will fail
    let (accepted, handle) = door
        .submit_tracked(PositionReport::at("rider_1", 1.0, 1.0, 1_000))
        .unwrap();

    match handle.await.unwrap() {
        PublishOutcome::Failed {
            agent_key,
            report_id,
            error,
        } => {
            assert_eq!(agent_key, "rider_1");
            assert_eq!(report_id, accepted.report_id);
            assert!(matches!(error, TransportError::Publish { .. }));
        }
        other => panic!("expected failure, got {:?}", other),
    }

    let counts = door.stats().snapshot();
    assert_eq!(counts.accepted, 1);
    assert_eq!(counts.delivered, 0);
    assert_eq!(counts.lost, 1);
}

#[tokio::test]
async fn test_missing_timestamp_is_substituted() {
    let (transport, mut receivers) = ChannelTransport::new(1, 8);
    let (door, freshness) = front_door(Arc::new(transport));

    let report = PositionReport {
        timestamp: None,
        ..PositionReport::at("rider_1", 1.0, 1.0, 0)
    };
    let (_, handle) = door.submit_tracked(report).unwrap();
    handle.await.unwrap();

    let delivered = receivers[0].recv().await.unwrap();
    assert!(delivered.timestamp.unwrap() > 0);
    assert_eq!(freshness.stage_snapshot(Stage::Ingest).last_ms, Some(0));
}

#[tokio::test]
async fn test_require_policy_rejects_missing_timestamp() {
    let (transport, _receivers) = ChannelTransport::new(1, 8);
    let door = IngestionFrontDoor::new(
        Arc::new(transport),
        FreshnessMonitor::new(),
        TimestampPolicy::Require,
    );

    let report = PositionReport {
        timestamp: None,
        ..PositionReport::at("rider_1", 1.0, 1.0, 0)
    };
    assert_eq!(door.submit(report), Err(InvalidReason::MissingTimestamp));
}

#[tokio::test]
async fn test_zero_or_negative_timestamp_skips_ingest_sample() {
    let (transport, mut receivers) = ChannelTransport::new(1, 8);
    let (door, freshness) = front_door(Arc::new(transport));

    door.submit(PositionReport::at("rider_1", 1.0, 1.0, 0)).unwrap();
    door.submit(PositionReport::at("rider_2", 1.0, 1.0, -5_000)).unwrap();

    // Still accepted and handed off
    assert!(receivers[0].recv().await.is_some());
    assert!(receivers[0].recv().await.is_some());
    assert_eq!(door.stats().snapshot().accepted, 2);

    let ingest = freshness.stage_snapshot(Stage::Ingest);
    assert_eq!(ingest.count, 0);
    assert_eq!(ingest.max_ms, None);
}
