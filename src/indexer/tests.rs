use super::*;
use crate::geometry::GeoPoint;
use crate::store::{MemoryDetailStore, MemorySpatialIndex, Neighbor};
use crate::transport::{ChannelTransport, ReportTransport};
use async_trait::async_trait;

const TTL: Duration = Duration::from_secs(1800);

/// Spatial backend that is always down
struct DownSpatial;

#[async_trait]
impl SpatialIndex for DownSpatial {
    fn backend(&self) -> &'static str {
        "down"
    }

    async fn upsert(&self, _position: IndexedPosition) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn query_radius(
        &self,
        _center: GeoPoint,
        _radius_m: f64,
        _limit: Option<usize>,
    ) -> Result<Vec<Neighbor>, StoreError> {
        Err(unavailable())
    }

    async fn remove(&self, _agent_id: &str) -> Result<bool, StoreError> {
        Err(unavailable())
    }

    async fn evict_stale(&self, _max_age: Duration) -> Result<usize, StoreError> {
        Err(unavailable())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Err(unavailable())
    }
}

/// Detail backend that is always down
struct DownDetails;

#[async_trait]
impl DetailStore for DownDetails {
    fn backend(&self) -> &'static str {
        "down"
    }

    async fn set(&self, _: &str, _: AgentDetail, _: Duration) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn get(&self, _: &str) -> Result<Option<AgentDetail>, StoreError> {
        Err(unavailable())
    }

    async fn remove(&self, _: &str) -> Result<bool, StoreError> {
        Err(unavailable())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        Err(unavailable())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Err(unavailable())
    }
}

fn unavailable() -> StoreError {
    StoreError::Unavailable {
        backend: "down",
        reason: "connection refused".to_string(),
    }
}

struct Fixture {
    spatial: Arc<MemorySpatialIndex>,
    details: Arc<MemoryDetailStore>,
    freshness: FreshnessMonitor,
    indexer: Arc<DualWriteIndexer>,
}

fn fixture() -> Fixture {
    let spatial = Arc::new(MemorySpatialIndex::new());
    let details = Arc::new(MemoryDetailStore::new());
    let freshness = FreshnessMonitor::new();
    let indexer = Arc::new(DualWriteIndexer::new(
        spatial.clone(),
        details.clone(),
        freshness.clone(),
        TTL,
    ));
    Fixture {
        spatial,
        details,
        freshness,
        indexer,
    }
}

#[tokio::test]
async fn test_index_writes_both_stores() {
    let f = fixture();
    let report = PositionReport {
        accuracy: Some(4.0),
        status: Some("AVAILABLE".to_string()),
        ..PositionReport::at("rider-1", 1.30, 103.80, 1_000)
    };

    let outcome = f.indexer.index(report).await;
    assert_eq!(
        outcome,
        IndexOutcome::Indexed {
            agent_key: "rider1".to_string()
        }
    );

    let position = f.spatial.get("rider1").unwrap();
    assert_eq!((position.lat, position.lon), (1.30, 103.80));
    assert_eq!(position.timestamp, 1_000);

    let detail = f.details.get("rider1").await.unwrap().unwrap();
    assert_eq!(detail.agent_id, "rider1");
    assert_eq!(detail.report.agent_id.as_deref(), Some("rider-1"));
    assert_eq!(detail.report.status.as_deref(), Some("AVAILABLE"));
    assert!(f.details.time_to_live("rider1").unwrap() <= TTL);

    assert_eq!(f.freshness.stage_snapshot(Stage::IndexWrite).count, 1);
}

#[tokio::test]
async fn test_same_report_twice_leaves_one_entry_per_store() {
    let f = fixture();
    let report = PositionReport::at("rider_1", 1.0, 2.0, 1_000);

    f.indexer.index(report.clone()).await;
    f.indexer.index(report).await;

    assert_eq!(f.spatial.len().await.unwrap(), 1);
    assert_eq!(f.details.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_payload_is_never_indexed() {
    let f = fixture();

    let outcome = f
        .indexer
        .index(PositionReport::at("rider_1", 0.0, 181.0, 1_000))
        .await;
    assert!(matches!(
        outcome,
        IndexOutcome::Rejected(InvalidReason::CoordinateOutOfRange { .. })
    ));

    let outcome = f.indexer.index(PositionReport::default()).await;
    assert_eq!(outcome, IndexOutcome::Rejected(InvalidReason::MissingIdentity));

    assert_eq!(f.spatial.len().await.unwrap(), 0);
    assert_eq!(f.details.len().await.unwrap(), 0);
    assert_eq!(f.freshness.stage_snapshot(Stage::IndexWrite).count, 0);
}

#[tokio::test]
async fn test_spatial_failure_does_not_block_detail_write() {
    let details = Arc::new(MemoryDetailStore::new());
    let indexer = DualWriteIndexer::new(
        Arc::new(DownSpatial),
        details.clone(),
        FreshnessMonitor::new(),
        TTL,
    );

    match indexer.index(PositionReport::at("rider_1", 1.0, 2.0, 1_000)).await {
        IndexOutcome::Degraded { agent_key, failures } => {
            assert_eq!(agent_key, "rider_1");
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].target, WriteTarget::Spatial);
        }
        other => panic!("expected degraded outcome, got {:?}", other),
    }

    assert!(details.get("rider_1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_detail_failure_does_not_block_spatial_write() {
    let spatial = Arc::new(MemorySpatialIndex::new());
    let indexer = DualWriteIndexer::new(
        spatial.clone(),
        Arc::new(DownDetails),
        FreshnessMonitor::new(),
        TTL,
    );

    match indexer.index(PositionReport::at("rider_1", 1.0, 2.0, 1_000)).await {
        IndexOutcome::Degraded { failures, .. } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].target, WriteTarget::Detail);
            assert!(failures[0].to_string().contains("detail store"));
        }
        other => panic!("expected degraded outcome, got {:?}", other),
    }

    assert!(spatial.get("rider_1").is_some());
}

#[tokio::test]
async fn test_both_stores_down_records_no_freshness() {
    let freshness = FreshnessMonitor::new();
    let indexer = DualWriteIndexer::new(
        Arc::new(DownSpatial),
        Arc::new(DownDetails),
        freshness.clone(),
        TTL,
    );

    match indexer.index(PositionReport::at("rider_1", 1.0, 2.0, 1_000)).await {
        IndexOutcome::Degraded { failures, .. } => assert_eq!(failures.len(), 2),
        other => panic!("expected degraded outcome, got {:?}", other),
    }
    assert_eq!(freshness.stage_snapshot(Stage::IndexWrite).count, 0);
}

#[tokio::test]
async fn test_zero_timestamp_skips_freshness_sample() {
    let f = fixture();
    f.indexer
        .index(PositionReport::at("rider_1", 1.0, 2.0, 0))
        .await;

    assert!(f.spatial.get("rider_1").is_some());
    assert_eq!(f.freshness.stage_snapshot(Stage::IndexWrite).count, 0);
}

#[tokio::test]
async fn test_out_of_order_reports_last_writer_wins() {
    let f = fixture();

    // The newer report lands first, then a delayed older one overwrites it.
    f.indexer
        .index(PositionReport::at("rider_1", 1.0, 1.0, 2_000))
        .await;
    f.indexer
        .index(PositionReport::at("rider_1", 5.0, 5.0, 1_000))
        .await;

    let position = f.spatial.get("rider_1").unwrap();
    assert_eq!(position.timestamp, 1_000);
    assert_eq!((position.lat, position.lon), (5.0, 5.0));

    let detail = f.details.get("rider_1").await.unwrap().unwrap();
    assert_eq!(detail.report.timestamp, Some(1_000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_same_agent_keep_single_entry() {
    let f = fixture();

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let indexer = Arc::clone(&f.indexer);
            tokio::spawn(async move {
                let lat = i as f64 * 0.01;
                indexer
                    .index(PositionReport::at("rider_1", lat, lat, 1_000 + i))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(f.spatial.len().await.unwrap(), 1);
    assert_eq!(f.details.len().await.unwrap(), 1);

    // Whichever write finished last wins; it is one of the submitted reports
    let position = f.spatial.get("rider_1").unwrap();
    assert!((1_000..1_032).contains(&position.timestamp));
    assert_eq!(position.lat, (position.timestamp - 1_000) as f64 * 0.01);
}

#[tokio::test]
async fn test_partition_workers_drain_channel_transport() {
    let f = fixture();
    let (transport, receivers) = ChannelTransport::new(2, 16);
    let workers = spawn_partition_workers(Arc::clone(&f.indexer), receivers);

    for (i, agent) in ["rider_1", "rider_2", "rider_3"].iter().enumerate() {
        let prepared = prepare(
            PositionReport::at(*agent, i as f64, i as f64, 1_000),
            TimestampPolicy::Substitute,
            0,
        )
        .unwrap();
        transport.publish(&prepared).await.unwrap();
    }

    drop(transport);
    for worker in workers {
        worker.await.unwrap();
    }

    assert_eq!(f.spatial.len().await.unwrap(), 3);
    assert_eq!(f.details.len().await.unwrap(), 3);
}
