// End-to-end tests: HTTP ingestion → channel transport → dual-write indexer → queries
//
// Ingestion is asynchronous, so tests poll until the report becomes visible.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use geotrack::api::{
    create_agents_router, create_ingestion_router, create_search_router, AgentsAppState,
    IngestionAppState, SearchAppState,
};
use geotrack::config::new_runtime_config;
use geotrack::freshness::{FreshnessMonitor, Stage};
use geotrack::indexer::{spawn_partition_workers, DualWriteIndexer};
use geotrack::ingest::IngestionFrontDoor;
use geotrack::query::QueryEvaluator;
use geotrack::report::TimestampPolicy;
use geotrack::store::{DetailStore, MemoryDetailStore, MemorySpatialIndex, SpatialIndex};
use geotrack::transport::ChannelTransport;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct Pipeline {
    app: Router,
    spatial: Arc<MemorySpatialIndex>,
    details: Arc<MemoryDetailStore>,
    freshness: FreshnessMonitor,
}

fn create_pipeline(admin_token: Option<&str>) -> Pipeline {
    let spatial = Arc::new(MemorySpatialIndex::new());
    let details = Arc::new(MemoryDetailStore::new());
    let freshness = FreshnessMonitor::new();
    let runtime_config = new_runtime_config();

    let indexer = Arc::new(DualWriteIndexer::new(
        spatial.clone(),
        details.clone(),
        freshness.clone(),
        Duration::from_secs(1800),
    ));
    let (transport, receivers) = ChannelTransport::new(4, 64);
    spawn_partition_workers(indexer, receivers);

    let front_door = IngestionFrontDoor::new(
        Arc::new(transport),
        freshness.clone(),
        TimestampPolicy::Substitute,
    );

    let app = create_ingestion_router(IngestionAppState {
        front_door,
        runtime_config: runtime_config.clone(),
    })
    .merge(create_search_router(SearchAppState {
        evaluator: QueryEvaluator::new(spatial.clone(), runtime_config, freshness.clone()),
    }))
    .merge(create_agents_router(AgentsAppState {
        spatial: spatial.clone(),
        details: details.clone(),
        admin_token: admin_token.map(|t| t.to_string()),
    }));

    Pipeline {
        app,
        spatial,
        details,
        freshness,
    }
}

fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn wait_for_position(spatial: &MemorySpatialIndex, key: &str, timestamp: i64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if spatial.get(key).map(|p| p.timestamp) == Some(timestamp) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "position for {} at {} never indexed",
            key,
            timestamp
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn report(agent: &str, lat: f64, lng: f64, timestamp: i64) -> serde_json::Value {
    serde_json::json!({
        "agentId": agent,
        "serviceType": "DELIVERY",
        "latitude": lat,
        "longitude": lng,
        "accuracy": 5.0,
        "status": "AVAILABLE",
        "timestamp": timestamp,
    })
}

/// A submitted report becomes visible to range, KNN and agent lookup.
#[tokio::test]
async fn test_submitted_report_becomes_queryable() {
    let p = create_pipeline(None);
    let now = chrono::Utc::now().timestamp_millis();

    let (status, _) = send(
        &p.app,
        request("POST", "/api/locations", Some(report("rider-9", 1.3521, 103.8198, now))),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    wait_for_position(&p.spatial, "rider9", now).await;

    let (status, found) = send(
        &p.app,
        request("GET", "/api/search/range?lat=1.3521&lng=103.8198&radius=50", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found[0]["agentId"], "rider9");

    let (_, found) = send(
        &p.app,
        request("GET", "/api/search/knn?lat=1.36&lng=103.82&k=1", None),
    )
    .await;
    assert_eq!(found[0]["agentId"], "rider9");

    let (status, agent) = send(&p.app, request("GET", "/api/agents/rider-9", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agent["agentId"], "rider9");
    assert_eq!(agent["report"]["agentId"], "rider-9");
    assert_eq!(agent["report"]["serviceType"], "DELIVERY");
    assert_eq!(agent["confidence"], "90%");

    assert!(p.freshness.stage_snapshot(Stage::Ingest).count >= 1);
    assert!(p.freshness.stage_snapshot(Stage::IndexWrite).count >= 1);
}

/// Submitting the same report twice leaves one entry in each store.
#[tokio::test]
async fn test_duplicate_submission_overwrites() {
    let p = create_pipeline(None);
    let body = report("rider_1", 10.0, 10.0, 5_000);

    for _ in 0..2 {
        let (status, _) = send(
            &p.app,
            request("POST", "/api/locations", Some(body.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    wait_for_position(&p.spatial, "rider_1", 5_000).await;
    // Give the second copy time to land as well
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(p.spatial.len().await.unwrap(), 1);
    assert_eq!(p.details.len().await.unwrap(), 1);
}

/// A newer position replaces the old one; the agent is found only at the new place.
#[tokio::test]
async fn test_position_update_moves_agent() {
    let p = create_pipeline(None);

    send(
        &p.app,
        request("POST", "/api/locations", Some(report("rider_1", 5.0, 5.0, 1_000))),
    )
    .await;
    wait_for_position(&p.spatial, "rider_1", 1_000).await;

    send(
        &p.app,
        request("POST", "/api/locations", Some(report("rider_1", 20.0, 20.0, 2_000))),
    )
    .await;
    wait_for_position(&p.spatial, "rider_1", 2_000).await;

    let (_, inside) = send(
        &p.app,
        request("GET", "/api/search/pip?lats=0,0,10,10&lngs=0,10,10,0", None),
    )
    .await;
    assert!(inside.as_array().unwrap().is_empty());

    let (_, near) = send(
        &p.app,
        request("GET", "/api/search/range?lat=20&lng=20&radius=100", None),
    )
    .await;
    assert_eq!(near[0]["agentId"], "rider_1");
}

/// DELETE /api/agents/:id purges both stores; a second delete is 404.
#[tokio::test]
async fn test_purge_agent() {
    let p = create_pipeline(Some("secret"));

    send(
        &p.app,
        request("POST", "/api/locations", Some(report("rider_1", 1.0, 1.0, 1_000))),
    )
    .await;
    wait_for_position(&p.spatial, "rider_1", 1_000).await;

    let (status, _) = send(&p.app, request("DELETE", "/api/agents/rider_1", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let purge = Request::builder()
        .method("DELETE")
        .uri("/api/agents/rider_1")
        .header("Authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&p.app, purge).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["positionRemoved"], true);
    assert_eq!(json["detailRemoved"], true);

    assert!(p.spatial.get("rider_1").is_none());
    assert!(p.details.get("rider_1").await.unwrap().is_none());

    let (status, _) = send(&p.app, request("GET", "/api/agents/rider_1", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let purge_again = Request::builder()
        .method("DELETE")
        .uri("/api/agents/rider_1")
        .header("Authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&p.app, purge_again).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// Unknown agents are 404.
#[tokio::test]
async fn test_unknown_agent_returns_404() {
    let p = create_pipeline(None);

    let (status, json) = send(&p.app, request("GET", "/api/agents/nobody", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("nobody"));
}
