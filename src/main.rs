use anyhow::{Context, Result};
use geotrack::api::{
    create_admin_router, create_agents_router, create_ingestion_router, create_search_router,
    AdminAppState, AgentsAppState, IngestionAppState, SearchAppState,
};
use geotrack::config::{load_or_default, new_runtime_config, TransportKind};
use geotrack::freshness::{run_freshness_reporter, FreshnessMonitor};
use geotrack::indexer::{run_nats_consumer, spawn_partition_workers, DualWriteIndexer};
use geotrack::ingest::IngestionFrontDoor;
use geotrack::query::QueryEvaluator;
use geotrack::store::{
    run_expiry_sweeper, DetailStore, MemoryDetailStore, MemorySpatialIndex, SpatialIndex,
};
use geotrack::transport::{ChannelTransport, NatsClient, NatsReportPublisher, ReportTransport};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geotrack=info".into()),
        )
        .init();

    info!("Geotrack starting...");

    // Read configuration (file if present, env overrides on top)
    let config_path =
        std::env::var("GEOTRACK_CONFIG").unwrap_or_else(|_| "geotrack.toml".to_string());
    let config = load_or_default(&config_path)?;
    let runtime_config = new_runtime_config();

    info!(
        config_path = %config_path,
        bind_addr = %config.server.bind_addr,
        transport = ?config.transport.kind,
        detail_ttl_seconds = config.store.detail_ttl_seconds,
        spatial_ttl_seconds = config.store.spatial_ttl_seconds,
        "Configuration loaded"
    );

    // Stores
    let spatial: Arc<dyn SpatialIndex> =
        Arc::new(MemorySpatialIndex::with_max_age(config.store.spatial_ttl()));
    let details: Arc<dyn DetailStore> = Arc::new(MemoryDetailStore::with_refresh_on_read(
        config.store.refresh_on_read,
    ));
    let freshness = FreshnessMonitor::new();

    let indexer = Arc::new(
        DualWriteIndexer::new(
            Arc::clone(&spatial),
            Arc::clone(&details),
            freshness.clone(),
            config.store.detail_ttl(),
        )
        .with_timestamp_policy(config.indexer.timestamp_policy),
    );

    // Transport and indexing consumers
    let transport: Arc<dyn ReportTransport> = match config.transport.kind {
        TransportKind::Nats => {
            let nats_client = NatsClient::connect(config.nats.clone())
                .await
                .context("Failed to initialize NATS transport")?;
            let jetstream = nats_client.jetstream().clone();

            let consumer_indexer = Arc::clone(&indexer);
            let nats_config = config.nats.clone();
            let concurrency = config.indexer.concurrency;
            tokio::spawn(async move {
                if let Err(e) =
                    run_nats_consumer(consumer_indexer, jetstream, nats_config, concurrency).await
                {
                    error!(error = %e, "Position indexer consumer failed");
                }
            });

            Arc::new(NatsReportPublisher::new(
                nats_client.jetstream().clone(),
                config.nats.subject_prefix.clone(),
            ))
        }
        TransportKind::Memory => {
            let (transport, receivers) = ChannelTransport::new(
                config.transport.partitions,
                config.transport.channel_capacity,
            );
            let workers = spawn_partition_workers(Arc::clone(&indexer), receivers);
            info!(
                partitions = transport.partition_count(),
                workers = workers.len(),
                "In-process transport started"
            );
            Arc::new(transport)
        }
    };

    let front_door = IngestionFrontDoor::new(
        transport,
        freshness.clone(),
        config.indexer.timestamp_policy,
    );
    let ingest_stats = front_door.stats();
    info!(
        transport = front_door.transport_name(),
        timestamp_policy = ?config.indexer.timestamp_policy,
        "Ingestion front door ready"
    );

    // Background tasks
    tokio::spawn(run_expiry_sweeper(
        Arc::clone(&spatial),
        Arc::clone(&details),
        config.store.spatial_ttl(),
        config.store.sweep_interval_seconds,
    ));
    tokio::spawn(run_freshness_reporter(
        freshness.clone(),
        Arc::clone(&ingest_stats),
        config.metrics.report_interval_seconds,
    ));

    // HTTP routers
    let app = create_ingestion_router(IngestionAppState {
        front_door,
        runtime_config: runtime_config.clone(),
    })
    .merge(create_search_router(SearchAppState {
        evaluator: QueryEvaluator::new(
            Arc::clone(&spatial),
            runtime_config.clone(),
            freshness.clone(),
        ),
    }))
    .merge(create_agents_router(AgentsAppState {
        spatial: Arc::clone(&spatial),
        details: Arc::clone(&details),
        admin_token: config.api.admin_token.clone(),
    }))
    .merge(create_admin_router(AdminAppState {
        runtime_config,
        admin_token: config.api.admin_token.clone(),
        freshness,
        ingest_stats,
    }))
    .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(bind_addr = %config.server.bind_addr, "HTTP API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "HTTP server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Geotrack stopped");

    Ok(())
}
