// Position report model and validation
pub mod report;

// Agent id → index key
pub mod identity;

// GPS accuracy → trust score
pub mod confidence;

// Haversine distance and polygons
pub mod geometry;

// Spatial index and detail store
pub mod store;

// Ingestion → indexer hand-off (NATS JetStream, in-process channels)
pub mod transport;

// Ingestion front door
pub mod ingest;

// Dual-write indexer and transport consumers
pub mod indexer;

// Range / KNN / point-in-polygon queries
pub mod query;

// Event-to-observation latency
pub mod freshness;

// HTTP APIs
pub mod api;

// File, env and runtime configuration
pub mod config;
