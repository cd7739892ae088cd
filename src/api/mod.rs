// HTTP APIs: ingestion, search, agent lookup, admin

pub mod admin;
pub mod agents;
mod ingestion;
pub mod search;

pub use admin::{create_admin_router, AdminAppState};
pub use agents::{create_agents_router, AgentsAppState};
pub use ingestion::{create_ingestion_router, IngestionAppState};
pub use search::{create_search_router, SearchAppState};
