//! Load generator for geotrack: replays Grab position traces or drives a
//! synthetic random-walk fleet against the ingestion API.

pub mod csv_source;
pub mod sender;
pub mod synthetic;

pub use csv_source::TraceReader;
pub use sender::{feed, ReportSender, Throughput};
pub use synthetic::SyntheticFleet;
