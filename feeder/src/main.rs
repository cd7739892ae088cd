use anyhow::{bail, Context, Result};
use feeder::{feed, ReportSender, SyntheticFleet, TraceReader};
use geotrack::geometry::GeoPoint;
use std::time::Duration;
use tracing::info;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feeder=info".into()),
        )
        .init();

    let api_url = env_or("FEEDER_API_URL", "http://localhost:8080");
    let mode = env_or("FEEDER_MODE", "csv");
    let delay = Duration::from_millis(env_parse("FEEDER_DELAY_MS", 50u64)?);
    let limit = match std::env::var("FEEDER_LIMIT") {
        Ok(raw) => Some(raw.parse::<u64>().context("FEEDER_LIMIT must be an integer")?),
        Err(_) => None,
    };

    let sender = ReportSender::new(&api_url)?;
    info!(endpoint = sender.endpoint(), mode = %mode, ?delay, ?limit, "Starting feeder");

    let stats = match mode.as_str() {
        "csv" => {
            let path = env_or("FEEDER_CSV", "grab_posisi_data.csv");
            let trace = TraceReader::open(&path)?;
            info!(path = %path, "Replaying trace");
            feed(&sender, trace, delay, limit).await
        }
        "synthetic" => {
            let agents = env_parse("FEEDER_AGENTS", 100usize)?;
            let center = GeoPoint::new(
                env_parse("FEEDER_CENTER_LAT", 1.3521)?,
                env_parse("FEEDER_CENTER_LNG", 103.8198)?,
            );
            let seed = env_parse("FEEDER_SEED", rand::random::<u64>())?;
            let fleet = SyntheticFleet::new(agents, center, 5_000.0, seed);
            info!(agents = fleet.len(), seed, "Driving synthetic fleet");
            feed(&sender, fleet, delay, limit).await
        }
        other => bail!("Unknown FEEDER_MODE '{}' (expected csv or synthetic)", other),
    };

    info!(
        sent = stats.sent,
        failed = stats.failed,
        rate = format!("{:.2} req/s", stats.rate()),
        "Feeder finished"
    );
    Ok(())
}
