use anyhow::{bail, Context, Result};
use geotrack::report::PositionReport;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Posts reports to the geotrack ingestion endpoint.
pub struct ReportSender {
    client: reqwest::Client,
    endpoint: String,
}

impl ReportSender {
    /// `api_url` is the service base URL, e.g. `http://localhost:8080`.
    pub fn new(api_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/locations", api_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one report. Anything other than 202 Accepted is an error.
    pub async fn send(&self, report: &PositionReport) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(report)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.endpoint))?;

        let status = response.status();
        if status != reqwest::StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            bail!("Unexpected status {}: {}", status, body);
        }
        Ok(())
    }
}

/// Running totals for one feed session.
#[derive(Debug)]
pub struct Throughput {
    pub sent: u64,
    pub failed: u64,
    started: Instant,
}

impl Throughput {
    pub fn start() -> Self {
        Self {
            sent: 0,
            failed: 0,
            started: Instant::now(),
        }
    }

    pub fn rate(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.sent as f64 / elapsed
        } else {
            0.0
        }
    }
}

const RATE_LOG_EVERY: u64 = 50;

/// Drain `source` into the service, pausing `delay` between sends.
///
/// Unparseable rows and failed sends are logged and counted, never fatal.
/// Stops after `limit` successful sends when given.
pub async fn feed<I>(
    sender: &ReportSender,
    source: I,
    delay: Duration,
    limit: Option<u64>,
) -> Throughput
where
    I: Iterator<Item = Result<PositionReport>>,
{
    let mut stats = Throughput::start();

    for item in source {
        if limit.is_some_and(|limit| stats.sent >= limit) {
            break;
        }

        let report = match item {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Skipping unreadable row");
                stats.failed += 1;
                continue;
            }
        };

        match sender.send(&report).await {
            Ok(()) => {
                stats.sent += 1;
                if stats.sent % RATE_LOG_EVERY == 0 {
                    info!(
                        sent = stats.sent,
                        failed = stats.failed,
                        rate = format!("{:.2} req/s", stats.rate()),
                        "Feed progress"
                    );
                }
            }
            Err(e) => {
                warn!(agent_id = ?report.agent_id, error = %e, "Send failed");
                stats.failed += 1;
            }
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    stats
}
