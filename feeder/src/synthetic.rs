//! Random-walk fleet for load tests without a recorded trace.

use chrono::Utc;
use geotrack::geometry::{GeoPoint, EARTH_RADIUS_M};
use geotrack::report::PositionReport;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SERVICE_TYPES: [&str; 3] = ["DELIVERY", "TAXI", "BIKE"];
const STATUSES: [&str; 3] = ["AVAILABLE", "ON_TASK", "OFF_LINE"];

struct Agent {
    id: String,
    service_type: &'static str,
    position: GeoPoint,
    /// Degrees, [0, 360)
    heading: f64,
    /// m/s
    speed: f64,
}

/// A fleet of agents wandering around a center point.
///
/// Each call to `next_report` advances one agent (round robin) by
/// `step_seconds` of travel and returns its new position.
pub struct SyntheticFleet {
    agents: Vec<Agent>,
    cursor: usize,
    step_seconds: f64,
    rng: StdRng,
}

impl SyntheticFleet {
    pub fn new(agent_count: usize, center: GeoPoint, spread_m: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let agents = (0..agent_count.max(1))
            .map(|i| Agent {
                id: format!("rider_{:05}", i),
                service_type: SERVICE_TYPES[i % SERVICE_TYPES.len()],
                position: displace(
                    center,
                    rng.gen_range(0.0..spread_m.max(1.0)),
                    rng.gen_range(0.0..360.0),
                ),
                heading: rng.gen_range(0.0..360.0),
                speed: rng.gen_range(2.0..15.0),
            })
            .collect();

        Self {
            agents,
            cursor: 0,
            step_seconds: 1.0,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn next_report(&mut self) -> PositionReport {
        let len = self.agents.len();
        let rng = &mut self.rng;
        let agent = &mut self.agents[self.cursor];
        self.cursor = (self.cursor + 1) % len;

        agent.heading = (agent.heading + rng.gen_range(-20.0..20.0)).rem_euclid(360.0);
        agent.speed = (agent.speed + rng.gen_range(-1.0..1.0)).clamp(0.0, 25.0);
        agent.position = displace(agent.position, agent.speed * self.step_seconds, agent.heading);

        PositionReport {
            agent_id: Some(agent.id.clone()),
            service_type: Some(agent.service_type.to_string()),
            latitude: Some(agent.position.lat),
            longitude: Some(agent.position.lon),
            heading: Some(agent.heading),
            speed: Some(agent.speed),
            accuracy: Some(rng.gen_range(1.0..40.0)),
            status: Some(STATUSES[rng.gen_range(0..STATUSES.len())].to_string()),
            timestamp: Some(Utc::now().timestamp_millis()),
            ..Default::default()
        }
    }
}

impl Iterator for SyntheticFleet {
    type Item = anyhow::Result<PositionReport>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(Ok(self.next_report()))
    }
}

/// Move `distance_m` along `bearing_deg` (flat-earth step; fine for a few km).
/// Latitude is clamped to the poles and longitude wrapped into [-180, 180].
fn displace(from: GeoPoint, distance_m: f64, bearing_deg: f64) -> GeoPoint {
    let bearing = bearing_deg.to_radians();
    let d_lat = (distance_m * bearing.cos() / EARTH_RADIUS_M).to_degrees();
    let cos_lat = from.lat.to_radians().cos().max(1e-6);
    let d_lon = (distance_m * bearing.sin() / (EARTH_RADIUS_M * cos_lat)).to_degrees();

    let lat = (from.lat + d_lat).clamp(-90.0, 90.0);
    let lon = (from.lon + d_lon + 180.0).rem_euclid(360.0) - 180.0;
    GeoPoint::new(lat, lon)
}
