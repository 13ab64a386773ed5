//! Simulated flight path
//!
//! Used by a publisher without a live position source. The aircraft flies a
//! slow circle: heading advances one degree per tick and the position moves
//! a small fixed step along it, while altitude and speed oscillate.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::sample::{TelemetrySample, TelemetrySource};

/// Degrees moved per tick along the current heading
const POSITION_STEP_DEG: f64 = 0.00001;

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub start_latitude: f64,
    pub start_longitude: f64,
    /// Altitude the oscillation is centered on
    pub base_altitude: f64,
    /// Time between samples
    pub interval: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            start_latitude: 37.7749,
            start_longitude: -122.4194,
            base_altitude: 100.0,
            interval: Duration::from_millis(500),
        }
    }
}

impl SimulatorConfig {
    /// Set the starting position
    pub fn start_at(mut self, latitude: f64, longitude: f64) -> Self {
        self.start_latitude = latitude;
        self.start_longitude = longitude;
        self
    }

    /// Set the sample interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Generates [`TelemetrySample`]s along a circular path
#[derive(Debug, Clone)]
pub struct FlightSimulator {
    config: SimulatorConfig,
    current: TelemetrySample,
}

impl FlightSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let current = TelemetrySample::new(
            config.start_latitude,
            config.start_longitude,
            config.base_altitude,
            0.0,
            0.0,
            now_millis(),
            TelemetrySource::Simulated,
        );
        Self { config, current }
    }

    /// Most recently produced sample
    pub fn current(&self) -> &TelemetrySample {
        &self.current
    }

    /// Advance one tick at the current wall-clock time
    pub fn next_sample(&mut self) -> TelemetrySample {
        let jitter = rand::rng().random_range(-0.5..0.5);
        self.step(now_millis(), jitter)
    }

    /// Advance one tick at `now_ms` with an explicit speed jitter
    pub fn step(&mut self, now_ms: i64, jitter: f64) -> TelemetrySample {
        let t = now_ms as f64;
        let heading = (self.current.heading + 1.0) % 360.0;
        let heading_rad = heading.to_radians();

        let latitude = self.current.latitude + heading_rad.cos() * POSITION_STEP_DEG;
        let longitude = self.current.longitude + heading_rad.sin() * POSITION_STEP_DEG;
        let altitude = self.config.base_altitude + (t / 10_000.0).sin() * 20.0;
        let speed = 5.0 + (t / 5_000.0).sin() * 3.0 + jitter;

        self.current = TelemetrySample::new(
            latitude,
            longitude,
            altitude,
            heading,
            speed,
            now_ms,
            TelemetrySource::Simulated,
        );
        self.current
    }

    /// Emit a sample every interval until the receiver is dropped
    pub fn spawn(mut self, tx: mpsc::Sender<TelemetrySample>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            loop {
                ticker.tick().await;
                let sample = self.next_sample();
                if tx.send(sample).await.is_err() {
                    tracing::debug!("Simulator receiver dropped, stopping");
                    break;
                }
            }
        })
    }
}

impl Default for FlightSimulator {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_advances_and_wraps() {
        let mut sim = FlightSimulator::default();

        let first = sim.step(0, 0.0);
        assert_eq!(first.heading, 1.0);

        for _ in 0..359 {
            sim.step(0, 0.0);
        }
        assert_eq!(sim.current().heading, 0.0);
    }

    #[test]
    fn test_samples_are_valid_and_simulated() {
        let mut sim = FlightSimulator::default();

        for tick in 0..720 {
            let sample = sim.step(tick * 500, 0.49);
            assert!(sample.validate().is_ok(), "tick {} invalid: {:?}", tick, sample);
            assert_eq!(sample.source, TelemetrySource::Simulated);
            assert!((80.0..=120.0).contains(&sample.altitude));
        }
    }

    #[test]
    fn test_position_moves_by_small_step() {
        let config = SimulatorConfig::default().start_at(10.0, 20.0);
        let mut sim = FlightSimulator::new(config);

        let sample = sim.step(0, 0.0);
        let moved = ((sample.latitude - 10.0).powi(2) + (sample.longitude - 20.0).powi(2)).sqrt();
        assert!((moved - POSITION_STEP_DEG).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_spawn_stops_when_receiver_drops() {
        let sim = FlightSimulator::new(SimulatorConfig::default().interval(Duration::from_millis(5)));
        let (tx, mut rx) = mpsc::channel(4);
        let handle = sim.spawn(tx);

        let sample = rx.recv().await.unwrap();
        assert_eq!(sample.source, TelemetrySource::Simulated);

        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
