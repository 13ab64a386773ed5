//! Telemetry sample type

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Where a sample's position came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetrySource {
    /// A real position source
    #[serde(alias = "geolocation")]
    Live,
    /// The flight simulator
    #[serde(alias = "simulation")]
    Simulated,
}

/// Rejection reasons for a sample
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TelemetryError {
    #[error("{0} is not a finite number")]
    NonFinite(&'static str),

    #[error("heading {0} outside [0, 360)")]
    HeadingOutOfRange(f64),

    #[error("negative speed {0}")]
    NegativeSpeed(f64),
}

/// One timestamped positional reading
///
/// Serialized as a flat record, identical on the relay and the direct
/// channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters
    pub altitude: f64,
    /// Degrees in [0, 360)
    pub heading: f64,
    /// Meters per second, never negative
    pub speed: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub source: TelemetrySource,
}

impl TelemetrySample {
    /// Build a sample, folding heading into [0, 360) and clamping speed at 0
    pub fn new(
        latitude: f64,
        longitude: f64,
        altitude: f64,
        heading: f64,
        speed: f64,
        timestamp: i64,
        source: TelemetrySource,
    ) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            heading: normalize_heading(heading),
            speed: speed.max(0.0),
            timestamp,
            source,
        }
    }

    pub fn validate(&self) -> Result<(), TelemetryError> {
        let fields = [
            ("latitude", self.latitude),
            ("longitude", self.longitude),
            ("altitude", self.altitude),
            ("heading", self.heading),
            ("speed", self.speed),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(TelemetryError::NonFinite(name));
            }
        }

        if !(0.0..360.0).contains(&self.heading) {
            return Err(TelemetryError::HeadingOutOfRange(self.heading));
        }
        if self.speed < 0.0 {
            return Err(TelemetryError::NegativeSpeed(self.speed));
        }

        Ok(())
    }

    /// Serialize for the direct channel
    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    /// Parse a direct-channel frame
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

fn normalize_heading(heading: f64) -> f64 {
    let folded = heading.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if folded >= 360.0 {
        0.0
    } else {
        folded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn golden_gate() -> TelemetrySample {
        TelemetrySample::new(
            37.7749,
            -122.4194,
            100.0,
            0.0,
            0.0,
            1_700_000_000_000,
            TelemetrySource::Live,
        )
    }

    #[test]
    fn test_flat_wire_shape() {
        let json = serde_json::to_value(golden_gate()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "latitude": 37.7749,
                "longitude": -122.4194,
                "altitude": 100.0,
                "heading": 0.0,
                "speed": 0.0,
                "timestamp": 1_700_000_000_000i64,
                "source": "live",
            })
        );
    }

    #[test]
    fn test_legacy_source_names() {
        let sample: TelemetrySample = serde_json::from_str(
            r#"{"latitude":1,"longitude":2,"altitude":3,"heading":4,"speed":5,"timestamp":6,"source":"simulation"}"#,
        )
        .unwrap();
        assert_eq!(sample.source, TelemetrySource::Simulated);
    }

    #[test]
    fn test_new_normalizes() {
        let sample = TelemetrySample::new(0.0, 0.0, 0.0, 370.0, -2.0, 0, TelemetrySource::Simulated);
        assert_eq!(sample.heading, 10.0);
        assert_eq!(sample.speed, 0.0);

        let sample = TelemetrySample::new(0.0, 0.0, 0.0, -90.0, 1.0, 0, TelemetrySource::Simulated);
        assert_eq!(sample.heading, 270.0);
        assert!(sample.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects() {
        let mut sample = golden_gate();
        sample.heading = 360.0;
        assert_eq!(
            sample.validate(),
            Err(TelemetryError::HeadingOutOfRange(360.0))
        );

        let mut sample = golden_gate();
        sample.speed = -1.0;
        assert_eq!(sample.validate(), Err(TelemetryError::NegativeSpeed(-1.0)));

        let mut sample = golden_gate();
        sample.latitude = f64::NAN;
        assert_eq!(sample.validate(), Err(TelemetryError::NonFinite("latitude")));
    }

    #[test]
    fn test_channel_bytes() {
        let sample = golden_gate();
        let bytes = sample.to_bytes().unwrap();
        assert_eq!(TelemetrySample::from_slice(&bytes).unwrap(), sample);

        assert!(TelemetrySample::from_slice(b"{\"latitude\":").is_err());
    }
}
