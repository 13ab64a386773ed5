//! Consumer-side latest-sample view

use super::sample::TelemetrySample;

/// Path a sample arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryOrigin {
    /// Broadcast by the registry
    Relay,
    /// Sent peer-to-peer on the direct channel
    DirectChannel,
}

/// A sample together with the path it arrived on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedSample {
    pub sample: TelemetrySample,
    pub origin: TelemetryOrigin,
}

/// Latest sample seen by a consumer
///
/// Whichever sample arrives last wins. There is no ordering between the two
/// paths and timestamps are not compared.
#[derive(Debug, Default, Clone)]
pub struct TelemetryView {
    latest: Option<ObservedSample>,
    relay_count: u64,
    direct_count: u64,
}

impl TelemetryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, sample: TelemetrySample, origin: TelemetryOrigin) {
        match origin {
            TelemetryOrigin::Relay => self.relay_count += 1,
            TelemetryOrigin::DirectChannel => self.direct_count += 1,
        }
        self.latest = Some(ObservedSample { sample, origin });
    }

    pub fn latest(&self) -> Option<&ObservedSample> {
        self.latest.as_ref()
    }

    /// Samples received per path: (relay, direct channel)
    pub fn counts(&self) -> (u64, u64) {
        (self.relay_count, self.direct_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetrySource;

    fn sample_at(timestamp: i64) -> TelemetrySample {
        TelemetrySample::new(1.0, 2.0, 3.0, 4.0, 5.0, timestamp, TelemetrySource::Live)
    }

    #[test]
    fn test_last_arrival_wins_regardless_of_timestamp() {
        let mut view = TelemetryView::new();

        view.observe(sample_at(200), TelemetryOrigin::DirectChannel);
        view.observe(sample_at(100), TelemetryOrigin::Relay);

        let latest = view.latest().unwrap();
        assert_eq!(latest.sample.timestamp, 100);
        assert_eq!(latest.origin, TelemetryOrigin::Relay);
        assert_eq!(view.counts(), (1, 1));
    }

    #[test]
    fn test_empty_view() {
        let view = TelemetryView::new();
        assert!(view.latest().is_none());
        assert_eq!(view.counts(), (0, 0));
    }
}
