//! Positional telemetry
//!
//! Samples flow from the publisher to subscribers over two paths: the
//! registry broadcast and, once negotiated, the direct channel. Consumers
//! keep whichever sample arrived last in a [`TelemetryView`].

pub mod sample;
pub mod simulator;
pub mod view;

pub use sample::{TelemetryError, TelemetrySample, TelemetrySource};
pub use simulator::{FlightSimulator, SimulatorConfig};
pub use view::{ObservedSample, TelemetryOrigin, TelemetryView};
