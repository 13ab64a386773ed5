//! perch: a single-publisher signaling relay with perfect negotiation
//!
//! One publisher session feeds any number of subscriber sessions. The relay
//! server forwards connection-setup messages between the two sides so they
//! can negotiate a direct transport, and caches/broadcasts small positional
//! telemetry samples.
//!
//! # Layout
//!
//! - [`registry`]: server-side session bookkeeping (publisher slot,
//!   subscriber set, telemetry cache) and message relay
//! - [`negotiation`]: the symmetric perfect-negotiation state machine run on
//!   each peer, driving an external [`negotiation::MediaEngine`]
//! - [`telemetry`]: telemetry samples, the latest-wins consumer view and a
//!   flight simulator
//! - [`protocol`]: JSON wire envelopes shared by server and client
//! - [`server`]: WebSocket signaling server with a liveness endpoint
//! - [`client`]: WebSocket signaling client and the peer session glue
//!
//! # Example
//!
//! ```no_run
//! use perch::{ServerConfig, SignalingServer};
//!
//! # async fn example() -> perch::error::Result<()> {
//! let server = SignalingServer::new(ServerConfig::from_env());
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod negotiation;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod telemetry;

pub use error::{Error, Result};
pub use negotiation::{PeerLink, Politeness, SignalingPhase};
pub use protocol::{Role, SessionId};
pub use registry::SessionRegistry;
pub use server::{ServerConfig, SignalingServer};
pub use telemetry::{TelemetrySample, TelemetrySource};
