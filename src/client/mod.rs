//! Signaling client
//!
//! Provides the client side of the relay for:
//! - Talking to the server over WebSocket ([`SignalingClient`])
//! - Running a full negotiation against it as publisher or subscriber
//!   ([`PeerSession`])

pub mod config;
pub mod connector;
pub mod peer;

pub use config::ClientConfig;
pub use connector::{ClientError, ClientEvent, SignalingClient};
pub use peer::PeerSession;
