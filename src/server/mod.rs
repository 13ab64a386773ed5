//! WebSocket signaling server
//!
//! Every connection to `/ws` becomes one registry session. Frames are JSON
//! envelopes from [`crate::protocol`]; the first frame the server sends is a
//! `welcome` carrying the session id.

pub mod config;
mod connection;
pub mod listener;

pub use config::{ServerConfig, TlsMode};
pub use listener::SignalingServer;
