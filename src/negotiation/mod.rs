//! Perfect negotiation
//!
//! Each end of a connection runs one [`PeerLink`]. Either side may propose a
//! new transport description at any time; simultaneous proposals ("glare")
//! are resolved by a fixed [`Politeness`] per role:
//!
//! - the impolite side (publisher) ignores an incoming offer that collides
//!   with its own and keeps waiting for an answer
//! - the polite side (subscriber) drops its own offer, applies the incoming
//!   one and answers it
//!
//! The link never talks to the network itself. Outgoing signals go to a
//! [`NegotiationObserver`]; incoming signals and engine events are fed in
//! through [`PeerLink::handle_signal`] and [`PeerLink::handle_engine_event`].
//!
//! ```text
//!   local change ──► negotiation_needed() ──► observer.on_local_description_ready(offer)
//!                                                     │
//!                                                  registry
//!                                                     │
//!   remote link ◄── handle_signal(offer) ◄────────────┘
//!        │
//!        └── observer.on_local_description_ready(answer) ──► registry ──► handle_signal(answer)
//! ```

pub mod engine;
pub mod error;
pub mod link;
pub mod memory;
pub mod observer;
pub mod signal;
pub mod state;

pub use engine::{ConnectionState, EngineEvent, MediaEngine, TrackInfo, TrackKind};
pub use error::{EngineError, NegotiationError};
pub use link::{PeerLink, PeerLinkConfig};
pub use memory::MemoryEngine;
pub use observer::NegotiationObserver;
pub use signal::{IceCandidate, SignalMessage};
pub use state::{PeerLinkState, Politeness, SignalingPhase};
