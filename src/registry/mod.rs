//! Session registry for publisher/subscriber relay
//!
//! The registry owns every live session and routes messages between the single
//! publisher and its subscribers. Each session gets a bounded outbound
//! channel; the registry only ever `try_send`s into it, so a slow session can
//! never stall the others.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<SessionRegistry>
//!                    ┌──────────────────────────┐
//!                    │ RwLock<RegistryState {   │
//!                    │   sessions: id -> tx,    │
//!                    │   publisher: Option<id>, │
//!                    │   subscribers: {id},     │
//!                    │   last_sample,           │
//!                    │ }>                       │
//!                    └────────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Publisher]            [Subscriber]            [Subscriber]
//!  relay_signal()            rx.recv()               rx.recv()
//!  relay_telemetry()             │                       │
//!         │                      ▼                       ▼
//!         └──► try_send() ──►  WebSocket             WebSocket
//! ```
//!
//! # Ordering
//!
//! Every mutation takes the write lock and finishes its bookkeeping before it
//! sends any notification, so a session that is being removed can never be
//! picked as a relay target.

pub mod config;
pub mod error;
pub mod session;
pub mod store;

pub use config::RegistryConfig;
pub use error::RegistryError;
pub use session::SessionEntry;
pub use store::{RegistryStats, SessionRegistry};
