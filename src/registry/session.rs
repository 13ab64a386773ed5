//! Per-session entry stored in the registry

use std::time::Instant;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::protocol::{Role, ServerMessage, SessionId};

/// Entry for a single connected session
#[derive(Debug)]
pub struct SessionEntry {
    pub id: SessionId,

    /// Unset until the session registers
    pub role: Option<Role>,

    /// When the session connected
    pub connected_at: Instant,

    tx: mpsc::Sender<ServerMessage>,
}

impl SessionEntry {
    pub(super) fn new(id: SessionId, tx: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            role: None,
            connected_at: Instant::now(),
            tx,
        }
    }

    /// Queue a message for this session without waiting
    ///
    /// Returns false if the queue is full or the connection is gone.
    pub(super) fn send(&self, message: ServerMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(session_id = %self.id, "Outbound queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(session_id = %self.id, "Outbound queue closed");
                false
            }
        }
    }
}
