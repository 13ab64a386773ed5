//! Client configuration

use crate::protocol::Role;

/// Signaling client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the server's `/ws` endpoint
    pub url: String,

    /// Role to register right after connecting, if any
    pub role: Option<Role>,

    /// Capacity of the event channel handed back by `connect`
    pub event_capacity: usize,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            role: None,
            event_capacity: 256,
        }
    }

    /// Register as `role` as soon as the connection is up
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("ws://127.0.0.1:3000/ws")
            .role(Role::Subscriber)
            .event_capacity(0);

        assert_eq!(config.url, "ws://127.0.0.1:3000/ws");
        assert_eq!(config.role, Some(Role::Subscriber));
        assert_eq!(config.event_capacity, 1);
    }
}
