//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::registry::RegistryConfig;

/// Port used when neither the caller nor `PORT` sets one
pub const DEFAULT_PORT: u16 = 3000;

/// How the listener will be served
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    /// Both PEM files are present
    Enabled { cert: PathBuf, key: PathBuf },
    /// No certificate or key configured
    NotConfigured,
    /// A path was configured but a file is missing
    Missing,
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent WebSocket sessions (0 = unlimited)
    pub max_connections: usize,

    /// PEM certificate chain; TLS is enabled when both paths are set and exist
    pub tls_cert_path: Option<PathBuf>,

    /// PEM private key
    pub tls_key_path: Option<PathBuf>,

    /// Session registry settings
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0,
            tls_cert_path: None,
            tls_key_path: None,
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Read `PORT`, `TLS_CERT_PATH` and `TLS_KEY_PATH` from the environment
    ///
    /// Unset or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => config.bind_addr.set_port(port),
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT"),
            }
        }
        config.tls_cert_path = lookup("TLS_CERT_PATH").filter(|p| !p.is_empty()).map(PathBuf::from);
        config.tls_key_path = lookup("TLS_KEY_PATH").filter(|p| !p.is_empty()).map(PathBuf::from);
        config
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set only the port
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Serve over TLS with the given PEM files
    pub fn tls(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.tls_cert_path = Some(cert.into());
        self.tls_key_path = Some(key.into());
        self
    }

    /// Set registry settings
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Decide between TLS and plain WebSocket
    pub fn tls_mode(&self) -> TlsMode {
        match (&self.tls_cert_path, &self.tls_key_path) {
            (None, None) => TlsMode::NotConfigured,
            (Some(cert), Some(key)) if cert.exists() && key.exists() => TlsMode::Enabled {
                cert: cert.clone(),
                key: key.clone(),
            },
            _ => TlsMode::Missing,
        }
    }

}
