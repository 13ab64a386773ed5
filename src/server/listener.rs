//! Signaling server listener
//!
//! Serves `/ws` (one signaling session per WebSocket) and `/health`, over
//! TLS when a certificate and key are configured.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::registry::SessionRegistry;
use crate::server::config::{ServerConfig, TlsMode};
use crate::server::connection::Connection;

/// How long TLS connections get to finish after shutdown is requested
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct AppState {
    registry: Arc<SessionRegistry>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

/// Signaling server
pub struct SignalingServer {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl SignalingServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };
        let registry = Arc::new(SessionRegistry::with_config(config.registry.clone()));

        Self {
            config,
            registry,
            connection_semaphore,
        }
    }

    /// Get a reference to the session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Routes served by this server
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .with_state(AppState {
                registry: Arc::clone(&self.registry),
                connection_semaphore: self.connection_semaphore.clone(),
            })
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.config.tls_mode() {
            TlsMode::Enabled { cert, key } => return self.serve_tls(cert, key, shutdown).await,
            TlsMode::NotConfigured => {
                tracing::warn!("No TLS certificate configured, serving unencrypted WebSocket")
            }
            TlsMode::Missing => tracing::warn!(
                cert = ?self.config.tls_cert_path,
                key = ?self.config.tls_key_path,
                "TLS certificate or key not found, serving unencrypted WebSocket"
            ),
        }

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve plain HTTP on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Signaling server listening");

        let stats_handle = self.registry.start();
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(self.shutdown_signal(shutdown))
            .await;
        stats_handle.abort();

        tracing::info!("Signaling server stopped");
        result.map_err(Into::into)
    }

    async fn serve_tls<F>(&self, cert: PathBuf, key: PathBuf, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tls = RustlsConfig::from_pem_file(&cert, &key).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            cert = %cert.display(),
            "Signaling server listening (TLS)"
        );

        let handle = axum_server::Handle::new();
        let trigger = handle.clone();
        let signal = self.shutdown_signal(shutdown);
        tokio::spawn(async move {
            signal.await;
            trigger.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        let stats_handle = self.registry.start();
        let result = axum_server::bind_rustls(self.config.bind_addr, tls)
            .handle(handle)
            .serve(self.router().into_make_service())
            .await;
        stats_handle.abort();

        tracing::info!("Signaling server stopped");
        result.map_err(Into::into)
    }

    /// Resolves after `shutdown` and after the registry has dropped every
    /// session, so open WebSockets close before the listener drains
    fn shutdown_signal<F>(&self, shutdown: F) -> impl Future<Output = ()> + Send + 'static
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            registry.shutdown().await;
        }
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let permit = match &state.connection_semaphore {
        Some(semaphore) => match Arc::clone(semaphore).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!("Connection rejected: limit reached");
                return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached")
                    .into_response();
            }
        },
        None => None,
    };

    let registry = state.registry;
    ws.on_upgrade(move |socket| async move {
        Connection::new(socket, registry).run().await;
        drop(permit);
    })
}
