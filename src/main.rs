//! perch signaling server
//!
//! ```bash
//! # Plain WebSocket on the default port
//! perch
//!
//! # TLS on 8443
//! PORT=8443 TLS_CERT_PATH=cert.pem TLS_KEY_PATH=key.pem perch
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use perch::registry::RegistryConfig;
use perch::server::config::DEFAULT_PORT;
use perch::{ServerConfig, SignalingServer};
use tracing_subscriber::EnvFilter;

/// Single-publisher signaling relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PORT")]
    port: u16,

    /// PEM certificate chain; TLS is used when both files exist
    #[arg(long, env = "TLS_CERT_PATH")]
    tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, env = "TLS_KEY_PATH")]
    tls_key: Option<PathBuf>,

    /// Maximum concurrent sessions (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Seconds between registry stats log lines (0 disables)
    #[arg(long, default_value_t = 30)]
    stats_interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("perch=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = ServerConfig::default()
        .bind((args.host, args.port).into())
        .max_connections(args.max_connections)
        .registry(RegistryConfig::default().stats_interval(Duration::from_secs(args.stats_interval)));
    config.tls_cert_path = args.tls_cert;
    config.tls_key_path = args.tls_key;

    let server = SignalingServer::new(config);
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
