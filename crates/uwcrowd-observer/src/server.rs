//! Observer HTTP server lifecycle.
//!
//! [`start_server`] binds the listener and serves until the engine's
//! shutdown signal fires, then drains in-flight requests and returns.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use uwcrowd_core::ShutdownSignal;
use uwcrowd_core::config::ObserverConfig;

use crate::router::build_router;
use crate::state::AppState;

/// Configuration for the observer server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

impl From<&ObserverConfig> for ServerConfig {
    fn from(config: &ObserverConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// Start the observer HTTP server.
///
/// Returns `Ok(())` once `shutdown` fires and open connections have
/// finished.
///
/// # Errors
///
/// Returns [`ServerError`] if the address is malformed, the listener
/// cannot bind, or the server hits a fatal I/O error.
pub async fn start_server(
    config: &ServerConfig,
    state: Arc<AppState>,
    mut shutdown: ShutdownSignal,
) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|source| ServerError::InvalidAddress {
            host: config.host.clone(),
            source,
        })?;

    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    info!(%addr, "Observer server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
        .map_err(|source| ServerError::Serve { source })?;

    info!(%addr, "Observer server stopped");
    Ok(())
}

/// Errors that can occur when starting or running the observer server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured host and port do not form a socket address.
    #[error("invalid listen address for host {host}: {source}")]
    InvalidAddress {
        /// The configured host.
        host: String,
        /// The parse error.
        source: std::net::AddrParseError,
    },

    /// Failed to bind to the network address.
    #[error("bind failed on {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The server encountered a fatal error while serving.
    #[error("serve error: {source}")]
    Serve {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
