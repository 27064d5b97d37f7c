//! HTTP exposition of the metric registry.
//!
//! Serves `/metrics` in the Prometheus text format on its own tokio task, so
//! scrapes run concurrently with the sampling loop.

pub mod config;
pub mod handlers;
pub mod router;

// Re-export commonly used items
pub use config::WebConfig;
pub use router::create_app;

use crate::error::{Result, SystemError};
use crate::metrics::MetricRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

/// Bind the listener and serve `registry` in a background task.
///
/// Binding happens before this returns, so an unusable address is reported
/// to the caller rather than from inside the task.
pub async fn start_web_server(
    config: &WebConfig,
    registry: Arc<MetricRegistry>,
) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| SystemError::config_error(format!("Invalid bind address: {}", e)))?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| SystemError::web_server_error(format!("Failed to bind to {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;

    info!("Serving metrics on http://{}/metrics", local_addr);

    let app = create_app(registry);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .map_err(|e| SystemError::web_server_error(format!("Server error: {}", e)))
    });

    Ok((local_addr, handle))
}
