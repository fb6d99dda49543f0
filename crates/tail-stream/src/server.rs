//! Stream server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::StreamConfig;
use crate::coordinator::StreamCoordinator;
use crate::error::{StreamError, StreamResult};
use crate::routes::create_router;
use crate::state::StreamState;

/// HTTP and WebSocket server for live log viewers.
///
/// Serving also runs the coordinator's flush, status and event workers; they
/// stop when the server returns.
#[derive(Debug, Clone)]
pub struct StreamServer {
    state: Arc<StreamState>,
}

impl StreamServer {
    /// Create a new server with its own coordinator.
    #[must_use]
    pub fn new(config: StreamConfig) -> Self {
        Self {
            state: Arc::new(StreamState::new(config)),
        }
    }

    /// Create a new server around an existing coordinator.
    #[must_use]
    pub fn with_coordinator(coordinator: Arc<StreamCoordinator>) -> Self {
        Self {
            state: Arc::new(StreamState::with_coordinator(coordinator)),
        }
    }

    /// Get the server state for external access.
    #[must_use]
    pub fn state(&self) -> Arc<StreamState> {
        Arc::clone(&self.state)
    }

    /// Get the coordinator, for ingestion.
    #[must_use]
    pub fn coordinator(&self) -> Arc<StreamCoordinator> {
        Arc::clone(self.state.coordinator())
    }

    /// Get the number of active WebSocket connections.
    #[must_use]
    pub fn ws_connection_count(&self) -> usize {
        self.state.ws_connection_count()
    }

    /// Bind the configured address and serve until a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve(&self) -> StreamResult<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Bind the configured address and serve until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve_with_shutdown<F>(&self, shutdown: F) -> StreamResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config().bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| StreamError::BindFailed(addr, e))?;

        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails.
    pub async fn serve_listener<F>(&self, listener: TcpListener, shutdown: F) -> StreamResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listener
            .local_addr()
            .map_err(|e| StreamError::Internal(e.to_string()))?;
        info!(addr = %addr, "Stream server listening");

        let _workers = Workers(self.state.coordinator().spawn_workers());
        let router = create_router(Arc::clone(&self.state));

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| StreamError::Internal(e.to_string()))?;

        info!("Stream server shut down");
        Ok(())
    }

    /// Create the router without starting the server or its workers.
    ///
    /// Useful for testing or embedding in another server.
    pub fn router(&self) -> axum::Router {
        create_router(Arc::clone(&self.state))
    }
}

/// Aborts the coordinator workers when dropped.
struct Workers(Vec<JoinHandle<()>>);

impl Drop for Workers {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}
