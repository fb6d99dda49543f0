//! Shared state for the stream server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crate::config::StreamConfig;
use crate::coordinator::StreamCoordinator;

/// Shared state for the stream server.
#[derive(Debug)]
pub struct StreamState {
    /// Coordinator owning the store and the client registry.
    coordinator: Arc<StreamCoordinator>,
    /// Number of active WebSocket connections.
    ws_connections: AtomicUsize,
    /// Server start time.
    start_time: Instant,
}

impl StreamState {
    /// Create a new state and its coordinator.
    #[must_use]
    pub fn new(config: StreamConfig) -> Self {
        Self::with_coordinator(Arc::new(StreamCoordinator::new(config)))
    }

    /// Create a new state around an existing coordinator.
    #[must_use]
    pub fn with_coordinator(coordinator: Arc<StreamCoordinator>) -> Self {
        Self {
            coordinator,
            ws_connections: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        self.coordinator.config()
    }

    /// Get the coordinator.
    #[must_use]
    pub const fn coordinator(&self) -> &Arc<StreamCoordinator> {
        &self.coordinator
    }

    /// Get the number of active WebSocket connections.
    #[must_use]
    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Relaxed)
    }

    /// Increment the WebSocket connection count.
    ///
    /// Returns `true` if the connection was allowed, `false` if limit reached.
    pub fn add_ws_connection(&self) -> bool {
        let current = self.ws_connections.fetch_add(1, Ordering::Relaxed);
        if current >= self.config().max_ws_connections {
            self.ws_connections.fetch_sub(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Decrement the WebSocket connection count.
    pub fn remove_ws_connection(&self) {
        self.ws_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get server uptime in seconds.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
