//! Stream server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tail_logs::LogStoreConfig;

/// Configuration for the stream server and its coordinator.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Log store capacity and index limits.
    pub store: LogStoreConfig,
    /// Interval between buffered log distributions.
    pub flush_interval: Duration,
    /// Interval between status broadcasts.
    pub status_interval: Duration,
    /// Number of entries sent to a client when it connects.
    pub initial_logs: usize,
    /// Cap on entries returned for a search; `None` returns every match.
    pub max_search_results: Option<usize>,
    /// Outbound queue length per client.
    pub client_queue_size: usize,
    /// Queue length for eviction and blacklist notifications.
    pub event_queue_size: usize,
    /// Maximum WebSocket connections allowed.
    pub max_ws_connections: usize,
    /// CORS allowed origins (empty means all).
    pub cors_origins: Vec<String>,
    /// Directory served as the fallback route, if any.
    pub web_dir: Option<PathBuf>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8181)),
            store: LogStoreConfig::default(),
            flush_interval: Duration::from_millis(100),
            status_interval: Duration::from_secs(10),
            initial_logs: 1000,
            max_search_results: None,
            client_queue_size: 1024,
            event_queue_size: 256,
            max_ws_connections: 1000,
            cors_origins: Vec::new(),
            web_dir: None,
        }
    }
}

impl StreamConfig {
    /// Create a new configuration with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// Set the log store configuration.
    #[must_use]
    pub const fn with_store(mut self, store: LogStoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Set the flush interval.
    #[must_use]
    pub const fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the status broadcast interval.
    #[must_use]
    pub const fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    /// Set the number of entries sent on connect.
    #[must_use]
    pub const fn with_initial_logs(mut self, count: usize) -> Self {
        self.initial_logs = count;
        self
    }

    /// Cap the number of entries returned for a search.
    #[must_use]
    pub const fn with_max_search_results(mut self, max: Option<usize>) -> Self {
        self.max_search_results = max;
        self
    }

    /// Set the per-client outbound queue length.
    #[must_use]
    pub const fn with_client_queue_size(mut self, size: usize) -> Self {
        self.client_queue_size = size;
        self
    }

    /// Set the notification queue length.
    #[must_use]
    pub const fn with_event_queue_size(mut self, size: usize) -> Self {
        self.event_queue_size = size;
        self
    }

    /// Set the maximum WebSocket connections.
    #[must_use]
    pub const fn with_max_ws_connections(mut self, max: usize) -> Self {
        self.max_ws_connections = max;
        self
    }

    /// Add a CORS allowed origin.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }

    /// Serve static files from `dir` for unmatched routes.
    #[must_use]
    pub fn with_web_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.web_dir = Some(dir.into());
        self
    }
}
