//! Command line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tail_logs::LogStoreConfig;
use tail_stream::StreamConfig;

/// Command line arguments for `turbo-tail`.
#[derive(Debug, Clone, Parser)]
#[command(name = "turbo-tail")]
#[command(about = "Tail JSON logs from stdin and browse them live in the browser")]
#[command(version)]
pub struct Cli {
    /// Address the HTTP and WebSocket server listens on
    #[arg(long, env = "TURBO_TAIL_BIND", default_value = "0.0.0.0:8181")]
    pub bind: SocketAddr,

    /// Maximum number of log entries kept in memory
    #[arg(long, env = "TURBO_TAIL_MAX_LOGS", default_value_t = 10_000)]
    pub max_logs: usize,

    /// Distinct values a property may take before it stops being indexed
    #[arg(long, env = "TURBO_TAIL_MAX_INDEX_VALUES", default_value_t = 10)]
    pub max_index_values: usize,

    /// Longest value, in characters, that is indexed
    #[arg(long, env = "TURBO_TAIL_MAX_INDEX_VALUE_LENGTH", default_value_t = 50)]
    pub max_index_value_length: usize,

    /// Number of recent entries sent to a viewer when it connects
    #[arg(long, env = "TURBO_TAIL_INITIAL_LOGS", default_value_t = 1000)]
    pub initial_logs: usize,

    /// Cap on entries returned for a search (unlimited when unset)
    #[arg(long, env = "TURBO_TAIL_MAX_SEARCH_RESULTS")]
    pub max_search_results: Option<usize>,

    /// Maximum concurrent WebSocket viewers
    #[arg(long, env = "TURBO_TAIL_MAX_CONNECTIONS", default_value_t = 1000)]
    pub max_connections: usize,

    /// Directory served for paths that match no route
    #[arg(long, env = "TURBO_TAIL_WEB_DIR")]
    pub web_dir: Option<PathBuf>,

    /// Keep serving after stdin is closed
    #[arg(long)]
    pub keep_alive: bool,
}

impl Cli {
    /// Log store settings taken from the arguments.
    #[must_use]
    pub fn store_config(&self) -> LogStoreConfig {
        LogStoreConfig::default()
            .with_max_logs(self.max_logs)
            .with_max_index_values(self.max_index_values)
            .with_max_index_value_length(self.max_index_value_length)
    }

    /// Server settings taken from the arguments.
    #[must_use]
    pub fn stream_config(&self) -> StreamConfig {
        let config = StreamConfig::new(self.bind)
            .with_store(self.store_config())
            .with_initial_logs(self.initial_logs)
            .with_max_search_results(self.max_search_results)
            .with_max_ws_connections(self.max_connections);

        match &self.web_dir {
            Some(dir) => config.with_web_dir(dir.clone()),
            None => config,
        }
    }
}
