//! # tail-stream
//!
//! Live distribution of JSON logs to browser viewers over WebSocket.
//!
//! Each viewer holds its own query. New entries are buffered and flushed to
//! every viewer on a fixed tick, filtered by that viewer's query, together with
//! the index counts that changed from its point of view. Evictions and
//! blacklisted properties are pushed as they happen.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tail_stream::{StreamConfig, StreamServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = StreamServer::new(StreamConfig::default());
//!     let coordinator = server.coordinator();
//!
//!     let line = r#"{"level":"INFO","msg":"started"}"#;
//!     if let Ok(raw) = tail_logs::parse_line(line) {
//!         coordinator.ingest(raw);
//!     }
//!     // server.serve().await.unwrap();
//! }
//! ```
//!
//! ## Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/ws` | GET | WebSocket for live logs and searches |
//! | `/api/health` | GET | Liveness and uptime |
//! | `/api/status` | GET | Memory, store size, clients, blacklist |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod routes;
pub mod server;
pub mod session;
pub mod state;
pub mod status;
pub mod websocket;

pub use config::StreamConfig;
pub use coordinator::{IndexEvent, StreamCoordinator};
pub use error::{StreamError, StreamResult};
pub use protocol::{ClientMessage, ServerMessage, SetLogsPayload, StatusPayload};
pub use server::StreamServer;
pub use session::{Batch, ClientSession, SessionState};
pub use state::StreamState;
pub use status::StatusProbe;
