//! # turbo-tail
//!
//! Pipe JSON logs through a terminal and browse them live in a browser.
//!
//! Every stdin line is echoed to stdout unchanged. Lines holding a JSON object
//! are also kept in a bounded in-memory store and streamed to connected
//! viewers over WebSocket.
//!
//! ```text
//! my-service | turbo-tail --bind 127.0.0.1:8181
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod ingest;

pub use cli::Cli;
pub use ingest::{IngestStats, run_ingest};
