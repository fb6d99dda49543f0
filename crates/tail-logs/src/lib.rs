//! # tail-logs
//!
//! Storage, indexing and search for streams of JSON log lines.
//!
//! This crate provides:
//!
//! - [`parse_line`] - Parse an input line into a JSON object
//! - [`flatten`] - Dot-notation flat view of a nested object
//! - [`InvertedIndex`] - Property/value index with a cardinality cap
//! - [`LogStore`] - Bounded FIFO store with the index kept in step
//! - [`SearchQuery`] / [`Matcher`] - Property filters and free-text search
//!
//! ## Example
//!
//! ```rust
//! use tail_logs::{parse_line, LogStore, LogStoreConfig, SearchQuery};
//!
//! let store = LogStore::new(LogStoreConfig::default().with_max_logs(100));
//! let raw = parse_line(r#"{"level":"ERROR","ctx":{"svc":"api"},"msg":"disk full"}"#).unwrap();
//! store.append(raw);
//!
//! let query = SearchQuery::new()
//!     .with_filter("ctx.svc", ["api"])
//!     .with_search_term("DISK");
//! let result = store.search(&query, None);
//! assert_eq!(result.logs.len(), 1);
//! assert_eq!(result.index_counts["level"]["ERROR"], 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod flatten;
pub mod index;
pub mod parse;
pub mod search;
pub mod store;
pub mod types;

pub use error::{LogError, Result};
pub use flatten::{flatten, stringify};
pub use index::{IndexLimits, InvertedIndex};
pub use parse::parse_line;
pub use search::{Matcher, filter_batch, matches, matches_filters, matches_search};
pub use store::{
    IndexDroppedCallback, IndexSnapshot, IndexUpdatedCallback, LogStore, LogStoreCallbacks,
    LogStoreConfig, SearchResult, SharedLogStore, shared_store,
};
pub use types::{FlatView, IndexCounts, JsonObject, LogEntry, LogId, SearchFilters, SearchQuery};
