//! Bounded in-memory log store with an inverted index.
//!
//! This module provides:
//! - [`LogStore`] - Thread-safe FIFO-bounded storage, indexed on append
//! - [`LogStoreConfig`] - Capacity and index limits
//! - [`LogStoreCallbacks`] - Observers for blacklisting and eviction
//! - [`SearchResult`] - Matching entries plus the counts read alongside them
//! - [`IndexSnapshot`] - Index counts tagged with the generation they were read at
//!
//! Order, entries and index share a single lock so an append, its indexing and
//! its eviction are observed as one step.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::flatten::flatten;
use crate::index::{IndexLimits, InvertedIndex};
use crate::search::Matcher;
use crate::types::{IndexCounts, JsonObject, LogEntry, LogId, SearchQuery};

/// Configuration for the log store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStoreConfig {
    /// Maximum number of log entries to keep.
    pub max_logs: usize,
    /// Index cardinality and value length limits.
    pub index: IndexLimits,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            max_logs: 10_000,
            index: IndexLimits::default(),
        }
    }
}

impl LogStoreConfig {
    /// Sets the maximum number of stored entries.
    #[must_use]
    pub const fn with_max_logs(mut self, max_logs: usize) -> Self {
        self.max_logs = max_logs;
        self
    }

    /// Sets the per-property distinct value limit.
    #[must_use]
    pub const fn with_max_index_values(mut self, max_values: usize) -> Self {
        self.index.max_values = max_values;
        self
    }

    /// Sets the maximum length of an indexed value, in characters.
    #[must_use]
    pub const fn with_max_index_value_length(mut self, max_value_length: usize) -> Self {
        self.index.max_value_length = max_value_length;
        self
    }
}

/// Called with the properties blacklisted by one append.
pub type IndexDroppedCallback = Arc<dyn Fn(&[String]) + Send + Sync>;

/// Called after an eviction changed the index.
///
/// Carries no payload; observers read current counts with
/// [`LogStore::index_snapshot`] when they get to it.
pub type IndexUpdatedCallback = Arc<dyn Fn() + Send + Sync>;

/// Observers invoked by the store after its lock has been released.
#[derive(Clone, Default)]
pub struct LogStoreCallbacks {
    on_index_dropped: Option<IndexDroppedCallback>,
    on_index_updated: Option<IndexUpdatedCallback>,
}

impl LogStoreCallbacks {
    /// Creates an empty set of callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the blacklisting observer.
    #[must_use]
    pub fn on_index_dropped<F>(mut self, f: F) -> Self
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.on_index_dropped = Some(Arc::new(f));
        self
    }

    /// Sets the eviction observer.
    #[must_use]
    pub fn on_index_updated<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_index_updated = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for LogStoreCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStoreCallbacks")
            .field("on_index_dropped", &self.on_index_dropped.is_some())
            .field("on_index_updated", &self.on_index_updated.is_some())
            .finish()
    }
}

/// Result of a store search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    /// Matching entries, oldest first
    pub logs: Vec<Arc<JsonObject>>,
    /// Index counts read under the same lock as `logs`
    pub index_counts: IndexCounts,
    /// Newest stored id at the time of the search
    pub last_id: Option<LogId>,
    /// Store generation `index_counts` was read at
    pub generation: u64,
}

/// Index counts tagged with the store generation they were read at.
///
/// The generation grows with every append, so of two snapshots the one with
/// the higher generation reflects the later index state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSnapshot {
    /// Counts per property value
    pub counts: IndexCounts,
    /// Number of appends applied when the counts were read
    pub generation: u64,
}

#[derive(Debug)]
struct StoreInner {
    /// Ids in insertion order, oldest at the front
    order: VecDeque<LogId>,
    entries: HashMap<LogId, LogEntry>,
    index: InvertedIndex,
    /// Appends applied so far
    generation: u64,
}

impl StoreInner {
    /// Removes the oldest entry and unindexes it.
    fn evict_oldest(&mut self) -> Option<LogEntry> {
        let id = self.order.pop_front()?;
        let entry = self.entries.remove(&id)?;
        self.index.unindex(id, &entry.flat());
        Some(entry)
    }
}

/// Thread-safe bounded log store.
pub struct LogStore {
    config: LogStoreConfig,
    inner: RwLock<StoreInner>,
    next_id: AtomicU64,
    callbacks: LogStoreCallbacks,
}

impl LogStore {
    /// Creates a new log store without observers.
    #[must_use]
    pub fn new(config: LogStoreConfig) -> Self {
        Self::with_callbacks(config, LogStoreCallbacks::default())
    }

    /// Creates a new log store that reports index changes to `callbacks`.
    #[must_use]
    pub fn with_callbacks(config: LogStoreConfig, callbacks: LogStoreCallbacks) -> Self {
        Self {
            config,
            inner: RwLock::new(StoreInner {
                order: VecDeque::new(),
                entries: HashMap::new(),
                index: InvertedIndex::new(config.index),
                generation: 0,
            }),
            next_id: AtomicU64::new(1),
            callbacks,
        }
    }

    /// Appends a log object, assigning it the next id.
    ///
    /// Indexing and at most one eviction happen under the same exclusive lock.
    /// Observers are invoked after the lock is released.
    pub fn append(&self, raw: impl Into<Arc<JsonObject>>) -> LogEntry {
        let raw = raw.into();
        let flat = flatten(&raw);

        let (entry, dropped, evicted) = {
            let mut inner = self.inner.write();

            let id = LogId(self.next_id.fetch_add(1, Ordering::Relaxed));
            let entry = LogEntry::new(id, raw);
            let dropped = inner.index.index(id, &flat);
            inner.order.push_back(id);
            inner.entries.insert(id, entry.clone());
            inner.generation += 1;

            let mut evicted = false;
            if inner.order.len() > self.config.max_logs {
                if let Some(old) = inner.evict_oldest() {
                    debug!(evicted = %old.id, "Evicted oldest log entry");
                    evicted = true;
                }
            }

            (entry, dropped, evicted)
        };

        if !dropped.is_empty() {
            if let Some(cb) = &self.callbacks.on_index_dropped {
                cb(&dropped);
            }
        }
        if evicted {
            if let Some(cb) = &self.callbacks.on_index_updated {
                cb();
            }
        }

        entry
    }

    /// Returns up to `n` most recent entries, oldest first.
    #[must_use]
    pub fn last_n(&self, n: usize) -> Vec<Arc<JsonObject>> {
        let inner = self.inner.read();
        let skip = inner.order.len().saturating_sub(n);
        inner
            .order
            .iter()
            .skip(skip)
            .filter_map(|id| inner.entries.get(id))
            .map(|entry| Arc::clone(&entry.raw))
            .collect()
    }

    /// Returns the most recent entries matching `query`, oldest first.
    ///
    /// With `limit` set, only the newest `limit` matches are returned. Index
    /// counts and the newest id are read under the same shared lock.
    #[must_use]
    pub fn search(&self, query: &SearchQuery, limit: Option<usize>) -> SearchResult {
        let matcher = Matcher::new(query);
        let limit = limit.unwrap_or(usize::MAX);

        let inner = self.inner.read();
        let mut logs: Vec<Arc<JsonObject>> = inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.entries.get(id))
            .filter(|entry| matcher.accepts_all() || matcher.matches(entry))
            .take(limit)
            .map(|entry| Arc::clone(&entry.raw))
            .collect();
        logs.reverse();

        SearchResult {
            logs,
            index_counts: inner.index.counts(),
            last_id: inner.order.back().copied(),
            generation: inner.generation,
        }
    }

    /// Returns the current index counts.
    #[must_use]
    pub fn index_counts(&self) -> IndexCounts {
        self.inner.read().index.counts()
    }

    /// Returns the current index counts with the generation they belong to.
    #[must_use]
    pub fn index_snapshot(&self) -> IndexSnapshot {
        let inner = self.inner.read();
        IndexSnapshot {
            counts: inner.index.counts(),
            generation: inner.generation,
        }
    }

    /// Returns the number of appends applied so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Returns true if the property has been dropped from the index.
    #[must_use]
    pub fn is_blacklisted(&self, property: &str) -> bool {
        self.inner.read().index.is_blacklisted(property)
    }

    /// Returns the blacklisted properties, sorted.
    #[must_use]
    pub fn blacklist(&self) -> Vec<String> {
        self.inner.read().index.blacklist()
    }

    /// Gets a stored entry by id.
    #[must_use]
    pub fn get(&self, id: LogId) -> Option<LogEntry> {
        self.inner.read().entries.get(&id).cloned()
    }

    /// Returns the newest stored id.
    #[must_use]
    pub fn last_id(&self) -> Option<LogId> {
        self.inner.read().order.back().copied()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().order.is_empty()
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &LogStoreConfig {
        &self.config
    }
}

impl fmt::Debug for LogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStore")
            .field("config", &self.config)
            .field("len", &self.len())
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

/// Shared log store handle.
pub type SharedLogStore = Arc<LogStore>;

/// Creates a new shared log store.
#[must_use]
pub fn shared_store(config: LogStoreConfig, callbacks: LogStoreCallbacks) -> SharedLogStore {
    Arc::new(LogStore::with_callbacks(config, callbacks))
}
