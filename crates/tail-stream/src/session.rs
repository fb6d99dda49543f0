//! Per-client session state.
//!
//! A [`ClientSession`] holds a viewer's query and the index counts last
//! delivered to it. All count bookkeeping is synchronous and transport-free;
//! the coordinator decides when to call it and where the messages go.
//!
//! Counts reach a session from several paths that may run concurrently: the
//! flush tick, eviction resyncs and search replies. Each snapshot carries the
//! store generation it was read at, and a session never applies counts older
//! than the ones it already delivered. Dropped properties are remembered so
//! counts read before the drop cannot bring them back.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tail_logs::{
    FlatView, IndexCounts, IndexSnapshot, JsonObject, LogEntry, LogId, Matcher, SearchQuery,
    SearchResult,
};
use uuid::Uuid;

use crate::protocol::{ServerMessage, SetLogsPayload};

/// State of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered but the initial snapshot has not been sent yet.
    Connecting,
    /// Receiving live updates.
    Open,
    /// Removed from the registry.
    Closed,
}

impl SessionState {
    /// Check if the session receives broadcasts.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// A drained buffer of entries, flattened once for every client.
#[derive(Debug, Default)]
pub struct Batch {
    entries: Vec<LogEntry>,
    flats: Vec<FlatView>,
    /// Every (property, value) pair carried by the batch
    pairs: BTreeSet<(String, String)>,
}

impl Batch {
    /// Flattens the entries and collects their property values.
    #[must_use]
    pub fn new(entries: Vec<LogEntry>) -> Self {
        let flats: Vec<FlatView> = entries.iter().map(LogEntry::flat).collect();
        let pairs = flats
            .iter()
            .flat_map(|flat| flat.iter().map(|(p, v)| (p.clone(), v.clone())))
            .collect();
        Self {
            entries,
            flats,
            pairs,
        }
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the batch has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A connected viewer.
#[derive(Debug)]
pub struct ClientSession {
    /// Unique session identifier.
    id: Uuid,
    state: SessionState,
    query: SearchQuery,
    matcher: Matcher,
    /// Counts as last delivered to this client
    snapshot: IndexCounts,
    /// Store generation `snapshot` was read at
    generation: u64,
    /// Properties announced as dropped from the index
    dropped: BTreeSet<String>,
    /// Newest id already contained in a `set_logs` sent to this client
    watermark: Option<LogId>,
    connected_at: DateTime<Utc>,
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSession {
    /// Create a new session with an empty query.
    #[must_use]
    pub fn new() -> Self {
        let query = SearchQuery::new();
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Connecting,
            matcher: Matcher::new(&query),
            query,
            snapshot: IndexCounts::new(),
            generation: 0,
            dropped: BTreeSet::new(),
            watermark: None,
            connected_at: Utc::now(),
        }
    }

    /// Get the session ID.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Get the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Check if the session receives broadcasts.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Get when the session was created.
    #[must_use]
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Get the current query.
    #[must_use]
    pub const fn query(&self) -> &SearchQuery {
        &self.query
    }

    /// Get the counts last delivered to the client.
    #[must_use]
    pub const fn snapshot(&self) -> &IndexCounts {
        &self.snapshot
    }

    /// Get the store generation of the delivered counts.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Get the replay watermark.
    #[must_use]
    pub const fn watermark(&self) -> Option<LogId> {
        self.watermark
    }

    /// Mark the session open.
    pub fn open(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Open;
        }
    }

    /// Mark the session closed.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Replace the query.
    pub fn set_query(&mut self, query: SearchQuery) {
        self.matcher = Matcher::new(&query);
        self.query = query;
    }

    /// Returns `counts` as this client should see them.
    ///
    /// Values excluded by an active filter on their property are reported as
    /// 0 so the viewer still lists them as options. Dropped properties are
    /// left out.
    #[must_use]
    pub fn restrict(&self, counts: &IndexCounts) -> IndexCounts {
        counts
            .iter()
            .filter(|(property, _)| !self.dropped.contains(*property))
            .map(|(property, values)| {
                let values = values
                    .iter()
                    .map(|(value, count)| {
                        let reported = if self.query.excludes(property, value) {
                            0
                        } else {
                            *count
                        };
                        (value.clone(), reported)
                    })
                    .collect();
                (property.clone(), values)
            })
            .collect()
    }

    /// Builds a `set_logs` from a store search and resets the snapshot,
    /// generation and watermark to match it.
    pub fn replace(&mut self, result: SearchResult) -> ServerMessage {
        let index_counts = self.restrict(&result.index_counts);
        self.snapshot.clone_from(&index_counts);
        self.generation = result.generation;
        self.watermark = result.last_id;
        ServerMessage::SetLogs(SetLogsPayload {
            logs: result.logs,
            index_counts,
        })
    }

    /// Computes what this client receives for a flushed batch.
    ///
    /// Returns an `add_logs` with the matching entries newer than the
    /// watermark, followed by an `update_index` with the counts that changed
    /// from the client's point of view. Either is omitted when empty.
    ///
    /// Counts older than the ones already delivered are ignored; the newer
    /// snapshot already covers every entry of the batch.
    pub fn flush(&mut self, batch: &Batch, global: &IndexSnapshot) -> Vec<ServerMessage> {
        let mut messages = Vec::with_capacity(2);

        let logs: Vec<Arc<JsonObject>> = batch
            .entries
            .iter()
            .zip(&batch.flats)
            .filter(|(entry, _)| self.watermark.is_none_or(|mark| entry.id > mark))
            .filter(|(_, flat)| self.matcher.matches_flat(flat))
            .map(|(entry, _)| Arc::clone(&entry.raw))
            .collect();
        if !logs.is_empty() {
            messages.push(ServerMessage::AddLogs(logs));
        }

        if global.generation < self.generation {
            return messages;
        }
        self.generation = global.generation;

        let mut delta = IndexCounts::new();
        for (property, value) in &batch.pairs {
            if self.dropped.contains(property) {
                continue;
            }
            let Some(count) = global
                .counts
                .get(property)
                .and_then(|values| values.get(value))
            else {
                continue;
            };
            let reported = if self.query.excludes(property, value) {
                0
            } else {
                *count
            };
            let known = self
                .snapshot
                .get(property)
                .and_then(|values| values.get(value))
                .copied();
            if known != Some(reported) {
                self.snapshot
                    .entry(property.clone())
                    .or_default()
                    .insert(value.clone(), reported);
                delta
                    .entry(property.clone())
                    .or_default()
                    .insert(value.clone(), reported);
            }
        }
        if !delta.is_empty() {
            messages.push(ServerMessage::UpdateIndex(delta));
        }

        messages
    }

    /// Resynchronizes counts after an eviction.
    ///
    /// The reply carries the full restricted counts plus an explicit 0 for
    /// every value the client knew about that no longer exists. Returns
    /// `None` when there is nothing to report or when `global` is older than
    /// the counts already delivered.
    pub fn resync(&mut self, global: &IndexSnapshot) -> Option<ServerMessage> {
        if global.generation < self.generation {
            return None;
        }
        let restricted = self.restrict(&global.counts);

        let mut payload = restricted.clone();
        for (property, values) in &self.snapshot {
            for value in values.keys() {
                let present = restricted
                    .get(property)
                    .is_some_and(|current| current.contains_key(value));
                if !present {
                    payload
                        .entry(property.clone())
                        .or_default()
                        .insert(value.clone(), 0);
                }
            }
        }

        self.snapshot = restricted;
        self.generation = global.generation;
        (!payload.is_empty()).then_some(ServerMessage::UpdateIndex(payload))
    }

    /// Forgets counts for properties dropped from the index.
    ///
    /// Blacklisting is permanent, so the properties stay out of every later
    /// delta and resync for this session.
    pub fn drop_properties(&mut self, properties: &[String]) {
        for property in properties {
            self.snapshot.remove(property);
            self.dropped.insert(property.clone());
        }
    }
}
