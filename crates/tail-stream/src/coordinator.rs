//! Fan-out of live logs to connected clients.
//!
//! The [`StreamCoordinator`] owns the log store, the buffer of entries not yet
//! distributed and the registry of client sessions. Three workers drive it:
//!
//! - the flush worker drains the buffer every `flush_interval` and sends each
//!   client the entries matching its query plus the counts that changed
//! - the status worker broadcasts memory and store size every
//!   `status_interval`
//! - the event worker relays blacklisting and eviction notifications raised
//!   by the store
//!
//! Every outbound message goes through the client's bounded queue. A client
//! whose queue is full or closed is removed; nobody else is affected.
//!
//! Evictions only raise a flag: one resync with fresh counts covers any
//! number of them. Blacklisted properties travel through a bounded queue; a
//! notification that does not fit is recovered later from the store's
//! blacklist, so every client eventually receives each `drop_index`.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tail_logs::{
    JsonObject, LogEntry, LogId, LogStoreCallbacks, SearchQuery, SharedLogStore, shared_store,
};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::config::StreamConfig;
use crate::error::{StreamError, StreamResult};
use crate::protocol::{ServerMessage, StatusPayload};
use crate::session::{Batch, ClientSession};
use crate::status::StatusProbe;

/// Index notifications raised by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// An entry was evicted; counts must be resynchronized.
    Evicted,
    /// Properties were blacklisted.
    Dropped(Vec<String>),
}

/// Flags raised by store callbacks for the event worker.
#[derive(Debug, Default)]
struct IndexSignals {
    /// An eviction happened since the last resync
    resync: AtomicBool,
    /// A drop notification did not fit in the queue
    missed_drops: AtomicBool,
    wake: Notify,
}

impl IndexSignals {
    fn raise(&self, flag: &AtomicBool) {
        if !flag.swap(true, Ordering::AcqRel) {
            self.wake.notify_one();
        }
    }
}

/// Registry entry for one client.
struct ClientHandle {
    session: Mutex<ClientSession>,
    sender: mpsc::Sender<ServerMessage>,
}

/// Coordinates ingestion, distribution and client sessions.
pub struct StreamCoordinator {
    config: StreamConfig,
    store: SharedLogStore,
    /// Entries appended since the last flush
    buffer: Mutex<Vec<LogEntry>>,
    clients: RwLock<HashMap<Uuid, Arc<ClientHandle>>>,
    /// Blacklisted properties; taken by the event worker when it starts
    drops: Mutex<Option<mpsc::Receiver<Vec<String>>>>,
    signals: Arc<IndexSignals>,
    /// Properties already broadcast as dropped
    announced: Mutex<BTreeSet<String>>,
    probe: StatusProbe,
}

impl StreamCoordinator {
    /// Create a coordinator and its log store.
    #[must_use]
    pub fn new(config: StreamConfig) -> Self {
        let (drops_tx, drops_rx) = mpsc::channel(config.event_queue_size.max(1));
        let signals = Arc::new(IndexSignals::default());

        let dropped_signals = Arc::clone(&signals);
        let evicted_signals = Arc::clone(&signals);
        let callbacks = LogStoreCallbacks::new()
            .on_index_dropped(move |properties| {
                publish_drop(&drops_tx, &dropped_signals, properties);
            })
            .on_index_updated(move || evicted_signals.raise(&evicted_signals.resync));

        Self {
            store: shared_store(config.store, callbacks),
            config,
            buffer: Mutex::new(Vec::new()),
            clients: RwLock::new(HashMap::new()),
            drops: Mutex::new(Some(drops_rx)),
            signals,
            announced: Mutex::new(BTreeSet::new()),
            probe: StatusProbe::new(),
        }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Get the log store.
    #[must_use]
    pub const fn store(&self) -> &SharedLogStore {
        &self.store
    }

    /// Get the number of registered clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Stores a log object and queues it for distribution.
    pub fn ingest(&self, raw: JsonObject) -> LogId {
        let entry = self.store.append(raw);
        let id = entry.id;
        self.buffer.lock().push(entry);
        id
    }

    /// Registers a client and queues its initial snapshot.
    ///
    /// The client receives one `set_logs` with the most recent entries and
    /// the full index counts, then one `set_status`. Returns the session id
    /// and the receiving end of the client's outbound queue.
    pub fn connect(&self) -> (Uuid, mpsc::Receiver<ServerMessage>) {
        let (sender, receiver) = mpsc::channel(self.config.client_queue_size.max(1));
        let handle = Arc::new(ClientHandle {
            session: Mutex::new(ClientSession::new()),
            sender,
        });

        let mut session = handle.session.lock();
        let id = session.id();
        // Registered before the snapshot is read so no flushed entry is missed.
        self.clients.write().insert(id, Arc::clone(&handle));

        let snapshot = self
            .store
            .search(&SearchQuery::new(), Some(self.config.initial_logs));
        let initial = session.replace(snapshot);
        session.open();
        if self.deliver(&mut session, &handle.sender, initial) {
            let status = ServerMessage::SetStatus(self.status());
            self.deliver(&mut session, &handle.sender, status);
        }
        drop(session);

        info!(session_id = %id, clients = self.client_count(), "Client connected");
        (id, receiver)
    }

    /// Replaces a client's query and queues the filtered result set.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is unknown or its queue rejected the
    /// reply, in which case the session has been removed.
    pub fn set_query(&self, id: Uuid, query: SearchQuery) -> StreamResult<()> {
        let handle = self
            .clients
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StreamError::Internal(format!("unknown session {id}")))?;

        let mut session = handle.session.lock();
        session.set_query(query);
        let result = self
            .store
            .search(session.query(), self.config.max_search_results);
        debug!(session_id = %id, matches = result.logs.len(), "Search updated");

        let reply = session.replace(result);
        if self.deliver(&mut session, &handle.sender, reply) {
            Ok(())
        } else {
            Err(StreamError::ChannelSend(format!(
                "outbound queue of session {id} unavailable"
            )))
        }
    }

    /// Removes a client. Returns false if it was already gone.
    pub fn disconnect(&self, id: Uuid) -> bool {
        let Some(handle) = self.clients.write().remove(&id) else {
            return false;
        };

        let mut session = handle.session.lock();
        session.close();
        let duration = Utc::now() - session.connected_at();
        info!(
            session_id = %id,
            duration_secs = duration.num_seconds(),
            "Client disconnected"
        );
        true
    }

    /// Distributes the buffered entries. Returns the number of entries.
    pub fn flush(&self) -> usize {
        let entries = std::mem::take(&mut *self.buffer.lock());
        if entries.is_empty() {
            return 0;
        }

        let batch = Batch::new(entries);
        let global = self.store.index_snapshot();

        for handle in self.targets() {
            let mut session = handle.session.lock();
            if !session.is_open() {
                continue;
            }
            for message in session.flush(&batch, &global) {
                if !self.deliver(&mut session, &handle.sender, message) {
                    break;
                }
            }
        }

        trace!(entries = batch.len(), "Flushed log batch");
        batch.len()
    }

    /// Returns the current process status.
    #[must_use]
    pub fn status(&self) -> StatusPayload {
        StatusPayload {
            allocated_memory: self.probe.allocated_memory(),
            logs_stored: self.store.len(),
        }
    }

    /// Sends a `set_status` to every open client. Returns the number reached.
    pub fn broadcast_status(&self) -> usize {
        let message = ServerMessage::SetStatus(self.status());
        let mut reached = 0;
        for handle in self.targets() {
            let mut session = handle.session.lock();
            if session.is_open() && self.deliver(&mut session, &handle.sender, message.clone()) {
                reached += 1;
            }
        }
        reached
    }

    /// Relays one index notification to every open client.
    pub fn handle_event(&self, event: IndexEvent) {
        match event {
            IndexEvent::Evicted => self.resync_counts(),
            IndexEvent::Dropped(properties) => self.drop_properties(&properties),
        }
    }

    /// Handles pending index notifications without a running event worker.
    ///
    /// Returns the number of notifications handled, counting a resync once
    /// however many evictions it covers; 0 once the worker has started.
    pub fn process_pending_events(&self) -> usize {
        let mut drops = self.drops.lock();
        let Some(rx) = drops.as_mut() else {
            return 0;
        };
        let mut pending = Vec::new();
        while let Ok(properties) = rx.try_recv() {
            pending.push(properties);
        }
        drop(drops);

        let count = pending.len();
        for properties in pending {
            self.drop_properties(&properties);
        }
        count + self.apply_signals()
    }

    /// Spawns the flush, status and event workers on the current runtime.
    pub fn spawn_workers(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = vec![
            tokio::spawn(Arc::clone(self).run_flush()),
            tokio::spawn(Arc::clone(self).run_status()),
        ];
        match self.drops.lock().take() {
            Some(rx) => handles.push(tokio::spawn(Arc::clone(self).run_events(rx))),
            None => warn!("Index event worker already started"),
        }
        handles
    }

    async fn run_flush(self: Arc<Self>) {
        let mut ticker = interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.flush();
        }
    }

    async fn run_status(self: Arc<Self>) {
        let period = self.config.status_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let reached = self.broadcast_status();
            trace!(clients = reached, "Broadcast status");
        }
    }

    async fn run_events(self: Arc<Self>, mut rx: mpsc::Receiver<Vec<String>>) {
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(properties) => self.drop_properties(&properties),
                    None => break,
                },
                () = self.signals.wake.notified() => {}
            }
            // Drops first, so a resync never reports a property about to go.
            while let Ok(properties) = rx.try_recv() {
                self.drop_properties(&properties);
            }
            self.apply_signals();
        }
        debug!("Index event channel closed");
    }

    /// Acts on raised flags. Returns the number of flags handled.
    fn apply_signals(&self) -> usize {
        let mut handled = 0;
        if self.signals.missed_drops.swap(false, Ordering::AcqRel) {
            self.announce_missed_drops();
            handled += 1;
        }
        if self.signals.resync.swap(false, Ordering::AcqRel) {
            self.resync_counts();
            handled += 1;
        }
        handled
    }

    fn resync_counts(&self) {
        let mut global = self.store.index_snapshot();
        for handle in self.targets() {
            let mut session = handle.session.lock();
            if !session.is_open() {
                continue;
            }
            // A flush or search reply got there first with newer counts.
            if session.generation() > global.generation {
                global = self.store.index_snapshot();
            }
            if let Some(message) = session.resync(&global) {
                self.deliver(&mut session, &handle.sender, message);
            }
        }
    }

    /// Broadcasts blacklisted properties whose queued notification was lost.
    fn announce_missed_drops(&self) {
        let missing: Vec<String> = {
            let announced = self.announced.lock();
            self.store
                .blacklist()
                .into_iter()
                .filter(|property| !announced.contains(property))
                .collect()
        };
        if !missing.is_empty() {
            debug!(properties = ?missing, "Announcing drops missed by the event queue");
        }
        self.drop_properties(&missing);
    }

    fn drop_properties(&self, properties: &[String]) {
        let fresh: Vec<String> = {
            let mut announced = self.announced.lock();
            properties
                .iter()
                .filter(|property| announced.insert((*property).clone()))
                .cloned()
                .collect()
        };
        if fresh.is_empty() {
            return;
        }

        let message = ServerMessage::DropIndex(fresh.clone());
        for handle in self.targets() {
            let mut session = handle.session.lock();
            if !session.is_open() {
                continue;
            }
            session.drop_properties(&fresh);
            self.deliver(&mut session, &handle.sender, message.clone());
        }
    }

    /// Copies the registry so no lock is held while sending.
    fn targets(&self) -> Vec<Arc<ClientHandle>> {
        self.clients.read().values().cloned().collect()
    }

    /// Queues a message, removing the client if its queue is full or closed.
    fn deliver(
        &self,
        session: &mut ClientSession,
        sender: &mpsc::Sender<ServerMessage>,
        message: ServerMessage,
    ) -> bool {
        match sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!(
                    session_id = %session.id(),
                    message = message.kind(),
                    "Client queue full, disconnecting"
                );
                self.detach(session);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(session_id = %session.id(), "Client queue closed");
                self.detach(session);
                false
            }
        }
    }

    fn detach(&self, session: &mut ClientSession) {
        session.close();
        self.clients.write().remove(&session.id());
    }
}

impl fmt::Debug for StreamCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCoordinator")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("clients", &self.client_count())
            .finish_non_exhaustive()
    }
}

/// Queues a drop notification without blocking ingestion.
///
/// When the queue is full the notification is dropped and the worker is told
/// to recover it from the store's blacklist.
fn publish_drop(tx: &mpsc::Sender<Vec<String>>, signals: &IndexSignals, properties: &[String]) {
    match tx.try_send(properties.to_vec()) {
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(properties)) => {
            warn!(properties = ?properties, "Event queue full, drop notification deferred");
            signals.raise(&signals.missed_drops);
        }
    }
}
