//! Observable locator events.
//!
//! Events reach observers two ways:
//! - `subscribe()` hands out a broadcast receiver seeing every event
//! - `on(kind, callback)` registers a synchronous listener for one kind
//!
//! Listeners run on the publishing task and must not block. A slow
//! broadcast subscriber lags (and skips events) instead of stalling the
//! locator.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::trace;

use locator_core::{Location, LocatorError};
use locator_coord::{CoordError, SessionId, SessionState, WatchedEvent};

/// Broadcast buffer size.
const EVENT_BUFFER: usize = 256;

// ============================================================================
// Event Types
// ============================================================================

/// Kind of a [`LocatorEvent`], used to register listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connecting,
    Connected,
    Disconnected,
    StateChange,
    Expired,
    BootstrapError,
    PathFound,
    PathNotFound,
    ChildrenChanged,
    NewPool,
    EmptyPool,
    FailedToGetChildren,
    FailedToGetChildInfo,
}

impl EventKind {
    pub const ALL: [EventKind; 13] = [
        Self::Connecting,
        Self::Connected,
        Self::Disconnected,
        Self::StateChange,
        Self::Expired,
        Self::BootstrapError,
        Self::PathFound,
        Self::PathNotFound,
        Self::ChildrenChanged,
        Self::NewPool,
        Self::EmptyPool,
        Self::FailedToGetChildren,
        Self::FailedToGetChildInfo,
    ];

    /// Stable event name, as seen by log scrapers and listeners keyed by name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::StateChange => "state",
            Self::Expired => "expired",
            Self::BootstrapError => "failed to find zookeeper",
            Self::PathFound => "zookeeper path is found",
            Self::PathNotFound => "zookeeper path is not found",
            Self::ChildrenChanged => "child list has changed",
            Self::NewPool => "got a new child pool",
            Self::EmptyPool => "child pool is empty",
            Self::FailedToGetChildren => "failed to get child list",
            Self::FailedToGetChildInfo => "failed to get individual child's info",
        }
    }

    /// Looks a kind up by its stable name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the locator reports while it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum LocatorEvent {
    /// A client was created and is connecting.
    Connecting,

    /// The session reached the connected state.
    Connected,

    /// The session lost its connection; it may still recover.
    Disconnected,

    /// Raw session state transition.
    StateChange {
        state: SessionState,
        session_id: SessionId,
    },

    /// The session is gone; a new one will be opened.
    Expired,

    /// The bootstrap locator could not produce a cluster address.
    BootstrapError { error: LocatorError },

    /// An existence check found the service path.
    PathFound { path: String },

    /// An existence check did not find the service path.
    PathNotFound { path: String },

    /// A child watch fired on the service path.
    ChildrenChanged { path: String, event: WatchedEvent },

    /// A freshly fetched pool replaced the live pool.
    NewPool { path: String, pool: Vec<Location> },

    /// A request was dispatched against an empty pool.
    EmptyPool { error: LocatorError },

    /// Listing the children of the service path failed.
    FailedToGetChildren { path: String, error: CoordError },

    /// Reading one child's payload failed; the child was skipped.
    FailedToGetChildInfo { path: String, error: CoordError },
}

impl LocatorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connecting => EventKind::Connecting,
            Self::Connected => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
            Self::StateChange { .. } => EventKind::StateChange,
            Self::Expired => EventKind::Expired,
            Self::BootstrapError { .. } => EventKind::BootstrapError,
            Self::PathFound { .. } => EventKind::PathFound,
            Self::PathNotFound { .. } => EventKind::PathNotFound,
            Self::ChildrenChanged { .. } => EventKind::ChildrenChanged,
            Self::NewPool { .. } => EventKind::NewPool,
            Self::EmptyPool { .. } => EventKind::EmptyPool,
            Self::FailedToGetChildren { .. } => EventKind::FailedToGetChildren,
            Self::FailedToGetChildInfo { .. } => EventKind::FailedToGetChildInfo,
        }
    }

    /// The service path the event concerns, for path-scoped events.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::PathFound { path }
            | Self::PathNotFound { path }
            | Self::ChildrenChanged { path, .. }
            | Self::NewPool { path, .. }
            | Self::FailedToGetChildren { path, .. }
            | Self::FailedToGetChildInfo { path, .. } => Some(path.as_str()),
            Self::EmptyPool {
                error: LocatorError::EmptyPool { path },
            } => Some(path.as_str()),
            _ => None,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Identifies a registered listener so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&LocatorEvent) + Send + Sync>;

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    by_id: HashMap<ListenerId, (EventKind, Listener)>,
}

/// Fan-out point for [`LocatorEvent`]s. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LocatorEvent>,
    listeners: Arc<Mutex<ListenerTable>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            sender,
            listeners: Arc::new(Mutex::new(ListenerTable::default())),
        }
    }

    /// Delivers an event to matching listeners and broadcast subscribers.
    pub fn publish(&self, event: LocatorEvent) {
        let kind = event.kind();
        trace!(event = kind.as_str(), path = event.path(), "Publishing locator event");

        // Listeners are cloned out so a callback may call on()/off()
        let mut matching: Vec<(ListenerId, Listener)> = self
            .table()
            .by_id
            .iter()
            .filter(|(_, (k, _))| *k == kind)
            .map(|(id, (_, listener))| (*id, Arc::clone(listener)))
            .collect();
        matching.sort_by_key(|(id, _)| id.0);

        for (_, listener) in matching {
            listener(&event);
        }

        // No receivers is not an error
        let _ = self.sender.send(event);
    }

    /// Subscribes to every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LocatorEvent> {
        self.sender.subscribe()
    }

    /// Registers a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&LocatorEvent) + Send + Sync + 'static,
    {
        let mut table = self.table();
        table.next_id += 1;
        let id = ListenerId(table.next_id);
        table.by_id.insert(id, (kind, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        self.table().by_id.remove(&id).is_some()
    }

    /// Removes every listener for `kind`, or all listeners when `None`.
    pub fn remove_all_listeners(&self, kind: Option<EventKind>) {
        let mut table = self.table();
        match kind {
            Some(kind) => table.by_id.retain(|_, (k, _)| *k != kind),
            None => table.by_id.clear(),
        }
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.table().by_id.values().filter(|(k, _)| *k == kind).count()
    }

    fn table(&self) -> MutexGuard<'_, ListenerTable> {
        // A panicking listener runs outside the lock, so poison only means
        // a panic inside on()/off(); the table itself stays consistent.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .field("listeners", &self.table().by_id.len())
            .finish()
    }
}
