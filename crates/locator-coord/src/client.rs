//! Client, connector and event types of the coordination capability.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};

use crate::{CoordError, CoordResult};

// ============================================================================
// Identifiers and Options
// ============================================================================

/// Identity of one coordination session.
///
/// Every client created by a connector gets a fresh id, even when it points
/// at the same address as a previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Client configuration passed through to the coordination client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Session timeout negotiated with the cluster.
    pub session_timeout: Duration,

    /// Delay between the client's own connection attempts.
    pub spin_delay: Duration,

    /// The client's internal retry count.
    pub retries: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_millis(10_000),
            spin_delay: Duration::from_millis(1_000),
            retries: 3,
        }
    }
}

/// Parsed `host[:port][,host[:port]...][/chroot]` connect string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectString {
    /// Server list part.
    pub hosts: String,

    /// Namespace every client path is relative to, if any.
    pub chroot: Option<String>,
}

impl ConnectString {
    /// Parses a connect string.
    ///
    /// # Errors
    ///
    /// - `CoordError::InvalidConnectString` if the server list is empty
    pub fn parse(raw: &str) -> CoordResult<Self> {
        let raw = raw.trim();
        let (hosts, chroot) = match raw.split_once('/') {
            Some((hosts, rest)) => (hosts, Some(rest)),
            None => (raw, None),
        };

        if hosts.is_empty() {
            return Err(CoordError::InvalidConnectString(raw.to_string()));
        }

        let chroot = chroot
            .map(|c| c.trim_end_matches('/'))
            .filter(|c| !c.is_empty())
            .map(|c| format!("/{c}"));

        Ok(Self {
            hosts: hosts.to_string(),
            chroot,
        })
    }

    /// Resolves a client path against the chroot.
    pub fn absolute(&self, path: &str) -> String {
        match &self.chroot {
            Some(chroot) if path == "/" => chroot.clone(),
            Some(chroot) => format!("{chroot}{path}"),
            None => path.to_string(),
        }
    }
}

impl fmt::Display for ConnectString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.hosts, self.chroot.as_deref().unwrap_or(""))
    }
}

// ============================================================================
// Events
// ============================================================================

/// Lifecycle state of a coordination session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Connected,
    Disconnected,
    Expired,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "SYNC_CONNECTED"),
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// A session state transition published by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub state: SessionState,
}

/// What a child watch observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WatchedEventKind {
    NodeChildrenChanged,
    NodeDeleted,
}

impl fmt::Display for WatchedEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeChildrenChanged => write!(f, "NODE_CHILDREN_CHANGED"),
            Self::NodeDeleted => write!(f, "NODE_DELETED"),
        }
    }
}

/// Notification delivered to a child watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    pub kind: WatchedEventKind,
    /// Client-relative path the watch was registered on.
    pub path: String,
}

impl fmt::Display for WatchedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.path)
    }
}

/// One-shot child watch returned by `get_children`.
///
/// Resolves once with the triggering event, or with `None` when the session
/// that registered it ends (a replaced session invalidates its watches).
#[derive(Debug)]
pub struct ChildWatch {
    receiver: oneshot::Receiver<WatchedEvent>,
}

impl ChildWatch {
    /// Creates a linked trigger/watch pair.
    pub fn channel() -> (oneshot::Sender<WatchedEvent>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { receiver: rx })
    }

    /// Waits for the watch to fire.
    pub async fn fired(self) -> Option<WatchedEvent> {
        self.receiver.await.ok()
    }
}

// ============================================================================
// Traits
// ============================================================================

/// A client bound to one coordination session.
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Identity of the session this client owns.
    fn session_id(&self) -> SessionId;

    /// Subscribes to session lifecycle events.
    ///
    /// Subscribe before calling `connect()` to observe the first
    /// `Connected` transition.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    /// Establishes the session.
    async fn connect(&self) -> CoordResult<()>;

    /// Closes the session. Outstanding watches are dropped.
    async fn close(&self);

    /// Checks whether a node exists.
    async fn exists(&self, path: &str) -> CoordResult<bool>;

    /// Lists a node's children and arms a one-shot child watch on it.
    async fn get_children(&self, path: &str) -> CoordResult<(Vec<String>, ChildWatch)>;

    /// Reads a node's payload.
    async fn get_data(&self, path: &str) -> CoordResult<Vec<u8>>;
}

/// Factory opening clients against a connect string.
pub trait Connector: Send + Sync {
    fn create_client(
        &self,
        connect_string: &str,
        options: &ClientOptions,
    ) -> CoordResult<Arc<dyn CoordinationClient>>;
}
