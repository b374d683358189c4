//! In-process coordination ensemble.
//!
//! A shared node tree plus a session table, implementing the full client
//! capability surface. Tests drive it through the control methods on
//! [`MemoryEnsemble`]: mutate the tree, expire or disconnect sessions, and
//! inject per-path faults.
//!
//! # Panic-Free Guarantees
//!
//! The state mutex is never held across an `.await`. A poisoned mutex is
//! recovered rather than propagated.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info};

use crate::client::{
    ChildWatch, ClientOptions, ConnectString, Connector, CoordinationClient, SessionEvent,
    SessionId, SessionState, WatchedEvent, WatchedEventKind,
};
use crate::{CoordError, CoordResult};

/// Session event buffer per client.
const EVENT_BUFFER: usize = 32;

// ============================================================================
// Shared State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    Created,
    Connected,
    Disconnected,
    Expired,
    Closed,
}

struct SessionEntry {
    status: SessionStatus,
    events: broadcast::Sender<SessionEvent>,
}

struct WatchEntry {
    session_id: SessionId,
    abs_path: String,
    client_path: String,
    trigger: oneshot::Sender<WatchedEvent>,
}

#[derive(Default)]
struct EnsembleState {
    /// Absolute path -> payload. The root `/` is implicit.
    nodes: BTreeMap<String, Vec<u8>>,
    sessions: HashMap<SessionId, SessionEntry>,
    next_session_id: u64,
    sessions_opened: usize,
    refuse_connections: bool,
    child_watches: Vec<WatchEntry>,
    failing_children: HashSet<String>,
    failing_data: HashSet<String>,
    stalled_data: HashSet<String>,
    data_latency: Duration,
}

impl EnsembleState {
    fn node_exists(&self, abs: &str) -> bool {
        abs == "/" || self.nodes.contains_key(abs)
    }

    fn children_of(&self, abs: &str) -> Vec<String> {
        let prefix = if abs == "/" {
            "/".to_string()
        } else {
            format!("{abs}/")
        };

        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| key.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect()
    }

    fn check_session(&self, session_id: SessionId) -> CoordResult<()> {
        match self.sessions.get(&session_id).map(|s| s.status) {
            Some(SessionStatus::Connected) => Ok(()),
            Some(SessionStatus::Created) | Some(SessionStatus::Disconnected) => {
                Err(CoordError::ConnectionLoss)
            }
            Some(SessionStatus::Expired) => Err(CoordError::SessionExpired),
            Some(SessionStatus::Closed) | None => Err(CoordError::Closed),
        }
    }

    fn set_status(&mut self, session_id: SessionId, status: SessionStatus, state: SessionState) {
        if let Some(entry) = self.sessions.get_mut(&session_id) {
            entry.status = status;
            // No subscribers is fine
            let _ = entry.events.send(SessionEvent { session_id, state });
        }
        if matches!(status, SessionStatus::Expired | SessionStatus::Closed) {
            self.child_watches.retain(|w| w.session_id != session_id);
        }
    }

    fn fire_child_watches(&mut self, abs: &str, kind: WatchedEventKind) {
        let (fire, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.child_watches)
            .into_iter()
            .partition(|w| w.abs_path == abs);
        self.child_watches = keep;

        for watch in fire {
            debug!(path = %watch.client_path, kind = %kind, "Firing child watch");
            let _ = watch.trigger.send(WatchedEvent {
                kind,
                path: watch.client_path,
            });
        }
    }

    fn sessions_with(&self, status: SessionStatus) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|(_, entry)| entry.status == status)
            .map(|(id, _)| *id)
            .collect()
    }
}

fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    path.rsplit_once('/')
        .map(|(parent, _)| if parent.is_empty() { "/" } else { parent })
}

fn validate_path(path: &str) -> CoordResult<()> {
    let valid = path.starts_with('/')
        && path != "/"
        && !path.ends_with('/')
        && !path.contains("//");
    if valid {
        Ok(())
    } else {
        Err(CoordError::Other(format!("invalid path: {path}")))
    }
}

// ============================================================================
// Ensemble
// ============================================================================

/// An in-process coordination cluster shared by every client it creates.
#[derive(Clone, Default)]
pub struct MemoryEnsemble {
    inner: Arc<Mutex<EnsembleState>>,
}

impl MemoryEnsemble {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, EnsembleState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a connector opening clients against this ensemble.
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            ensemble: self.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------------

    /// Creates or overwrites a node, creating missing ancestors with empty
    /// payloads. Fires child watches on the parent of every new node.
    pub fn put(&self, path: &str, data: impl Into<Vec<u8>>) -> CoordResult<()> {
        validate_path(path)?;
        let mut state = self.state();

        let mut created = Vec::new();
        let mut ancestor = String::new();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let depth = segments.len();
        for segment in segments.into_iter().take(depth.saturating_sub(1)) {
            ancestor.push('/');
            ancestor.push_str(segment);
            if !state.nodes.contains_key(&ancestor) {
                state.nodes.insert(ancestor.clone(), Vec::new());
                created.push(ancestor.clone());
            }
        }

        if state.nodes.insert(path.to_string(), data.into()).is_none() {
            created.push(path.to_string());
        }

        for node in &created {
            if let Some(parent) = parent_of(node) {
                state.fire_child_watches(parent, WatchedEventKind::NodeChildrenChanged);
            }
        }
        Ok(())
    }

    /// Creates a node whose parent must already exist.
    ///
    /// # Errors
    ///
    /// - `CoordError::NodeExists` if the node is already present
    /// - `CoordError::NoNode` if the parent is missing
    pub fn create(&self, path: &str, data: impl Into<Vec<u8>>) -> CoordResult<()> {
        validate_path(path)?;
        {
            let state = self.state();
            if state.nodes.contains_key(path) {
                return Err(CoordError::NodeExists(path.to_string()));
            }
            let parent = parent_of(path).unwrap_or("/");
            if !state.node_exists(parent) {
                return Err(CoordError::NoNode(parent.to_string()));
            }
        }
        self.put(path, data)
    }

    /// Removes a node and its whole subtree.
    ///
    /// # Errors
    ///
    /// - `CoordError::NoNode` if the node does not exist
    pub fn remove(&self, path: &str) -> CoordResult<()> {
        validate_path(path)?;
        let mut state = self.state();

        let prefix = format!("{path}/");
        let removed: Vec<String> = state
            .nodes
            .keys()
            .filter(|key| key.as_str() == path || key.starts_with(&prefix))
            .cloned()
            .collect();
        if removed.is_empty() {
            return Err(CoordError::NoNode(path.to_string()));
        }

        for key in &removed {
            state.nodes.remove(key);
            state.fire_child_watches(key, WatchedEventKind::NodeDeleted);
        }
        if let Some(parent) = parent_of(path) {
            state.fire_child_watches(parent, WatchedEventKind::NodeChildrenChanged);
        }
        Ok(())
    }

    /// Returns a node's payload.
    pub fn data(&self, path: &str) -> Option<Vec<u8>> {
        self.state().nodes.get(path).cloned()
    }

    // ------------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------------

    /// Expires every live session. Returns how many were expired.
    pub fn expire_sessions(&self) -> usize {
        let mut state = self.state();
        let mut ids = state.sessions_with(SessionStatus::Connected);
        ids.extend(state.sessions_with(SessionStatus::Disconnected));
        for id in &ids {
            state.set_status(*id, SessionStatus::Expired, SessionState::Expired);
        }
        info!(count = ids.len(), "Expired sessions");
        ids.len()
    }

    /// Moves every connected session to disconnected.
    pub fn disconnect_sessions(&self) -> usize {
        let mut state = self.state();
        let ids = state.sessions_with(SessionStatus::Connected);
        for id in &ids {
            state.set_status(*id, SessionStatus::Disconnected, SessionState::Disconnected);
        }
        ids.len()
    }

    /// Moves every disconnected session back to connected.
    pub fn reconnect_sessions(&self) -> usize {
        let mut state = self.state();
        let ids = state.sessions_with(SessionStatus::Disconnected);
        for id in &ids {
            state.set_status(*id, SessionStatus::Connected, SessionState::Connected);
        }
        ids.len()
    }

    /// Makes subsequent `connect()` calls fail with `ConnectionLoss`.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state().refuse_connections = refuse;
    }

    /// Number of sessions that completed `connect()`.
    pub fn sessions_opened(&self) -> usize {
        self.state().sessions_opened
    }

    /// Number of sessions currently connected.
    pub fn connected_sessions(&self) -> usize {
        self.state().sessions_with(SessionStatus::Connected).len()
    }

    /// Number of armed child watches, optionally limited to one path.
    pub fn live_watches(&self, abs_path: Option<&str>) -> usize {
        self.state()
            .child_watches
            .iter()
            .filter(|w| abs_path.map_or(true, |p| w.abs_path == p))
            .count()
    }

    // ------------------------------------------------------------------------
    // Fault Injection
    // ------------------------------------------------------------------------

    /// Makes `get_children` on this absolute path fail.
    pub fn fail_children(&self, abs_path: &str, fail: bool) {
        toggle(&mut self.state().failing_children, abs_path, fail);
    }

    /// Makes `get_data` on this absolute path fail.
    pub fn fail_data(&self, abs_path: &str, fail: bool) {
        toggle(&mut self.state().failing_data, abs_path, fail);
    }

    /// Makes `get_data` on this absolute path never complete.
    pub fn stall_data(&self, abs_path: &str, stall: bool) {
        toggle(&mut self.state().stalled_data, abs_path, stall);
    }

    /// Delays every `get_data` call.
    pub fn set_data_latency(&self, latency: Duration) {
        self.state().data_latency = latency;
    }
}

fn toggle(set: &mut HashSet<String>, path: &str, on: bool) {
    if on {
        set.insert(path.to_string());
    } else {
        set.remove(path);
    }
}

// ============================================================================
// Connector and Client
// ============================================================================

/// Connector opening [`MemoryClient`]s.
#[derive(Clone)]
pub struct MemoryConnector {
    ensemble: MemoryEnsemble,
}

impl Connector for MemoryConnector {
    fn create_client(
        &self,
        connect_string: &str,
        options: &ClientOptions,
    ) -> CoordResult<Arc<dyn CoordinationClient>> {
        let connect_string = ConnectString::parse(connect_string)?;
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let session_id = {
            let mut state = self.ensemble.state();
            state.next_session_id = state.next_session_id.saturating_add(1);
            let session_id = SessionId::new(state.next_session_id);
            state.sessions.insert(
                session_id,
                SessionEntry {
                    status: SessionStatus::Created,
                    events: events.clone(),
                },
            );
            session_id
        };

        debug!(
            session_id = %session_id,
            connect_string = %connect_string,
            session_timeout_ms = u64::try_from(options.session_timeout.as_millis()).unwrap_or(u64::MAX),
            "Created in-memory client"
        );

        Ok(Arc::new(MemoryClient {
            ensemble: self.ensemble.clone(),
            session_id,
            connect_string,
            events,
        }))
    }
}

/// A client bound to one in-memory session.
pub struct MemoryClient {
    ensemble: MemoryEnsemble,
    session_id: SessionId,
    connect_string: ConnectString,
    events: broadcast::Sender<SessionEvent>,
}

#[async_trait]
impl CoordinationClient for MemoryClient {
    fn session_id(&self) -> SessionId {
        self.session_id
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn connect(&self) -> CoordResult<()> {
        let mut state = self.ensemble.state();
        if state.refuse_connections {
            return Err(CoordError::ConnectionLoss);
        }
        match state.sessions.get(&self.session_id).map(|s| s.status) {
            Some(SessionStatus::Created) => {}
            Some(SessionStatus::Expired) => return Err(CoordError::SessionExpired),
            Some(_) | None => return Err(CoordError::Closed),
        }
        state.sessions_opened = state.sessions_opened.saturating_add(1);
        state.set_status(self.session_id, SessionStatus::Connected, SessionState::Connected);
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.ensemble.state();
        let already_closed = matches!(
            state.sessions.get(&self.session_id).map(|s| s.status),
            Some(SessionStatus::Closed) | None
        );
        if !already_closed {
            state.set_status(self.session_id, SessionStatus::Closed, SessionState::Closed);
        }
    }

    async fn exists(&self, path: &str) -> CoordResult<bool> {
        let abs = self.connect_string.absolute(path);
        let state = self.ensemble.state();
        state.check_session(self.session_id)?;
        Ok(state.node_exists(&abs))
    }

    async fn get_children(&self, path: &str) -> CoordResult<(Vec<String>, ChildWatch)> {
        let abs = self.connect_string.absolute(path);
        let mut state = self.ensemble.state();
        state.check_session(self.session_id)?;

        if state.failing_children.contains(&abs) {
            return Err(CoordError::Other(format!("injected children failure: {path}")));
        }
        if !state.node_exists(&abs) {
            return Err(CoordError::NoNode(path.to_string()));
        }

        let children = state.children_of(&abs);
        let (trigger, watch) = ChildWatch::channel();
        state.child_watches.push(WatchEntry {
            session_id: self.session_id,
            abs_path: abs,
            client_path: path.to_string(),
            trigger,
        });
        Ok((children, watch))
    }

    async fn get_data(&self, path: &str) -> CoordResult<Vec<u8>> {
        let abs = self.connect_string.absolute(path);
        let (result, latency, stalled) = {
            let state = self.ensemble.state();
            let result = match state.check_session(self.session_id) {
                Err(e) => Err(e),
                Ok(()) if state.failing_data.contains(&abs) => Err(CoordError::Other(format!(
                    "injected data failure: {path}"
                ))),
                Ok(()) => state
                    .nodes
                    .get(&abs)
                    .cloned()
                    .ok_or_else(|| CoordError::NoNode(path.to_string())),
            };
            (result, state.data_latency, state.stalled_data.contains(&abs))
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if stalled {
            std::future::pending::<()>().await;
        }
        result
    }
}
