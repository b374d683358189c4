//! Shared slot holding the current coordination client.
//!
//! The connection manager is the only writer. Pool managers watch the slot
//! and treat every replacement as a new session generation: they drop all
//! state derived from the previous client and re-arm against the new one.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use locator_coord::{CoordinationClient, SessionId};

/// A coordination client shared between the connection and pool managers.
pub type SharedClient = Arc<dyn CoordinationClient>;

/// Cheap-to-clone handle to the current session.
#[derive(Clone)]
pub struct SessionHandle {
    sender: Arc<watch::Sender<Option<SharedClient>>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// The current client, if a session has been established.
    pub fn current(&self) -> Option<SharedClient> {
        self.sender.borrow().clone()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.sender.borrow().as_ref().map(|client| client.session_id())
    }

    /// Watches for session replacement.
    pub fn subscribe(&self) -> watch::Receiver<Option<SharedClient>> {
        self.sender.subscribe()
    }

    /// Installs a new client. Every watcher sees a change, even if the
    /// new client reuses an address.
    pub(crate) fn replace(&self, client: SharedClient) {
        info!(session_id = %client.session_id(), "Session installed");
        self.sender.send_replace(Some(client));
    }

    /// Empties the slot on shutdown.
    pub(crate) fn clear(&self) {
        self.sender.send_replace(None);
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id())
            .finish()
    }
}
