//! Coordination session lifecycle.
//!
//! The `ConnectionManager` owns the single shared session of a dynamic
//! locator. It:
//! - Resolves the cluster address through the bootstrap locator
//! - Opens a client against `address + root path` and publishes it to the
//!   [`SessionHandle`]
//! - Supervises the session: a disconnect starts a grace timer of one
//!   session timeout, and a session that does not recover in time is
//!   closed and treated as expired
//! - Reopens a fresh session after expiry, forever, until shut down
//!
//! # Connection Lifecycle
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──SYNC_CONNECTED──▶ Connected
//!      ▲                          ▲                              │
//!      │                          └───────DISCONNECTED───────────┤
//!      └──────────EXPIRED / grace timer / shutdown───────────────┘
//! ```
//!
//! Bootstrap failures are retried immediately. Refused connections and
//! expired sessions are retried after one spin delay.
//!
//! **Panic-Free Policy:** no `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use locator_core::{Locator, LocatorError};
use locator_coord::{ClientOptions, Connector, SessionEvent, SessionState};

use crate::config::DynamicLocatorConfig;
use crate::events::{EventBus, LocatorEvent};
use crate::session::{SessionHandle, SharedClient};

// ============================================================================
// State
// ============================================================================

/// Connection state as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// How a supervised session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionOutcome {
    Expired,
    Cancelled,
}

// ============================================================================
// Connection Manager
// ============================================================================

/// Keeps exactly one coordination session alive.
pub struct ConnectionManager {
    root_path: String,
    options: ClientOptions,
    bootstrap: Arc<dyn Locator>,
    connector: Arc<dyn Connector>,
    session: SessionHandle,
    events: EventBus,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Creates a manager. Nothing happens until [`ConnectionHandle::connect`].
    pub fn new(
        config: &DynamicLocatorConfig,
        bootstrap: Arc<dyn Locator>,
        connector: Arc<dyn Connector>,
        session: SessionHandle,
        events: EventBus,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            root_path: config.path.clone(),
            options: config.client_options(),
            bootstrap,
            connector,
            session,
            events,
            state,
            cancel: CancellationToken::new(),
        }
    }

    /// Runs until cancelled.
    async fn run(self: Arc<Self>) {
        info!(root = %self.root_path, "Connection manager starting");

        while let Some((client, session_events)) = self.open_session().await {
            let outcome = self.supervise(&client, session_events).await;
            client.close().await;
            self.set_state(ConnectionState::Disconnected);

            if outcome == SessionOutcome::Cancelled {
                break;
            }

            warn!(session_id = %client.session_id(), "Session expired, reconnecting");
            self.events.publish(LocatorEvent::Expired);
            if !self.pause(self.options.spin_delay).await {
                break;
            }
        }

        self.set_state(ConnectionState::Disconnected);
        if let Some(client) = self.session.current() {
            client.close().await;
        }
        self.session.clear();
        info!(root = %self.root_path, "Connection manager stopped");
    }

    /// Resolves the cluster and opens a connected client.
    ///
    /// Returns `None` only when cancelled.
    async fn open_session(&self) -> Option<(SharedClient, broadcast::Receiver<SessionEvent>)> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            self.set_state(ConnectionState::Connecting);

            let located = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                located = self.bootstrap.locate() => located,
            };
            let location = match located {
                Ok(location) => location,
                Err(error) => {
                    warn!(error = %error, "Failed to locate coordination cluster, retrying");
                    self.events.publish(LocatorEvent::BootstrapError { error });
                    tokio::task::yield_now().await;
                    continue;
                }
            };

            let connect_string = self.connect_string(&location.authority());
            let client = match self.connector.create_client(&connect_string, &self.options) {
                Ok(client) => client,
                Err(e) => {
                    warn!(connect_string = %connect_string, error = %e, "Failed to create client");
                    self.events.publish(LocatorEvent::BootstrapError {
                        error: LocatorError::Bootstrap(e.to_string()),
                    });
                    if !self.pause(self.options.spin_delay).await {
                        return None;
                    }
                    continue;
                }
            };

            // Subscribe first so the initial transition is observed
            let session_events = client.subscribe();
            info!(
                connect_string = %connect_string,
                session_id = %client.session_id(),
                "Connecting to coordination cluster"
            );
            self.events.publish(LocatorEvent::Connecting);

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => {
                    client.close().await;
                    return None;
                }
                connected = client.connect() => connected,
            };
            match connected {
                Ok(()) => {
                    self.session.replace(Arc::clone(&client));
                    return Some((client, session_events));
                }
                Err(e) => {
                    warn!(
                        connect_string = %connect_string,
                        error = %e,
                        retry_in_ms = u64::try_from(self.options.spin_delay.as_millis()).unwrap_or(u64::MAX),
                        "Connection attempt failed"
                    );
                    client.close().await;
                    if !self.pause(self.options.spin_delay).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Follows one session until it expires or the manager is cancelled.
    async fn supervise(
        &self,
        client: &SharedClient,
        mut session_events: broadcast::Receiver<SessionEvent>,
    ) -> SessionOutcome {
        let session_timeout = self.options.session_timeout;
        let mut grace_deadline: Option<Instant> = None;

        loop {
            let grace = async move {
                match grace_deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,

                _ = grace => {
                    warn!(
                        session_id = %client.session_id(),
                        session_timeout_ms = u64::try_from(session_timeout.as_millis()).unwrap_or(u64::MAX),
                        "Session did not recover within the session timeout, forcing expiry"
                    );
                    return SessionOutcome::Expired;
                }

                received = session_events.recv() => {
                    let event = match received {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Session event receiver lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return SessionOutcome::Expired,
                    };

                    debug!(session_id = %event.session_id, state = %event.state, "Session state change");
                    self.events.publish(LocatorEvent::StateChange {
                        state: event.state,
                        session_id: event.session_id,
                    });

                    match event.state {
                        SessionState::Connected => {
                            grace_deadline = None;
                            self.set_state(ConnectionState::Connected);
                            info!(session_id = %event.session_id, "Connected to coordination cluster");
                            self.events.publish(LocatorEvent::Connected);
                        }
                        SessionState::Disconnected => {
                            grace_deadline = Some(Instant::now() + session_timeout);
                            self.set_state(ConnectionState::Disconnected);
                            warn!(session_id = %event.session_id, "Disconnected from coordination cluster");
                            self.events.publish(LocatorEvent::Disconnected);
                        }
                        SessionState::Expired | SessionState::Closed => {
                            return SessionOutcome::Expired;
                        }
                    }
                }
            }
        }
    }

    fn connect_string(&self, authority: &str) -> String {
        if self.root_path == "/" {
            authority.to_string()
        } else {
            format!("{authority}{}", self.root_path)
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    /// Sleeps unless cancelled first. Returns false if cancelled.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep(delay) => true,
        }
    }
}

// ============================================================================
// Connection Handle
// ============================================================================

/// Cheap-to-clone control surface of a [`ConnectionManager`].
#[derive(Clone)]
pub struct ConnectionHandle {
    manager: Arc<ConnectionManager>,
    started: Arc<AtomicBool>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ConnectionHandle {
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            manager: Arc::new(manager),
            started: Arc::new(AtomicBool::new(false)),
            task: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts the connection loop. Idempotent: returns false if the loop
    /// was already started. Must be called within a tokio runtime.
    pub fn connect(&self) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Connection loop already running");
            return false;
        }
        let manager = Arc::clone(&self.manager);
        let task = tokio::spawn(manager.run());
        if let Ok(mut slot) = self.task.lock() {
            *slot = Some(task);
        }
        true
    }

    pub fn state(&self) -> ConnectionState {
        *self.manager.state.borrow()
    }

    /// Watches connection state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.manager.state.subscribe()
    }

    /// Signals the loop to stop without waiting for it.
    pub fn cancel(&self) {
        self.manager.cancel.cancel();
    }

    /// Stops the loop, closes the session and waits for the task to end.
    pub async fn shutdown(&self) {
        self.cancel();
        let task = self.task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Connection task ended abnormally");
            }
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("state", &self.state())
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish()
    }
}
