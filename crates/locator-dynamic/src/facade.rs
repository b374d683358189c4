//! The dynamic locator facade.
//!
//! One `DynamicLocator` owns one coordination session (through its
//! connection manager) and one pool manager per service path. Handles for
//! the same normalized path are memoized, so every caller asking for
//! `/svc/a` shares its cursor and queue.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::{debug, info};

use locator_core::{DataExtractor, JsonAddressExtractor, Locator, LocatorResult};
use locator_coord::Connector;

use crate::config::DynamicLocatorConfig;
use crate::connection::{ConnectionHandle, ConnectionManager, ConnectionState};
use crate::events::{EventBus, EventKind, ListenerId, LocatorEvent};
use crate::path::normalize_path;
use crate::pool::{spawn_pool_manager, PoolHandle, PoolSettings};
use crate::session::SessionHandle;

/// Coordination-backed dynamic locator.
///
/// Creating one starts connecting immediately; it must be created within a
/// tokio runtime.
///
/// # Example
///
/// ```ignore
/// let locator = DynamicLocator::new(
///     DynamicLocatorConfig::new("/services"),
///     Arc::new(StaticLocator::new("zk1:2181")?),
///     Arc::new(connector),
/// )?;
/// let pool = locator.for_path("/billing/api")?;
/// let location = pool.resolve().await?;
/// ```
pub struct DynamicLocator {
    config: DynamicLocatorConfig,
    extractor: Arc<dyn DataExtractor>,
    events: EventBus,
    session: SessionHandle,
    connection: ConnectionHandle,
    managers: Mutex<HashMap<String, PoolHandle>>,
}

impl DynamicLocator {
    /// Creates a locator using the default `{"address", "port"}` payload
    /// extractor.
    ///
    /// # Errors
    ///
    /// - `LocatorError::InvalidPath` if the configured root path is invalid
    pub fn new(
        config: DynamicLocatorConfig,
        bootstrap: Arc<dyn Locator>,
        connector: Arc<dyn Connector>,
    ) -> LocatorResult<Self> {
        Self::with_extractor(config, bootstrap, connector, Arc::new(JsonAddressExtractor))
    }

    /// Creates a locator with a custom child payload extractor.
    pub fn with_extractor(
        mut config: DynamicLocatorConfig,
        bootstrap: Arc<dyn Locator>,
        connector: Arc<dyn Connector>,
        extractor: Arc<dyn DataExtractor>,
    ) -> LocatorResult<Self> {
        config.path = normalize_path(&config.path)?;

        let events = EventBus::new();
        let session = SessionHandle::new();
        let manager = ConnectionManager::new(
            &config,
            bootstrap,
            connector,
            session.clone(),
            events.clone(),
        );
        let connection = ConnectionHandle::new(manager);

        info!(
            root = %config.path,
            strict = config.strict,
            locator_timeout_ms = config.locator_timeout_ms,
            "Starting dynamic locator"
        );
        connection.connect();

        Ok(Self {
            config,
            extractor,
            events,
            session,
            connection,
            managers: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the pool handle for a service path, creating its pool
    /// manager on first use.
    ///
    /// A missing leading `/` is added, so `svc/a` and `/svc/a` share one
    /// manager.
    ///
    /// # Errors
    ///
    /// - `LocatorError::InvalidPath` if the path is malformed
    pub fn for_path(&self, path: &str) -> LocatorResult<PoolHandle> {
        let path = normalize_path(path)?;
        let mut managers = self.managers();
        if let Some(handle) = managers.get(&path) {
            return Ok(handle.clone());
        }

        debug!(path = %path, "Creating pool manager");
        let handle = spawn_pool_manager(
            path.clone(),
            &self.session,
            self.events.clone(),
            Arc::clone(&self.extractor),
            PoolSettings {
                timeout: self.config.locator_timeout(),
                strict: self.config.strict,
            },
        );
        managers.insert(path, handle.clone());
        Ok(handle)
    }

    /// Paths with a live pool manager, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.managers().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn config(&self) -> &DynamicLocatorConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribes to every locator event.
    pub fn subscribe(&self) -> broadcast::Receiver<LocatorEvent> {
        self.events.subscribe()
    }

    /// Registers a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&LocatorEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    /// Removes a listener registered with [`on`](Self::on).
    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Stops reconnecting, closes the session and drops every pool manager.
    /// Requests already queued are answered with `ChannelClosed`.
    pub async fn shutdown(&self) {
        info!(root = %self.config.path, "Shutting down dynamic locator");
        self.connection.shutdown().await;
        let handles: Vec<PoolHandle> = self.managers().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.shutdown().await;
        }
    }

    fn managers(&self) -> MutexGuard<'_, HashMap<String, PoolHandle>> {
        self.managers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for DynamicLocator {
    fn drop(&mut self) {
        self.connection.cancel();
    }
}

impl fmt::Debug for DynamicLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicLocator")
            .field("root", &self.config.path)
            .field("session", &self.session)
            .field("paths", &self.paths())
            .finish()
    }
}
