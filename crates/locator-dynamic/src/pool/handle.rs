//! Client interface for interacting with a pool actor.
//!
//! # Panic-Free Guarantees
//!
//! Channel errors are mapped to `LocatorError::ChannelClosed`.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use locator_core::{Location, Locator, LocatorError, LocatorResult};

use super::commands::{PoolCommand, PoolStatus};

/// Handle to the pool manager of one service path.
///
/// Cheap to clone. Every clone talks to the same actor, so all clones
/// share one round-robin cursor and one request queue.
#[derive(Clone, Debug)]
pub struct PoolHandle {
    path: String,
    sender: mpsc::Sender<PoolCommand>,
}

impl PoolHandle {
    pub fn new(path: String, sender: mpsc::Sender<PoolCommand>) -> Self {
        Self { path, sender }
    }

    /// Normalized service path this handle resolves.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolves one location.
    ///
    /// Answers immediately when a pool is loaded; otherwise waits until the
    /// pool arrives or the locator timeout elapses.
    ///
    /// # Errors
    ///
    /// - `LocatorError::EmptyPool` if the effective pool is empty
    /// - `LocatorError::ResolutionTimeout` if no pool arrived in time
    /// - `LocatorError::ChannelClosed` if the actor has shut down
    pub async fn resolve(&self) -> LocatorResult<Location> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PoolCommand::Resolve { respond_to: tx })
            .await
            .map_err(|_| LocatorError::ChannelClosed)?;
        rx.await.map_err(|_| LocatorError::ChannelClosed)?
    }

    /// Snapshot of the pool, cache and queue.
    ///
    /// Returns `None` if the actor has shut down.
    pub async fn status(&self) -> Option<PoolStatus> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PoolCommand::GetStatus { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Stops the actor. Requests still queued fail with `ChannelClosed`.
    pub async fn shutdown(&self) {
        // Already stopped is fine
        let _ = self.sender.send(PoolCommand::Shutdown).await;
    }

    /// Returns true while the actor is running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[async_trait]
impl Locator for PoolHandle {
    async fn locate(&self) -> LocatorResult<Location> {
        self.resolve().await
    }
}
