//! Pool manager commands and status.
//!
//! `PoolCommand` carries two kinds of traffic into the actor:
//! - Requests from [`PoolHandle`](super::PoolHandle) callers, answered over
//!   a oneshot channel
//! - Completions of the actor's own background work (existence checks,
//!   child fetches, watch notifications, request timers)
//!
//! Background completions are tagged with the session generation they were
//! started under; the actor drops any that arrive for an older generation.

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use locator_core::{Location, LocatorResult};
use locator_coord::{CoordError, CoordResult, SessionId, WatchedEvent};

// ============================================================================
// Pool Commands
// ============================================================================

/// Commands processed by the pool actor.
#[derive(Debug)]
pub enum PoolCommand {
    /// Resolve one location.
    ///
    /// Answered immediately when a pool is loaded, otherwise queued until a
    /// pool arrives or the request times out.
    ///
    /// # Errors
    /// - `LocatorError::EmptyPool` if the effective pool is empty
    /// - `LocatorError::ResolutionTimeout` if no pool arrived in time
    Resolve {
        respond_to: oneshot::Sender<LocatorResult<Location>>,
    },

    /// Snapshot of the pool manager's state.
    GetStatus {
        respond_to: oneshot::Sender<PoolStatus>,
    },

    /// Stop the actor. Queued requests are answered with
    /// `LocatorError::ChannelClosed`.
    Shutdown,

    /// A queued request's timer elapsed.
    RequestTimedOut { request_id: u64 },

    /// An existence check finished.
    ExistsChecked {
        generation: u64,
        result: CoordResult<bool>,
    },

    /// A child listing and its data fetches finished.
    PoolFetched {
        generation: u64,
        seq: u64,
        outcome: FetchOutcome,
    },

    /// The child watch armed by a listing fired.
    ChildrenChanged { generation: u64, event: WatchedEvent },
}

/// Result of one list-and-fetch round.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Usable locations, in listing order.
    Built(Vec<Location>),

    /// Listing the children failed.
    ListFailed(CoordError),
}

// ============================================================================
// Pool Status
// ============================================================================

/// Point-in-time view of a pool manager.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStatus {
    /// Normalized service path.
    pub path: String,

    /// Live pool; `None` while loading.
    pub pool: Option<Vec<Location>>,

    /// Last non-empty pool (or the first pool ever loaded).
    pub cached_pool: Option<Vec<Location>>,

    /// Requests waiting for a pool.
    pub queued: usize,

    /// True when the last existence check did not find the path.
    pub stale: bool,

    /// Session generation the current state was derived from.
    pub generation: u64,

    /// Session backing the current generation.
    pub session_id: Option<SessionId>,

    /// When the live pool was last replaced.
    pub last_updated: Option<DateTime<Utc>>,
}

impl PoolStatus {
    /// Number of live entries, zero while loading.
    pub fn size(&self) -> usize {
        self.pool.as_ref().map_or(0, Vec::len)
    }

    pub fn is_loading(&self) -> bool {
        self.pool.is_none()
    }
}
