//! Per-path pool managers using the actor pattern.
//!
//! Each watched service path gets one `PoolActor` owning that path's live
//! pool, cached pool, request queue and round-robin cursor. Callers talk to
//! it through a cheap-to-clone `PoolHandle`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  PoolCommand   ┌──────────────┐   exists / list / get_data
//! │  PoolHandle  │───(mpsc)──────▶│  PoolActor   │──────────(spawned)──────────▶ cluster
//! └──────────────┘                └──────────────┘
//!        ▲                          ▲         ▲
//!        │ oneshot reply            │         │ ExistsChecked / PoolFetched /
//!        └──────────────────────────┘         │ ChildrenChanged / RequestTimedOut
//!                                             │ (weak mpsc sender)
//!                      SessionHandle (watch) ─┘ new session => new generation
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use std::sync::Arc;

use tokio::sync::mpsc;

use locator_core::DataExtractor;

use crate::events::EventBus;
use crate::session::SessionHandle;

mod actor;
mod commands;
mod handle;

pub use actor::{PoolActor, PoolSettings};
pub use commands::{FetchOutcome, PoolCommand, PoolStatus};
pub use handle::PoolHandle;

/// Command channel buffer size.
const COMMAND_BUFFER: usize = 100;

/// Spawns a pool actor for `path` and returns its handle.
///
/// `path` must already be normalized. The actor arms itself against the
/// current session (if any) and re-arms on every session replacement. It
/// stops once every handle is dropped.
///
/// Must be called within a tokio runtime.
pub fn spawn_pool_manager(
    path: String,
    session: &SessionHandle,
    events: EventBus,
    extractor: Arc<dyn DataExtractor>,
    settings: PoolSettings,
) -> PoolHandle {
    let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
    let actor = PoolActor::new(
        path.clone(),
        receiver,
        sender.downgrade(),
        session.subscribe(),
        events,
        extractor,
        settings,
    );
    tokio::spawn(actor.run());

    PoolHandle::new(path, sender)
}
