//! Locator Dynamic - coordination-backed service location
//!
//! A [`DynamicLocator`] keeps one coordination session alive and, for every
//! service path asked for, a watched pool of the locations registered as
//! that path's children. `resolve()` hands out pool entries round-robin and
//! queues callers while a pool is still loading.
//!
//! # Architecture
//!
//! ```text
//! bootstrap Locator ──▶ ConnectionManager ──▶ SessionHandle (watch)
//!                              │                     │
//!                              ▼                     ▼
//!                          EventBus ◀──────── PoolActor per path ◀── PoolHandle::resolve()
//! ```
//!
//! - `connection`: bootstrap, connect, grace timer, expiry and reconnect
//! - `session`: the shared current-client slot; replacement = new generation
//! - `pool`: per-path actor (existence check, child watch, fetch, cache,
//!   queue, round-robin dispatch)
//! - `events`: broadcast and listener fan-out of [`LocatorEvent`]s
//!
//! # Panic-Free Guarantees
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`
//! outside of tests.

pub mod config;
pub mod connection;
pub mod events;
pub mod facade;
pub mod path;
pub mod pool;
pub mod session;

pub use config::{ConfigError, DynamicLocatorConfig};
pub use connection::{ConnectionHandle, ConnectionManager, ConnectionState};
pub use events::{EventBus, EventKind, ListenerId, LocatorEvent};
pub use facade::DynamicLocator;
pub use path::normalize_path;
pub use pool::{spawn_pool_manager, PoolHandle, PoolSettings, PoolStatus};
pub use session::{SessionHandle, SharedClient};
