//! Locator Coord - Coordination cluster capability surface
//!
//! The dynamic locator never speaks a coordination wire protocol itself.
//! It consumes the capability described here: open a client against a
//! connect string, observe its session lifecycle, and run `exists`,
//! `get_children` (with a one-shot child watch) and `get_data`.
//!
//! `memory` provides an in-process ensemble implementing the surface. It
//! backs the integration tests and the `locate simulate` command.

pub mod client;
pub mod error;
pub mod memory;

pub use client::{
    ChildWatch, ClientOptions, ConnectString, Connector, CoordinationClient, SessionEvent,
    SessionId, SessionState, WatchedEvent, WatchedEventKind,
};
pub use error::{CoordError, CoordResult};
pub use memory::{MemoryClient, MemoryConnector, MemoryEnsemble};
