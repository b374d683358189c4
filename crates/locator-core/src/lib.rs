//! Locator Core - Shared types for service location
//!
//! This crate provides the types shared by every locator implementation:
//! the static list locator defined here, the HTTP locator (`locator-http`)
//! and the coordination-backed dynamic locator (`locator-dynamic`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod extract;
pub mod location;
pub mod locator;
pub mod simple;

// Re-exports for convenience
pub use error::{LocatorError, LocatorResult};
pub use extract::{DataExtractor, JsonAddressExtractor};
pub use location::Location;
pub use locator::Locator;
pub use simple::{StaticLocator, StaticLocatorParameters};
