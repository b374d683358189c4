//! The async `Locator` trait shared by every locator flavour.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{Location, LocatorResult};

/// Produces one resolved `Location` per call.
///
/// Implementations decide how: a fixed list, an HTTP lookup, or a
/// coordination-backed pool. A locator is also what the dynamic locator
/// uses to find its own coordination cluster.
#[async_trait]
pub trait Locator: Send + Sync {
    async fn locate(&self) -> LocatorResult<Location>;
}

#[async_trait]
impl<L: Locator + ?Sized> Locator for Arc<L> {
    async fn locate(&self) -> LocatorResult<Location> {
        (**self).locate().await
    }
}

#[async_trait]
impl<L: Locator + ?Sized> Locator for Box<L> {
    async fn locate(&self) -> LocatorResult<Location> {
        (**self).locate().await
    }
}
