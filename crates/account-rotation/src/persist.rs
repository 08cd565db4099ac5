//! Persistence seam between the manager and the on-disk store
//!
//! The manager only ever hands out snapshots; it never needs the store's
//! load path. Boxed futures keep the trait dyn-compatible so the manager can
//! hold `Arc<dyn Persistence>`.

use std::future::Future;
use std::pin::Pin;

use account_store::{AccountDocument, AccountStore};

/// Boxed future returned by `Persistence` methods.
pub type PersistFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Destination for rotation state snapshots.
pub trait Persistence: Send + Sync {
    /// Write a full snapshot. Failures must be returned, not swallowed.
    fn save<'a>(
        &'a self,
        document: &'a AccountDocument,
    ) -> PersistFuture<'a, account_store::Result<()>>;

    /// Remove all persisted state. Best effort; returns whether anything was removed.
    fn clear(&self) -> PersistFuture<'_, bool>;
}

impl Persistence for AccountStore {
    fn save<'a>(
        &'a self,
        document: &'a AccountDocument,
    ) -> PersistFuture<'a, account_store::Result<()>> {
        Box::pin(AccountStore::save(self, document))
    }

    fn clear(&self) -> PersistFuture<'_, bool> {
        Box::pin(AccountStore::clear(self))
    }
}
