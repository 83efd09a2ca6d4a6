//! Scoped ownership of provider resources.
//!
//! Every connection and snapshot the database obtains from its provider is
//! wrapped in a [`ResourceHandle`]. The handle releases the resource exactly
//! once: on [`ResourceHandle::close`], or on drop if nobody closed it. A
//! resource handed to an explicit end call is first taken out with
//! [`ResourceHandle::disarm`], after which the handle releases nothing.

use embra_storage::{
    ConnectionHandle, SnapshotHandle, StorageProvider, StorageResult, TransactionKind,
};
use std::fmt;
use std::sync::Arc;

/// A provider resource that must be released exactly once.
pub trait NativeResource: Copy + fmt::Debug {
    /// Checks whether the provider actually handed out this resource.
    fn is_valid(&self) -> bool;

    /// Gives the resource back to the provider.
    fn release(self, provider: &dyn StorageProvider) -> StorageResult<()>;
}

impl NativeResource for ConnectionHandle {
    fn is_valid(&self) -> bool {
        true
    }

    fn release(self, provider: &dyn StorageProvider) -> StorageResult<()> {
        provider.close_shared_group(self)
    }
}

impl NativeResource for SnapshotHandle {
    fn is_valid(&self) -> bool {
        SnapshotHandle::is_valid(self)
    }

    /// Ends a read snapshot; rolls a write session back.
    fn release(self, provider: &dyn StorageProvider) -> StorageResult<()> {
        match self.kind() {
            TransactionKind::Read => provider.end_read(self.connection()),
            TransactionKind::Write => provider.rollback(self.connection()),
        }
    }
}

/// Owns one provider resource and releases it on every exit path.
pub struct ResourceHandle<R: NativeResource> {
    provider: Arc<dyn StorageProvider>,
    resource: Option<R>,
}

impl<R: NativeResource> ResourceHandle<R> {
    /// Takes ownership of `resource`.
    ///
    /// An invalid resource is not adopted: the handle starts out closed and
    /// never releases anything.
    pub fn new(provider: Arc<dyn StorageProvider>, resource: R) -> Self {
        Self {
            provider,
            resource: resource.is_valid().then_some(resource),
        }
    }

    /// Returns the resource while the handle still owns it.
    #[must_use]
    pub fn get(&self) -> Option<R> {
        self.resource
    }

    /// Checks whether the handle still owns its resource.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.resource.is_some()
    }

    /// Releases the resource now. Later calls (and drop) do nothing.
    ///
    /// # Errors
    ///
    /// Returns the provider's error. The resource counts as released either way.
    pub fn close(&mut self) -> StorageResult<()> {
        match self.resource.take() {
            Some(resource) => resource.release(&*self.provider),
            None => Ok(()),
        }
    }

    /// Takes the resource out without releasing it; the caller now ends it.
    pub fn disarm(&mut self) -> Option<R> {
        self.resource.take()
    }
}

impl<R: NativeResource> Drop for ResourceHandle<R> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource {
            if let Err(err) = self.close() {
                tracing::warn!(?resource, error = %err, "releasing resource on drop failed");
            }
        }
    }
}

impl<R: NativeResource> fmt::Debug for ResourceHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}
