//! Read and write transactions.
//!
//! A database moves through a small state machine:
//!
//! ```text
//! None --begin_read-->  Read  --end(any)-->   None
//! None --begin_write--> Write --end(true)-->  None   (commit)
//!                             --end(false)--> None   (rollback)
//! ```
//!
//! Transactions never nest. A [`Transaction`] is a view over the snapshot
//! its database owns; dropping it without an explicit end behaves like
//! [`Transaction::rollback`].

use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use embra_storage::{SnapshotHandle, TransactionKind};
use std::fmt;

/// An active read or write session on a [`Database`].
#[must_use = "dropping a transaction rolls it back"]
pub struct Transaction<'db> {
    db: &'db Database,
    snapshot: SnapshotHandle,
    finished: bool,
}

impl<'db> Transaction<'db> {
    pub(crate) fn new(db: &'db Database, snapshot: SnapshotHandle) -> Self {
        Self {
            db,
            snapshot,
            finished: false,
        }
    }

    /// Returns the transaction kind.
    #[must_use]
    pub fn kind(&self) -> TransactionKind {
        self.snapshot.kind()
    }

    /// Checks whether this is a write transaction.
    #[must_use]
    pub fn is_write(&self) -> bool {
        self.kind() == TransactionKind::Write
    }

    /// Returns the snapshot this transaction reads from.
    #[must_use]
    pub fn snapshot(&self) -> SnapshotHandle {
        self.snapshot
    }

    /// Returns the database the transaction belongs to.
    #[must_use]
    pub fn database(&self) -> &'db Database {
        self.db
    }

    /// Checks whether the transaction is still the database's active one.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.finished && self.db.owns_snapshot(self.snapshot)
    }

    /// Commits a write transaction; ends a read transaction.
    ///
    /// # Errors
    ///
    /// `IllegalState` if the transaction was already ended through the
    /// database, `EngineFatal` if the engine failed (the database is then
    /// invalid).
    pub fn commit(mut self) -> CoreResult<()> {
        self.finish(true)
    }

    /// Rolls a write transaction back; ends a read transaction.
    ///
    /// # Errors
    ///
    /// Same as [`Transaction::commit`].
    pub fn rollback(mut self) -> CoreResult<()> {
        self.finish(false)
    }

    fn finish(&mut self, commit: bool) -> CoreResult<()> {
        self.finished = true;
        self.db.end_snapshot(self.snapshot, commit)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.finish(false) {
            Ok(()) | Err(CoreError::IllegalState { .. } | CoreError::Disposed) => {}
            Err(err) => {
                tracing::warn!(snapshot = ?self.snapshot, error = %err, "ending transaction on drop failed");
            }
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("kind", &self.kind())
            .field("snapshot", &self.snapshot.id())
            .field("finished", &self.finished)
            .finish()
    }
}
