//! Storage provider trait definition.

use crate::error::StorageResult;
use crate::types::{
    ColumnSpec, ColumnType, ConnectionHandle, RowIndex, SnapshotHandle, TransactionKind,
    TransactionState, Value,
};
use std::path::Path;

/// The engine behind an embra database.
///
/// A provider owns the physical database files and exposes atomic primitives
/// over them. Embra never touches the file format; it only drives this trait.
///
/// # Invariants
///
/// - Connections opened on the same path share one group and see each other's
///   commits.
/// - At most one connection per group holds the writer slot at a time;
///   `start_transaction(Write)` blocks until the slot is free.
/// - A read snapshot never changes after it was started, whatever other
///   connections commit.
/// - Schema and row mutations require the connection to be inside a write
///   transaction.
/// - Reads outside any transaction see the latest committed state.
///
/// # Implementors
///
/// - [`super::EmbeddedProvider`] - in-memory or file-backed shared groups
pub trait StorageProvider: Send + Sync {
    /// Opens (or creates) the shared group stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing and `create_if_missing` is
    /// false, or if it cannot be read or decoded.
    fn create_shared_group(
        &self,
        path: &Path,
        create_if_missing: bool,
    ) -> StorageResult<ConnectionHandle>;

    /// Closes a connection, abandoning any transaction it still has open.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is unknown.
    fn close_shared_group(&self, connection: ConnectionHandle) -> StorageResult<()>;

    /// Checks whether a table exists in the connection's current view.
    fn has_table(&self, connection: ConnectionHandle, table: &str) -> StorageResult<bool>;

    /// Creates an empty table.
    fn add_table(&self, connection: ConnectionHandle, table: &str) -> StorageResult<()>;

    /// Appends a column to a table. Existing rows get the type's default value.
    fn add_column_to_table(
        &self,
        connection: ConnectionHandle,
        table: &str,
        column: &str,
        column_type: ColumnType,
    ) -> StorageResult<()>;

    /// Appends a row filled with default values and returns its index.
    fn add_empty_row(&self, connection: ConnectionHandle, table: &str) -> StorageResult<RowIndex>;

    /// Starts a transaction.
    ///
    /// Failure is reported by returning [`SnapshotHandle::invalid`], never by
    /// panicking. A write request blocks until the writer slot is available.
    fn start_transaction(
        &self,
        connection: ConnectionHandle,
        kind: TransactionKind,
    ) -> SnapshotHandle;

    /// Releases the connection's read snapshot.
    fn end_read(&self, connection: ConnectionHandle) -> StorageResult<()>;

    /// Publishes the connection's write session and frees the writer slot.
    fn commit(&self, connection: ConnectionHandle) -> StorageResult<()>;

    /// Discards the connection's write session and frees the writer slot.
    fn rollback(&self, connection: ConnectionHandle) -> StorageResult<()>;

    /// Returns the connection's transaction state. Unknown connections report
    /// [`TransactionState::None`].
    fn transaction_state(&self, connection: ConnectionHandle) -> TransactionState;

    /// Returns the columns of a table in creation order.
    fn columns(&self, connection: ConnectionHandle, table: &str)
        -> StorageResult<Vec<ColumnSpec>>;

    /// Returns the number of rows in a table.
    fn row_count(&self, connection: ConnectionHandle, table: &str) -> StorageResult<u64>;

    /// Reads one cell.
    fn get_value(
        &self,
        connection: ConnectionHandle,
        table: &str,
        column: &str,
        row: RowIndex,
    ) -> StorageResult<Value>;

    /// Writes one cell. The value must match the column type.
    fn set_value(
        &self,
        connection: ConnectionHandle,
        table: &str,
        column: &str,
        row: RowIndex,
        value: Value,
    ) -> StorageResult<()>;
}
