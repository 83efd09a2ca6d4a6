//! Test-only provider that injects failures and counts calls.

use embra_storage::{
    ColumnSpec, ColumnType, ConnectionHandle, EmbeddedProvider, RowIndex, SnapshotHandle,
    StorageError, StorageProvider, StorageResult, TransactionKind, TransactionState, Value,
};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Call counts observed by a [`ScriptedProvider`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Counts {
    pub add_tables: usize,
    pub add_columns: usize,
    pub add_rows: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub end_reads: usize,
    pub closes: usize,
}

/// Wraps an in-memory [`EmbeddedProvider`]; every primitive can be told to fail.
#[derive(Debug, Default)]
pub(crate) struct ScriptedProvider {
    inner: EmbeddedProvider,
    fail_start: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
    fail_end_read: AtomicBool,
    fail_close: AtomicBool,
    add_tables: AtomicUsize,
    add_columns: AtomicUsize,
    add_rows: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    end_reads: AtomicUsize,
    closes: AtomicUsize,
}

fn injected(what: &str) -> StorageError {
    StorageError::Io(io::Error::new(
        io::ErrorKind::Other,
        format!("injected {what} failure"),
    ))
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inner(&self) -> &EmbeddedProvider {
        &self.inner
    }

    pub(crate) fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_rollback(&self, fail: bool) {
        self.fail_rollback.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_end_read(&self, fail: bool) {
        self.fail_end_read.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn counts(&self) -> Counts {
        Counts {
            add_tables: self.add_tables.load(Ordering::SeqCst),
            add_columns: self.add_columns.load(Ordering::SeqCst),
            add_rows: self.add_rows.load(Ordering::SeqCst),
            commits: self.commits.load(Ordering::SeqCst),
            rollbacks: self.rollbacks.load(Ordering::SeqCst),
            end_reads: self.end_reads.load(Ordering::SeqCst),
            closes: self.closes.load(Ordering::SeqCst),
        }
    }
}

impl StorageProvider for ScriptedProvider {
    fn create_shared_group(
        &self,
        path: &Path,
        create_if_missing: bool,
    ) -> StorageResult<ConnectionHandle> {
        self.inner.create_shared_group(path, create_if_missing)
    }

    fn close_shared_group(&self, connection: ConnectionHandle) -> StorageResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(injected("close"));
        }
        self.inner.close_shared_group(connection)
    }

    fn has_table(&self, connection: ConnectionHandle, table: &str) -> StorageResult<bool> {
        self.inner.has_table(connection, table)
    }

    fn add_table(&self, connection: ConnectionHandle, table: &str) -> StorageResult<()> {
        self.add_tables.fetch_add(1, Ordering::SeqCst);
        self.inner.add_table(connection, table)
    }

    fn add_column_to_table(
        &self,
        connection: ConnectionHandle,
        table: &str,
        column: &str,
        column_type: ColumnType,
    ) -> StorageResult<()> {
        self.add_columns.fetch_add(1, Ordering::SeqCst);
        self.inner
            .add_column_to_table(connection, table, column, column_type)
    }

    fn add_empty_row(&self, connection: ConnectionHandle, table: &str) -> StorageResult<RowIndex> {
        self.add_rows.fetch_add(1, Ordering::SeqCst);
        self.inner.add_empty_row(connection, table)
    }

    fn start_transaction(
        &self,
        connection: ConnectionHandle,
        kind: TransactionKind,
    ) -> SnapshotHandle {
        if self.fail_start.load(Ordering::SeqCst) {
            return SnapshotHandle::invalid(connection, kind);
        }
        self.inner.start_transaction(connection, kind)
    }

    fn end_read(&self, connection: ConnectionHandle) -> StorageResult<()> {
        self.end_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_end_read.load(Ordering::SeqCst) {
            return Err(injected("end_read"));
        }
        self.inner.end_read(connection)
    }

    fn commit(&self, connection: ConnectionHandle) -> StorageResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(injected("commit"));
        }
        self.inner.commit(connection)
    }

    fn rollback(&self, connection: ConnectionHandle) -> StorageResult<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        if self.fail_rollback.load(Ordering::SeqCst) {
            return Err(injected("rollback"));
        }
        self.inner.rollback(connection)
    }

    fn transaction_state(&self, connection: ConnectionHandle) -> TransactionState {
        self.inner.transaction_state(connection)
    }

    fn columns(
        &self,
        connection: ConnectionHandle,
        table: &str,
    ) -> StorageResult<Vec<ColumnSpec>> {
        self.inner.columns(connection, table)
    }

    fn row_count(&self, connection: ConnectionHandle, table: &str) -> StorageResult<u64> {
        self.inner.row_count(connection, table)
    }

    fn get_value(
        &self,
        connection: ConnectionHandle,
        table: &str,
        column: &str,
        row: RowIndex,
    ) -> StorageResult<Value> {
        self.inner.get_value(connection, table, column, row)
    }

    fn set_value(
        &self,
        connection: ConnectionHandle,
        table: &str,
        column: &str,
        row: RowIndex,
        value: Value,
    ) -> StorageResult<()> {
        self.inner.set_value(connection, table, column, row, value)
    }
}

/// Routes `tracing` output to the test harness; safe to call repeatedly.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
