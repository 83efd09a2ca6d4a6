//! Embedded storage provider with snapshot isolation and a single writer slot.

use crate::error::{StorageError, StorageResult};
use crate::file::GroupFile;
use crate::group::Group;
use crate::provider::StorageProvider;
use crate::types::{
    ColumnSpec, ColumnType, ConnectionHandle, RowIndex, SnapshotHandle, TransactionKind,
    TransactionState, Value,
};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Where committed groups live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Groups live in memory for the provider's lifetime, keyed by path.
    Memory,
    /// Groups are loaded from and committed to a file at the path.
    File,
}

/// One database shared by every connection opened on its path.
#[derive(Debug)]
struct SharedGroup {
    committed: RwLock<Arc<Group>>,
    file: Option<GroupFile>,
    writer_busy: Mutex<bool>,
    writer_released: Condvar,
}

impl SharedGroup {
    fn new(group: Group, file: Option<GroupFile>) -> Self {
        Self {
            committed: RwLock::new(Arc::new(group)),
            file,
            writer_busy: Mutex::new(false),
            writer_released: Condvar::new(),
        }
    }

    fn latest(&self) -> Arc<Group> {
        Arc::clone(&self.committed.read())
    }

    /// Blocks until the writer slot is free, then takes it.
    fn acquire_writer(&self) {
        let mut busy = self.writer_busy.lock();
        while *busy {
            self.writer_released.wait(&mut busy);
        }
        *busy = true;
    }

    fn release_writer(&self) {
        *self.writer_busy.lock() = false;
        self.writer_released.notify_one();
    }

    fn publish(&self, group: Group) -> StorageResult<()> {
        if let Some(file) = &self.file {
            file.store(&group)?;
        }
        *self.committed.write() = Arc::new(group);
        Ok(())
    }
}

/// What a connection currently sees.
#[derive(Debug)]
enum View {
    Idle,
    Reading(Arc<Group>),
    Writing(Group),
}

impl View {
    fn state(&self) -> TransactionState {
        match self {
            Self::Idle => TransactionState::None,
            Self::Reading(_) => TransactionState::Read,
            Self::Writing(_) => TransactionState::Write,
        }
    }
}

#[derive(Debug)]
struct Connection {
    key: PathBuf,
    group: Arc<SharedGroup>,
    view: Mutex<View>,
}

/// A shared group and the number of connections open on it.
#[derive(Debug)]
struct OpenGroup {
    shared: Arc<SharedGroup>,
    connections: usize,
}

/// A [`StorageProvider`] that keeps tables in process memory.
///
/// Connections opened on the same path share one group:
/// - readers pin the committed group at `start_transaction` and never see
///   later commits
/// - the single writer edits a private copy that replaces the committed
///   group on commit
/// - `start_transaction(Write)` blocks while another connection writes
///
/// With [`Durability::File`] the group is loaded from disk on first open and
/// every commit rewrites the file before it becomes visible. The file stays
/// locked until its last connection closes; another provider opening it in
/// the meantime gets [`StorageError::Locked`]. File paths are canonicalized,
/// so different spellings of one file share a group.
///
/// # Example
///
/// ```rust
/// use embra_storage::{EmbeddedProvider, StorageProvider, TransactionKind};
/// use std::path::Path;
///
/// let provider = EmbeddedProvider::in_memory();
/// let conn = provider.create_shared_group(Path::new("people"), true).unwrap();
///
/// let snapshot = provider.start_transaction(conn, TransactionKind::Write);
/// assert!(snapshot.is_valid());
/// provider.add_table(conn, "Person").unwrap();
/// provider.commit(conn).unwrap();
///
/// assert!(provider.has_table(conn, "Person").unwrap());
/// ```
#[derive(Debug)]
pub struct EmbeddedProvider {
    durability: Durability,
    groups: Mutex<HashMap<PathBuf, OpenGroup>>,
    connections: RwLock<HashMap<ConnectionHandle, Arc<Connection>>>,
    next_connection: AtomicU64,
    next_snapshot: AtomicU64,
}

impl EmbeddedProvider {
    /// Creates a provider with the given durability.
    #[must_use]
    pub fn new(durability: Durability) -> Self {
        Self {
            durability,
            groups: Mutex::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            next_connection: AtomicU64::new(1),
            next_snapshot: AtomicU64::new(1),
        }
    }

    /// Creates a provider whose groups live in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Durability::Memory)
    }

    /// Creates a provider whose groups are persisted to files.
    #[must_use]
    pub fn file_backed() -> Self {
        Self::new(Durability::File)
    }

    /// Returns the provider's durability.
    #[must_use]
    pub fn durability(&self) -> Durability {
        self.durability
    }

    /// Returns the number of open connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    fn group_key(&self, path: &Path) -> StorageResult<PathBuf> {
        match self.durability {
            Durability::Memory => Ok(path.to_path_buf()),
            Durability::File => canonical_file_path(path),
        }
    }

    fn open_group(&self, key: &Path, create_if_missing: bool) -> StorageResult<Arc<SharedGroup>> {
        let mut groups = self.groups.lock();
        if let Some(open) = groups.get_mut(key) {
            open.connections += 1;
            return Ok(Arc::clone(&open.shared));
        }

        let shared = match self.durability {
            Durability::Memory => {
                if !create_if_missing {
                    return Err(StorageError::NotFound(key.to_path_buf()));
                }
                SharedGroup::new(Group::default(), None)
            }
            Durability::File => {
                let (file, group) = GroupFile::open(key, create_if_missing)?;
                SharedGroup::new(group, Some(file))
            }
        };
        let shared = Arc::new(shared);
        groups.insert(
            key.to_path_buf(),
            OpenGroup {
                shared: Arc::clone(&shared),
                connections: 1,
            },
        );
        Ok(shared)
    }

    /// Drops a connection's claim on its group. File groups are forgotten
    /// with their last connection, which releases the file lock.
    fn detach(&self, key: &Path) {
        let mut groups = self.groups.lock();
        let Some(open) = groups.get_mut(key) else {
            return;
        };
        open.connections = open.connections.saturating_sub(1);
        if open.connections == 0 && self.durability == Durability::File {
            groups.remove(key);
        }
    }

    fn connection(&self, handle: ConnectionHandle) -> StorageResult<Arc<Connection>> {
        self.connections
            .read()
            .get(&handle)
            .cloned()
            .ok_or(StorageError::UnknownConnection(handle))
    }

    fn read<T>(
        &self,
        handle: ConnectionHandle,
        f: impl FnOnce(&Group) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let conn = self.connection(handle)?;
        let view = conn.view.lock();
        match &*view {
            View::Idle => f(&conn.group.latest()),
            View::Reading(group) => f(group),
            View::Writing(group) => f(group),
        }
    }

    fn write<T>(
        &self,
        handle: ConnectionHandle,
        f: impl FnOnce(&mut Group) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let conn = self.connection(handle)?;
        let mut view = conn.view.lock();
        match &mut *view {
            View::Writing(group) => f(group),
            _ => Err(StorageError::NotInWriteTransaction),
        }
    }

    fn try_start(
        &self,
        handle: ConnectionHandle,
        kind: TransactionKind,
    ) -> StorageResult<SnapshotHandle> {
        let conn = self.connection(handle)?;
        if !matches!(*conn.view.lock(), View::Idle) {
            return Ok(SnapshotHandle::invalid(handle, kind));
        }

        let view = match kind {
            TransactionKind::Read => View::Reading(conn.group.latest()),
            TransactionKind::Write => {
                conn.group.acquire_writer();
                View::Writing(Group::clone(&conn.group.latest()))
            }
        };
        *conn.view.lock() = view;

        let id = self.next_snapshot.fetch_add(1, Ordering::SeqCst);
        Ok(SnapshotHandle::new(handle, id, kind))
    }
}

/// Resolves `path` to one spelling per file, whether or not it exists yet.
fn canonical_file_path(path: &Path) -> StorageResult<PathBuf> {
    if let Ok(canonical) = fs::canonicalize(path) {
        return Ok(canonical);
    }
    let absolute = std::path::absolute(path)?;
    let resolved = match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| absolute.clone()),
        _ => absolute.clone(),
    };
    Ok(resolved)
}

impl Default for EmbeddedProvider {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl StorageProvider for EmbeddedProvider {
    fn create_shared_group(
        &self,
        path: &Path,
        create_if_missing: bool,
    ) -> StorageResult<ConnectionHandle> {
        let key = self.group_key(path)?;
        let group = self.open_group(&key, create_if_missing)?;
        let handle =
            ConnectionHandle::new(self.next_connection.fetch_add(1, Ordering::SeqCst));
        let conn = Connection {
            key,
            group,
            view: Mutex::new(View::Idle),
        };
        self.connections.write().insert(handle, Arc::new(conn));
        Ok(handle)
    }

    fn close_shared_group(&self, connection: ConnectionHandle) -> StorageResult<()> {
        let conn = self
            .connections
            .write()
            .remove(&connection)
            .ok_or(StorageError::UnknownConnection(connection))?;
        let view = std::mem::replace(&mut *conn.view.lock(), View::Idle);
        if let View::Writing(_) = view {
            conn.group.release_writer();
        }
        self.detach(&conn.key);
        Ok(())
    }

    fn has_table(&self, connection: ConnectionHandle, table: &str) -> StorageResult<bool> {
        self.read(connection, |group| Ok(group.has_table(table)))
    }

    fn add_table(&self, connection: ConnectionHandle, table: &str) -> StorageResult<()> {
        self.write(connection, |group| group.add_table(table))
    }

    fn add_column_to_table(
        &self,
        connection: ConnectionHandle,
        table: &str,
        column: &str,
        column_type: ColumnType,
    ) -> StorageResult<()> {
        self.write(connection, |group| group.add_column(table, column, column_type))
    }

    fn add_empty_row(&self, connection: ConnectionHandle, table: &str) -> StorageResult<RowIndex> {
        self.write(connection, |group| group.add_empty_row(table))
    }

    fn start_transaction(
        &self,
        connection: ConnectionHandle,
        kind: TransactionKind,
    ) -> SnapshotHandle {
        self.try_start(connection, kind)
            .unwrap_or_else(|_| SnapshotHandle::invalid(connection, kind))
    }

    fn end_read(&self, connection: ConnectionHandle) -> StorageResult<()> {
        let conn = self.connection(connection)?;
        let mut view = conn.view.lock();
        match &*view {
            View::Reading(_) => {
                *view = View::Idle;
                Ok(())
            }
            _ => Err(StorageError::NotInReadTransaction),
        }
    }

    fn commit(&self, connection: ConnectionHandle) -> StorageResult<()> {
        let conn = self.connection(connection)?;
        let mut view = conn.view.lock();
        let group = match std::mem::replace(&mut *view, View::Idle) {
            View::Writing(group) => group,
            other => {
                *view = other;
                return Err(StorageError::NotInWriteTransaction);
            }
        };
        // The slot is released even when persisting fails; the session is gone.
        let result = conn.group.publish(group);
        conn.group.release_writer();
        result
    }

    fn rollback(&self, connection: ConnectionHandle) -> StorageResult<()> {
        let conn = self.connection(connection)?;
        let mut view = conn.view.lock();
        if !matches!(&*view, View::Writing(_)) {
            return Err(StorageError::NotInWriteTransaction);
        }
        *view = View::Idle;
        conn.group.release_writer();
        Ok(())
    }

    fn transaction_state(&self, connection: ConnectionHandle) -> TransactionState {
        self.connection(connection)
            .map(|conn| conn.view.lock().state())
            .unwrap_or_default()
    }

    fn columns(
        &self,
        connection: ConnectionHandle,
        table: &str,
    ) -> StorageResult<Vec<ColumnSpec>> {
        self.read(connection, |group| Ok(group.table(table)?.columns().to_vec()))
    }

    fn row_count(&self, connection: ConnectionHandle, table: &str) -> StorageResult<u64> {
        self.read(connection, |group| Ok(group.table(table)?.row_count()))
    }

    fn get_value(
        &self,
        connection: ConnectionHandle,
        table: &str,
        column: &str,
        row: RowIndex,
    ) -> StorageResult<Value> {
        self.read(connection, |group| group.get_value(table, column, row))
    }

    fn set_value(
        &self,
        connection: ConnectionHandle,
        table: &str,
        column: &str,
        row: RowIndex,
        value: Value,
    ) -> StorageResult<()> {
        self.write(connection, |group| group.set_value(table, column, row, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tempfile::tempdir;

    fn open(provider: &EmbeddedProvider) -> ConnectionHandle {
        provider
            .create_shared_group(Path::new("test.embra"), true)
            .unwrap()
    }

    fn add_person(provider: &EmbeddedProvider, conn: ConnectionHandle) {
        if !provider.has_table(conn, "Person").unwrap() {
            provider.add_table(conn, "Person").unwrap();
            provider
                .add_column_to_table(conn, "Person", "name", ColumnType::String)
                .unwrap();
        }
        provider.add_empty_row(conn, "Person").unwrap();
    }

    #[test]
    fn start_and_end_read() {
        let provider = EmbeddedProvider::in_memory();
        let conn = open(&provider);

        let snapshot = provider.start_transaction(conn, TransactionKind::Read);
        assert!(snapshot.is_valid());
        assert_eq!(provider.transaction_state(conn), TransactionState::Read);

        provider.end_read(conn).unwrap();
        assert_eq!(provider.transaction_state(conn), TransactionState::None);
    }

    #[test]
    fn second_start_returns_invalid_handle() {
        let provider = EmbeddedProvider::in_memory();
        let conn = open(&provider);

        assert!(provider
            .start_transaction(conn, TransactionKind::Read)
            .is_valid());
        let again = provider.start_transaction(conn, TransactionKind::Write);
        assert!(!again.is_valid());
        assert_eq!(provider.transaction_state(conn), TransactionState::Read);
    }

    #[test]
    fn unknown_connection_returns_invalid_handle() {
        let provider = EmbeddedProvider::in_memory();
        let bogus = ConnectionHandle::new(99);
        assert!(!provider
            .start_transaction(bogus, TransactionKind::Read)
            .is_valid());
        assert_eq!(provider.transaction_state(bogus), TransactionState::None);
    }

    #[test]
    fn mutations_require_write_transaction() {
        let provider = EmbeddedProvider::in_memory();
        let conn = open(&provider);
        assert!(matches!(
            provider.add_table(conn, "Person"),
            Err(StorageError::NotInWriteTransaction)
        ));

        provider.start_transaction(conn, TransactionKind::Read);
        assert!(matches!(
            provider.add_table(conn, "Person"),
            Err(StorageError::NotInWriteTransaction)
        ));
    }

    #[test]
    fn rollback_discards_schema_and_rows() {
        let provider = EmbeddedProvider::in_memory();
        let conn = open(&provider);

        provider.start_transaction(conn, TransactionKind::Write);
        add_person(&provider, conn);
        assert!(provider.has_table(conn, "Person").unwrap());
        provider.rollback(conn).unwrap();

        assert!(!provider.has_table(conn, "Person").unwrap());
    }

    #[test]
    fn read_snapshot_ignores_later_commits() {
        let provider = EmbeddedProvider::in_memory();
        let writer = open(&provider);
        let reader = open(&provider);

        provider.start_transaction(writer, TransactionKind::Write);
        add_person(&provider, writer);
        provider.commit(writer).unwrap();

        provider.start_transaction(reader, TransactionKind::Read);

        provider.start_transaction(writer, TransactionKind::Write);
        add_person(&provider, writer);
        provider.commit(writer).unwrap();

        assert_eq!(provider.row_count(reader, "Person").unwrap(), 1);
        provider.end_read(reader).unwrap();
        assert_eq!(provider.row_count(reader, "Person").unwrap(), 2);
    }

    #[test]
    fn commit_and_rollback_need_a_writer() {
        let provider = EmbeddedProvider::in_memory();
        let conn = open(&provider);
        assert!(matches!(
            provider.commit(conn),
            Err(StorageError::NotInWriteTransaction)
        ));
        assert!(matches!(
            provider.rollback(conn),
            Err(StorageError::NotInWriteTransaction)
        ));
        assert!(matches!(
            provider.end_read(conn),
            Err(StorageError::NotInReadTransaction)
        ));
    }

    #[test]
    fn writer_blocks_until_slot_is_released() {
        let provider = Arc::new(EmbeddedProvider::in_memory());
        let first = open(&provider);
        let second = open(&provider);

        provider.start_transaction(first, TransactionKind::Write);
        let second_started = AtomicBool::new(false);

        std::thread::scope(|s| {
            s.spawn(|| {
                let snapshot = provider.start_transaction(second, TransactionKind::Write);
                assert!(snapshot.is_valid());
                second_started.store(true, Ordering::SeqCst);
                provider.rollback(second).unwrap();
            });

            std::thread::sleep(Duration::from_millis(50));
            assert!(!second_started.load(Ordering::SeqCst));
            provider.commit(first).unwrap();
        });

        assert!(second_started.load(Ordering::SeqCst));
    }

    #[test]
    fn closing_a_writer_frees_the_slot() {
        let provider = EmbeddedProvider::in_memory();
        let first = open(&provider);
        let second = open(&provider);

        provider.start_transaction(first, TransactionKind::Write);
        provider.close_shared_group(first).unwrap();

        // Would block forever if the slot leaked.
        assert!(provider
            .start_transaction(second, TransactionKind::Write)
            .is_valid());
        assert_eq!(provider.connection_count(), 1);
    }

    #[test]
    fn close_unknown_connection_fails() {
        let provider = EmbeddedProvider::in_memory();
        let conn = open(&provider);
        provider.close_shared_group(conn).unwrap();
        assert!(matches!(
            provider.close_shared_group(conn),
            Err(StorageError::UnknownConnection(_))
        ));
    }

    #[test]
    fn memory_group_requires_create() {
        let provider = EmbeddedProvider::in_memory();
        let result = provider.create_shared_group(Path::new("missing"), false);
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn file_backed_commits_survive_a_new_provider() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("people.embra");

        {
            let provider = EmbeddedProvider::file_backed();
            let conn = provider.create_shared_group(&path, true).unwrap();
            provider.start_transaction(conn, TransactionKind::Write);
            add_person(&provider, conn);
            provider
                .set_value(conn, "Person", "name", RowIndex::new(0), Value::from("Ada"))
                .unwrap();
            provider.commit(conn).unwrap();

            provider.start_transaction(conn, TransactionKind::Write);
            add_person(&provider, conn);
            provider.rollback(conn).unwrap();
            provider.close_shared_group(conn).unwrap();
        }

        let provider = EmbeddedProvider::file_backed();
        let conn = provider.create_shared_group(&path, false).unwrap();
        assert_eq!(provider.row_count(conn, "Person").unwrap(), 1);
        assert_eq!(
            provider
                .get_value(conn, "Person", "name", RowIndex::new(0))
                .unwrap(),
            Value::from("Ada")
        );
        assert_eq!(
            provider.columns(conn, "Person").unwrap(),
            vec![ColumnSpec::new("name", ColumnType::String)]
        );
    }

    #[test]
    fn second_file_provider_is_locked_out() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("shared.embra");

        let first = EmbeddedProvider::file_backed();
        let conn = first.create_shared_group(&path, true).unwrap();

        let second = EmbeddedProvider::file_backed();
        assert!(matches!(
            second.create_shared_group(&path, true),
            Err(StorageError::Locked(_))
        ));

        // Released with the last connection.
        first.close_shared_group(conn).unwrap();
        let conn = second.create_shared_group(&path, false).unwrap();
        assert_eq!(second.transaction_state(conn), TransactionState::None);
    }

    #[test]
    fn path_spellings_share_one_file_group() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("people.embra");
        let dotted = temp.path().join(".").join("people.embra");

        let provider = EmbeddedProvider::file_backed();
        let a = provider.create_shared_group(&path, true).unwrap();
        let b = provider.create_shared_group(&dotted, true).unwrap();

        provider.start_transaction(a, TransactionKind::Write);
        add_person(&provider, a);

        // `b` shares the writer slot, so its write start waits for `a`.
        let b_started = AtomicBool::new(false);
        std::thread::scope(|s| {
            s.spawn(|| {
                provider.start_transaction(b, TransactionKind::Write);
                b_started.store(true, Ordering::SeqCst);
                add_person(&provider, b);
                provider.commit(b).unwrap();
            });
            std::thread::sleep(Duration::from_millis(50));
            assert!(!b_started.load(Ordering::SeqCst));
            provider.commit(a).unwrap();
        });

        provider.close_shared_group(a).unwrap();
        provider.close_shared_group(b).unwrap();

        let reopened = EmbeddedProvider::file_backed();
        let conn = reopened.create_shared_group(&path, false).unwrap();
        assert_eq!(reopened.row_count(conn, "Person").unwrap(), 2);
    }
}
