//! Database facade.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::handle::ResourceHandle;
use crate::object::Managed;
use crate::query::Query;
use crate::registrar::SchemaRegistrar;
use crate::schema::RealmObject;
use crate::transaction::Transaction;
use embra_storage::{
    ConnectionHandle, RowIndex, SnapshotHandle, StorageProvider, TransactionKind,
    TransactionState, Value,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Provider resources owned by a database.
///
/// Field order is drop order: the snapshot goes back before its connection.
#[derive(Debug, Default)]
struct Handles {
    active: Option<ResourceHandle<SnapshotHandle>>,
    connection: Option<ResourceHandle<ConnectionHandle>>,
    /// A begin call is waiting on the provider with the lock released.
    starting: bool,
}

impl Handles {
    fn connection(&self) -> CoreResult<ConnectionHandle> {
        self.connection
            .as_ref()
            .and_then(ResourceHandle::get)
            .ok_or(CoreError::Disposed)
    }

    fn active_snapshot(&self) -> Option<SnapshotHandle> {
        self.active.as_ref().and_then(ResourceHandle::get)
    }

    /// Releases everything; the database is dead afterwards.
    fn invalidate(&mut self) {
        self.active = None;
        self.connection = None;
    }
}

/// The main database handle.
///
/// `Database` is the entry point for working with embra. It provides:
/// - Read snapshots and exclusive write sessions (one at a time)
/// - Managed record creation with lazy table materialization
/// - Typed queries over a record type's table
///
/// # Opening a Database
///
/// The storage provider is passed in explicitly:
///
/// ```rust
/// use embra_core::{Database, EmbeddedProvider, FieldDescriptor, ObjectSchema, RealmObject};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Person;
///
/// impl RealmObject for Person {
///     fn schema() -> ObjectSchema {
///         ObjectSchema::new("Person")
///             .with_generated_accessors()
///             .field(FieldDescriptor::of::<String>("name"))
///     }
/// }
///
/// let db = Database::open("people.embra", Arc::new(EmbeddedProvider::in_memory()))?;
///
/// let txn = db.begin_write()?;
/// let person = db.create_object::<Person>()?;
/// person.set("name", "Ada")?;
/// txn.commit()?;
///
/// let txn = db.begin_read()?;
/// assert_eq!(db.all::<Person>()?.count()?, 1);
/// txn.commit()?;
/// # Ok::<(), embra_core::CoreError>(())
/// ```
///
/// # Failure
///
/// If the provider fails while a transaction ends, the database invalidates
/// itself: the open snapshot and the connection are released and every later
/// call returns [`CoreError::Disposed`].
pub struct Database {
    path: PathBuf,
    config: Config,
    provider: Arc<dyn StorageProvider>,
    registrar: SchemaRegistrar,
    handles: Mutex<Handles>,
}

impl Database {
    /// Opens or creates the database at `path` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `EngineOpen` if the provider cannot open the file.
    pub fn open(path: impl AsRef<Path>, provider: Arc<dyn StorageProvider>) -> CoreResult<Self> {
        Self::open_with_config(path, provider, Config::default())
    }

    /// Opens or creates the database at `path` with a custom configuration.
    ///
    /// Several databases may be open on the same path at once; they share the
    /// provider's group and see each other's commits.
    ///
    /// # Errors
    ///
    /// Returns `EngineOpen` if the file is missing (and `create_if_missing`
    /// is false), inaccessible or corrupt.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        provider: Arc<dyn StorageProvider>,
        config: Config,
    ) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let connection = provider
            .create_shared_group(&path, config.create_if_missing)
            .map_err(|source| CoreError::EngineOpen {
                path: path.clone(),
                source,
            })?;
        let connection = ResourceHandle::new(Arc::clone(&provider), connection);
        tracing::debug!(path = %path.display(), ?connection, "opened database");

        Ok(Self {
            registrar: SchemaRegistrar::new(config.warn_on_missing_accessors),
            path,
            config,
            provider,
            handles: Mutex::new(Handles {
                active: None,
                connection: Some(connection),
                starting: false,
            }),
        })
    }

    /// Returns the path the database was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the schema registrar.
    #[must_use]
    pub fn registrar(&self) -> &SchemaRegistrar {
        &self.registrar
    }

    /// Checks whether the database is still usable.
    ///
    /// Starts out true and only ever turns false: on close, drop, or an
    /// engine failure while ending a transaction.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.handles.lock().connection().is_ok()
    }

    /// Returns the connection's transaction state; `None` once invalid.
    #[must_use]
    pub fn transaction_state(&self) -> TransactionState {
        match self.handles.lock().connection() {
            Ok(connection) => self.provider.transaction_state(connection),
            Err(_) => TransactionState::None,
        }
    }

    /// Checks whether a transaction is open; false once invalid.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction_state() != TransactionState::None
    }

    /// Starts a read transaction on a stable snapshot. Never waits on writers.
    ///
    /// # Errors
    ///
    /// `IllegalState` if a transaction is already open, `EngineIo` if the
    /// provider could not start one, `Disposed` if the database is invalid.
    pub fn begin_read(&self) -> CoreResult<Transaction<'_>> {
        self.begin(TransactionKind::Read)
    }

    /// Starts a write transaction.
    ///
    /// Blocks until the group's writer slot is free; there is no timeout.
    ///
    /// # Errors
    ///
    /// Same as [`Database::begin_read`], plus `ReadOnly` for read-only
    /// databases.
    pub fn begin_write(&self) -> CoreResult<Transaction<'_>> {
        self.begin(TransactionKind::Write)
    }

    fn begin(&self, kind: TransactionKind) -> CoreResult<Transaction<'_>> {
        let connection = {
            let mut handles = self.handles.lock();
            let connection = handles.connection()?;
            if handles.starting
                || handles.active.is_some()
                || self.provider.transaction_state(connection) != TransactionState::None
            {
                return Err(CoreError::illegal_state("already inside a transaction"));
            }
            if kind == TransactionKind::Write && self.config.read_only {
                return Err(CoreError::ReadOnly);
            }
            handles.starting = true;
            connection
        };

        // May block on the writer slot; the handles stay readable meanwhile.
        let snapshot = self.provider.start_transaction(connection, kind);
        let handle = ResourceHandle::new(Arc::clone(&self.provider), snapshot);

        let mut handles = self.handles.lock();
        handles.starting = false;
        if !handle.is_open() {
            return Err(CoreError::engine_io(format!(
                "provider could not start a {kind} transaction on {connection}"
            )));
        }
        handles.connection()?;
        handles.active = Some(handle);
        tracing::debug!(%kind, snapshot = snapshot.id(), "began transaction");

        Ok(Transaction::new(self, snapshot))
    }

    /// Ends the open transaction.
    ///
    /// A read transaction is released whatever `commit` says. A write
    /// transaction is committed when `commit` is true and rolled back
    /// otherwise.
    ///
    /// # Errors
    ///
    /// `IllegalState` if no transaction is open. `EngineFatal` if the
    /// provider fails; the database is invalidated before returning.
    pub fn end_transaction(&self, commit: bool) -> CoreResult<()> {
        self.end(None, commit)
    }

    /// Ends the transaction only if `snapshot` is still the active one.
    pub(crate) fn end_snapshot(&self, snapshot: SnapshotHandle, commit: bool) -> CoreResult<()> {
        self.end(Some(snapshot), commit)
    }

    pub(crate) fn owns_snapshot(&self, snapshot: SnapshotHandle) -> bool {
        self.handles.lock().active_snapshot() == Some(snapshot)
    }

    fn end(&self, expected: Option<SnapshotHandle>, commit: bool) -> CoreResult<()> {
        let mut handles = self.handles.lock();
        let connection = handles.connection()?;

        let active = handles.active_snapshot();
        let snapshot = match (active, expected) {
            (None, None) => return Err(CoreError::illegal_state("not inside a transaction")),
            (Some(active), Some(expected)) if active != expected => {
                return Err(CoreError::illegal_state("transaction already ended"))
            }
            (None, Some(_)) => return Err(CoreError::illegal_state("transaction already ended")),
            (Some(active), _) => active,
        };
        if let Some(mut handle) = handles.active.take() {
            handle.disarm();
        }

        let result = match (snapshot.kind(), commit) {
            (TransactionKind::Read, _) => self.provider.end_read(connection),
            (TransactionKind::Write, true) => self.provider.commit(connection),
            (TransactionKind::Write, false) => self.provider.rollback(connection),
        };

        match result {
            Ok(()) => {
                tracing::debug!(
                    kind = %snapshot.kind(),
                    snapshot = snapshot.id(),
                    commit,
                    "ended transaction"
                );
                Ok(())
            }
            Err(source) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %source,
                    "engine failed while ending a transaction; invalidating database"
                );
                handles.invalidate();
                Err(CoreError::EngineFatal { source })
            }
        }
    }

    /// Creates a managed record of type `T` bound to a new row.
    ///
    /// The table for `T` is materialized first if it does not exist yet.
    ///
    /// # Errors
    ///
    /// `IllegalState` outside a write transaction, `InvalidSchema` for a bad
    /// descriptor, `Storage` if the provider rejects the row.
    pub fn create_object<T: RealmObject>(&self) -> CoreResult<Managed<'_, T>> {
        let connection = self.connection()?;
        if self.provider.transaction_state(connection) != TransactionState::Write {
            return Err(CoreError::illegal_state(
                "creating objects requires an active write transaction",
            ));
        }

        let schema = self.registrar.schema_for::<T>()?;
        self.registrar
            .materialize(&*self.provider, connection, &schema)?;
        let row = self
            .provider
            .add_empty_row(connection, schema.table_name())?;
        tracing::trace!(table = schema.table_name(), %row, "created object");

        Ok(Managed::new(self, schema, row, T::default()))
    }

    /// Returns a lazy query over every record of type `T`.
    ///
    /// Nothing is read until the query is counted or iterated, and each
    /// iteration sees the connection's view at that moment.
    ///
    /// # Errors
    ///
    /// `Disposed` if the database is invalid, `InvalidSchema` for a bad
    /// descriptor.
    pub fn all<T: RealmObject>(&self) -> CoreResult<Query<'_, T>> {
        self.connection()?;
        let schema = self.registrar.schema_for::<T>()?;
        Ok(Query::new(self, schema))
    }

    /// Runs `f` in a write transaction: committed on `Ok`, rolled back on `Err`.
    ///
    /// The closure's error is returned even when the rollback fails too; the
    /// rollback failure is logged and leaves the database invalid.
    pub fn write<F, R>(&self, f: F) -> CoreResult<R>
    where
        F: FnOnce(&Transaction<'_>) -> CoreResult<R>,
    {
        let txn = self.begin_write()?;
        match f(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = txn.rollback() {
                    tracing::error!(
                        error = %rollback,
                        "rollback after a failed write closure also failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Runs `f` in a read transaction.
    pub fn read<F, R>(&self, f: F) -> CoreResult<R>
    where
        F: FnOnce(&Transaction<'_>) -> CoreResult<R>,
    {
        let txn = self.begin_read()?;
        let result = f(&txn);
        txn.commit()?;
        result
    }

    /// Closes the database, surfacing release errors instead of logging them.
    ///
    /// Closing an invalidated database succeeds.
    pub fn close(self) -> CoreResult<()> {
        let mut handles = self.handles.lock();
        let snapshot = handles.active.as_mut().map_or(Ok(()), ResourceHandle::close);
        let connection = handles
            .connection
            .as_mut()
            .map_or(Ok(()), ResourceHandle::close);
        handles.invalidate();
        tracing::debug!(path = %self.path.display(), "closed database");
        snapshot?;
        connection?;
        Ok(())
    }

    pub(crate) fn connection(&self) -> CoreResult<ConnectionHandle> {
        self.handles.lock().connection()
    }

    pub(crate) fn row_count(&self, table: &str) -> CoreResult<u64> {
        let connection = self.connection()?;
        if !self.provider.has_table(connection, table)? {
            return Ok(0);
        }
        Ok(self.provider.row_count(connection, table)?)
    }

    pub(crate) fn get_value(&self, table: &str, column: &str, row: RowIndex) -> CoreResult<Value> {
        let connection = self.connection()?;
        Ok(self.provider.get_value(connection, table, column, row)?)
    }

    pub(crate) fn set_value(
        &self,
        table: &str,
        column: &str,
        row: RowIndex,
        value: Value,
    ) -> CoreResult<()> {
        let connection = self.connection()?;
        Ok(self
            .provider
            .set_value(connection, table, column, row, value)?)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("is_valid", &self.is_valid())
            .field("transaction_state", &self.transaction_state())
            .finish_non_exhaustive()
    }
}
