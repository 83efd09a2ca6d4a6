//! Managed records.

use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::schema::{ColumnValue, FieldDescriptor, ObjectSchema, RealmObject};
use embra_storage::{RowIndex, StorageError, Value};
use std::fmt;
use std::sync::Arc;

/// A record bound to one row of its type's table.
///
/// Persisted fields are read and written through the row with
/// [`Managed::get`] and [`Managed::set`]. Fields declared with
/// [`FieldDescriptor::ignore`] have no column; they live only in the local
/// instance returned by [`Managed::object`].
pub struct Managed<'db, T: RealmObject> {
    db: &'db Database,
    schema: Arc<ObjectSchema>,
    row: RowIndex,
    object: T,
}

impl<'db, T: RealmObject> Managed<'db, T> {
    pub(crate) fn new(
        db: &'db Database,
        schema: Arc<ObjectSchema>,
        row: RowIndex,
        object: T,
    ) -> Self {
        Self {
            db,
            schema,
            row,
            object,
        }
    }

    /// Returns the row this record is bound to.
    #[must_use]
    pub fn row(&self) -> RowIndex {
        self.row
    }

    /// Returns the name of the backing table.
    #[must_use]
    pub fn table_name(&self) -> &str {
        self.schema.table_name()
    }

    /// Returns the record type's schema.
    #[must_use]
    pub fn schema(&self) -> &ObjectSchema {
        &self.schema
    }

    /// Reads a persisted field from the row.
    ///
    /// # Errors
    ///
    /// `UnknownField` if `field` is undeclared or ignored, `Storage` if the
    /// row is not visible in the current view.
    pub fn get(&self, field: &str) -> CoreResult<Value> {
        let column = self.column(field)?;
        self.db
            .get_value(self.schema.table_name(), column.persisted_name(), self.row)
    }

    /// Reads a persisted field and converts it to `V`.
    ///
    /// # Errors
    ///
    /// As [`Managed::get`], plus `Storage` with a type mismatch if the stored
    /// value is not a `V`.
    pub fn get_as<V: ColumnValue>(&self, field: &str) -> CoreResult<V> {
        let value = self.get(field)?;
        let actual = value.column_type();
        V::from_value(value).ok_or_else(|| {
            CoreError::Storage(StorageError::TypeMismatch {
                column: field.to_string(),
                expected: V::COLUMN_TYPE,
                actual,
            })
        })
    }

    /// Writes a persisted field. Requires the write transaction that created
    /// or can see this row.
    ///
    /// # Errors
    ///
    /// `UnknownField` if `field` is undeclared or ignored, `Storage` if the
    /// provider rejects the write.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> CoreResult<()> {
        let column = self.column(field)?;
        self.db.set_value(
            self.schema.table_name(),
            column.persisted_name(),
            self.row,
            value.into(),
        )
    }

    /// Returns the local instance.
    #[must_use]
    pub fn object(&self) -> &T {
        &self.object
    }

    /// Returns the local instance mutably.
    pub fn object_mut(&mut self) -> &mut T {
        &mut self.object
    }

    /// Unbinds the record and returns the local instance.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.object
    }

    fn column(&self, field: &str) -> CoreResult<&FieldDescriptor> {
        self.schema
            .find_field(field)
            .filter(|f| !f.is_ignored())
            .ok_or_else(|| CoreError::unknown_field(self.schema.name(), field))
    }
}

impl<T: RealmObject> fmt::Debug for Managed<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Managed")
            .field("table", &self.schema.table_name())
            .field("row", &self.row)
            .finish_non_exhaustive()
    }
}
