//! Lazy schema materialization.

use crate::error::{CoreError, CoreResult};
use crate::schema::{ObjectSchema, RealmObject};
use embra_storage::{ConnectionHandle, StorageProvider};
use parking_lot::Mutex;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Derives record schemas once per type and creates their tables on demand.
///
/// Materialization is idempotent against the live engine: the registrar asks
/// the provider whether the table exists every time instead of remembering,
/// so a table created in a rolled-back write is simply created again.
#[derive(Debug)]
pub struct SchemaRegistrar {
    schemas: Mutex<HashMap<TypeId, Arc<ObjectSchema>>>,
    warn_on_missing_accessors: bool,
}

impl SchemaRegistrar {
    /// Creates an empty registrar.
    #[must_use]
    pub fn new(warn_on_missing_accessors: bool) -> Self {
        Self {
            schemas: Mutex::new(HashMap::new()),
            warn_on_missing_accessors,
        }
    }

    /// Returns the validated schema of `T`, deriving it on first use.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` if the descriptor has no name or two fields
    /// persist under the same column name.
    pub fn schema_for<T: RealmObject>(&self) -> CoreResult<Arc<ObjectSchema>> {
        let mut schemas = self.schemas.lock();
        if let Some(schema) = schemas.get(&TypeId::of::<T>()) {
            return Ok(Arc::clone(schema));
        }
        let schema = T::schema();
        validate(&schema)?;
        let schema = Arc::new(schema);
        schemas.insert(TypeId::of::<T>(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Returns the number of record types derived so far.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.schemas.lock().len()
    }

    /// Creates the table and columns for `schema` unless the table exists.
    ///
    /// Returns `true` if the table was created. The connection must be inside
    /// a write transaction for creation to succeed.
    pub fn materialize(
        &self,
        provider: &dyn StorageProvider,
        connection: ConnectionHandle,
        schema: &ObjectSchema,
    ) -> CoreResult<bool> {
        let table = schema.table_name();
        if provider.has_table(connection, table)? {
            return Ok(false);
        }

        if self.warn_on_missing_accessors && !schema.has_generated_accessors() {
            tracing::warn!(
                object = schema.name(),
                "record type has no generated accessors; field access will not go through row storage"
            );
        }

        provider.add_table(connection, table)?;
        for field in schema.persisted_fields() {
            provider.add_column_to_table(
                connection,
                table,
                field.persisted_name(),
                field.column_type(),
            )?;
        }
        tracing::debug!(
            table,
            columns = schema.persisted_fields().count(),
            "materialized table"
        );
        Ok(true)
    }
}

fn validate(schema: &ObjectSchema) -> CoreResult<()> {
    if schema.name().is_empty() {
        return Err(CoreError::invalid_schema("<unnamed>", "type name is empty"));
    }
    let mut seen = HashSet::new();
    for field in schema.persisted_fields() {
        let column = field.persisted_name();
        if column.is_empty() {
            return Err(CoreError::invalid_schema(
                schema.name(),
                format!("field {} persists under an empty name", field.name()),
            ));
        }
        if !seen.insert(column) {
            return Err(CoreError::invalid_schema(
                schema.name(),
                format!("column {column} is declared twice"),
            ));
        }
    }
    Ok(())
}
