//! Lazy queries over a record type's table.

use crate::database::Database;
use crate::error::CoreResult;
use crate::object::Managed;
use crate::schema::{ObjectSchema, RealmObject};
use embra_storage::RowIndex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Every record of type `T`.
///
/// A query holds no rows. Counting or iterating reads the connection's
/// current view, so the same query observes later commits once a new
/// transaction starts.
pub struct Query<'db, T: RealmObject> {
    db: &'db Database,
    schema: Arc<ObjectSchema>,
    _marker: PhantomData<fn() -> T>,
}

impl<'db, T: RealmObject> Query<'db, T> {
    pub(crate) fn new(db: &'db Database, schema: Arc<ObjectSchema>) -> Self {
        Self {
            db,
            schema,
            _marker: PhantomData,
        }
    }

    /// Counts the records. A table that was never materialized counts zero.
    pub fn count(&self) -> CoreResult<u64> {
        self.db.row_count(self.schema.table_name())
    }

    /// Checks whether there are no records.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.count()? == 0)
    }

    /// Returns the record at `row`, or `None` past the end.
    pub fn get(&self, row: u64) -> CoreResult<Option<Managed<'db, T>>> {
        if row >= self.count()? {
            return Ok(None);
        }
        Ok(Some(self.bind(RowIndex(row))))
    }

    /// Returns the first record, if any.
    pub fn first(&self) -> CoreResult<Option<Managed<'db, T>>> {
        self.get(0)
    }

    /// Iterates the records in row order.
    ///
    /// The row count is read once, when the iterator is created.
    pub fn iter(&self) -> CoreResult<QueryIter<'db, T>> {
        Ok(QueryIter {
            db: self.db,
            schema: Arc::clone(&self.schema),
            next: 0,
            len: self.count()?,
            _marker: PhantomData,
        })
    }

    fn bind(&self, row: RowIndex) -> Managed<'db, T> {
        Managed::new(self.db, Arc::clone(&self.schema), row, T::default())
    }
}

impl<T: RealmObject> fmt::Debug for Query<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("table", &self.schema.table_name())
            .finish_non_exhaustive()
    }
}

/// Iterator over the records of a [`Query`].
pub struct QueryIter<'db, T: RealmObject> {
    db: &'db Database,
    schema: Arc<ObjectSchema>,
    next: u64,
    len: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<'db, T: RealmObject> Iterator for QueryIter<'db, T> {
    type Item = Managed<'db, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let row = RowIndex(self.next);
        self.next += 1;
        Some(Managed::new(
            self.db,
            Arc::clone(&self.schema),
            row,
            T::default(),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.len - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl<T: RealmObject> ExactSizeIterator for QueryIter<'_, T> {}

impl<T: RealmObject> fmt::Debug for QueryIter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryIter")
            .field("table", &self.schema.table_name())
            .field("next", &self.next)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}
