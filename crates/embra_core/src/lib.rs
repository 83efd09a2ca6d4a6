//! # Embra Core
//!
//! Transaction lifecycle and object mapping over an embedded store.
//!
//! Embra wraps a multi-reader, single-writer storage provider and exposes:
//!
//! - **Transactions**: read snapshots and one exclusive writer per file, with
//!   no nesting
//! - **Managed records**: typed records bound to table rows, with tables
//!   created lazily from a declared schema
//! - **Queries**: lazy, restartable views over every record of a type
//! - **Scoped resources**: connections and snapshots released exactly once
//!
//! ## Example
//!
//! ```rust
//! use embra_core::{Database, EmbeddedProvider, FieldDescriptor, ObjectSchema, RealmObject};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Book;
//!
//! impl RealmObject for Book {
//!     fn schema() -> ObjectSchema {
//!         ObjectSchema::new("Book")
//!             .with_generated_accessors()
//!             .field(FieldDescriptor::of::<String>("title"))
//!             .field(FieldDescriptor::of::<i64>("pages"))
//!     }
//! }
//!
//! let db = Database::open("library.embra", Arc::new(EmbeddedProvider::in_memory()))?;
//!
//! db.write(|_| {
//!     let book = db.create_object::<Book>()?;
//!     book.set("title", "Dune")?;
//!     book.set("pages", 412_i64)
//! })?;
//!
//! let pages = db.read(|_| {
//!     let book = db.all::<Book>()?.first()?;
//!     book.map(|b| b.get_as::<i64>("pages")).transpose()
//! })?;
//! assert_eq!(pages, Some(412));
//! # Ok::<(), embra_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod handle;
mod object;
mod query;
mod registrar;
mod schema;
mod transaction;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use handle::{NativeResource, ResourceHandle};
pub use object::Managed;
pub use query::{Query, QueryIter};
pub use registrar::SchemaRegistrar;
pub use schema::{ColumnValue, FieldDescriptor, ObjectSchema, RealmObject};
pub use transaction::Transaction;

// Re-export the storage types callers need
pub use embra_storage::{
    ColumnType, ConnectionHandle, Durability, EmbeddedProvider, RowIndex, SnapshotHandle,
    StorageError, StorageProvider, TransactionKind, TransactionState, Value,
};
