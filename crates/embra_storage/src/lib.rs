//! # Embra Storage
//!
//! The storage-provider contract consumed by embra, plus a reference
//! embedded provider.
//!
//! Embra's core never interprets files. It drives a [`StorageProvider`]
//! through a narrow set of atomic primitives:
//!
//! - open and close shared groups (one connection per database handle)
//! - create tables, columns and rows
//! - start, commit, roll back and end transactions
//!
//! ## Available Providers
//!
//! - [`EmbeddedProvider`] - in-memory or file-backed groups with snapshot
//!   isolation and a single writer slot per group
//!
//! ## Example
//!
//! ```rust
//! use embra_storage::{ColumnType, EmbeddedProvider, StorageProvider, TransactionKind};
//! use std::path::Path;
//!
//! let provider = EmbeddedProvider::in_memory();
//! let conn = provider.create_shared_group(Path::new("demo"), true).unwrap();
//!
//! provider.start_transaction(conn, TransactionKind::Write);
//! provider.add_table(conn, "Person").unwrap();
//! provider.add_column_to_table(conn, "Person", "name", ColumnType::String).unwrap();
//! let row = provider.add_empty_row(conn, "Person").unwrap();
//! provider.commit(conn).unwrap();
//!
//! assert_eq!(provider.row_count(conn, "Person").unwrap(), 1);
//! assert_eq!(row.as_u64(), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod embedded;
mod error;
mod file;
mod group;
mod provider;
mod types;

pub use embedded::{Durability, EmbeddedProvider};
pub use error::{StorageError, StorageResult};
pub use provider::StorageProvider;
pub use types::{
    ColumnSpec, ColumnType, ConnectionHandle, RowIndex, SnapshotHandle, TransactionKind,
    TransactionState, Value,
};
