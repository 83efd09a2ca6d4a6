//! Error types for storage operations.

use crate::types::{ColumnType, ConnectionHandle};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The database file does not exist and creation was not requested.
    #[error("database file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Another provider already holds the database file.
    #[error("database locked: {} is held by another provider", .0.display())]
    Locked(PathBuf),

    /// The database file is corrupted or has an unknown format.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Encoding the group for persistence failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The connection handle is unknown or already closed.
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionHandle),

    /// A mutation was attempted outside a write transaction.
    #[error("not inside a write transaction")]
    NotInWriteTransaction,

    /// `end_read` was called without an open read transaction.
    #[error("not inside a read transaction")]
    NotInReadTransaction,

    /// The table does not exist.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The table already exists.
    #[error("table already exists: {0}")]
    TableExists(String),

    /// The column does not exist.
    #[error("column not found: {table}.{column}")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// The column already exists.
    #[error("column already exists: {table}.{column}")]
    ColumnExists {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// The row index is past the end of the table.
    #[error("row {row} out of range for table {table} with {len} rows")]
    RowOutOfRange {
        /// Table name.
        table: String,
        /// Requested row.
        row: u64,
        /// Number of rows in the table.
        len: u64,
    },

    /// The value does not match the column type.
    #[error("type mismatch on column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Column name.
        column: String,
        /// Declared column type.
        expected: ColumnType,
        /// Type of the supplied value.
        actual: ColumnType,
    },
}
