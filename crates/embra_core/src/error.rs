//! Error types for embra core.

use embra_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in embra core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The database file could not be opened or created.
    #[error("cannot open database at {}: {source}", path.display())]
    EngineOpen {
        /// Path passed to `open`.
        path: PathBuf,
        /// Provider failure.
        #[source]
        source: StorageError,
    },

    /// The caller broke the transaction lifecycle. Nothing was changed.
    #[error("illegal state: {message}")]
    IllegalState {
        /// What was wrong.
        message: String,
    },

    /// The provider could not start a transaction. The database stays usable.
    #[error("engine I/O error: {message}")]
    EngineIo {
        /// What failed.
        message: String,
    },

    /// The provider failed while ending a transaction. The database is
    /// invalidated and every later call fails with [`CoreError::Disposed`].
    #[error("engine failure, database invalidated: {source}")]
    EngineFatal {
        /// Provider failure.
        #[source]
        source: StorageError,
    },

    /// The database was closed or invalidated.
    #[error("database has been closed or invalidated")]
    Disposed,

    /// A write was requested on a read-only database.
    #[error("database is read-only")]
    ReadOnly,

    /// A record type declared an unusable schema.
    #[error("invalid schema for {object}: {message}")]
    InvalidSchema {
        /// Record type name.
        object: String,
        /// What is wrong with it.
        message: String,
    },

    /// The field is not persisted by this record type.
    #[error("{object} has no persisted field named {field}")]
    UnknownField {
        /// Record type name.
        object: String,
        /// Requested field.
        field: String,
    },

    /// Any other provider error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CoreError {
    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates an engine I/O error.
    pub fn engine_io(message: impl Into<String>) -> Self {
        Self::EngineIo {
            message: message.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown field error.
    pub fn unknown_field(object: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            object: object.into(),
            field: field.into(),
        }
    }

    /// Checks whether the database survives this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::EngineOpen { .. } | Self::EngineFatal { .. } | Self::Disposed
        )
    }
}
