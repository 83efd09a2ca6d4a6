//! Handles, column types and values exchanged with a storage provider.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to an open shared group (one connection to a database file).
///
/// Handles are issued by [`crate::StorageProvider::create_shared_group`] and
/// are never reused by the same provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    /// Creates a connection handle from a raw provider-assigned id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// The kind of transaction requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// A read-only, point-in-time snapshot.
    Read,
    /// An exclusive write session.
    Write,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Transaction state of a connection, as tracked by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionState {
    /// No transaction is open.
    #[default]
    None,
    /// A read snapshot is open.
    Read,
    /// A write session is open.
    Write,
}

impl From<TransactionKind> for TransactionState {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Read => Self::Read,
            TransactionKind::Write => Self::Write,
        }
    }
}

/// Handle to a transaction snapshot.
///
/// A provider signals a failed `start_transaction` by returning
/// [`SnapshotHandle::invalid`] instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotHandle {
    connection: ConnectionHandle,
    id: u64,
    kind: TransactionKind,
}

impl SnapshotHandle {
    const INVALID_ID: u64 = 0;

    /// Creates a snapshot handle. An `id` of zero is reserved for invalid handles.
    #[must_use]
    pub const fn new(connection: ConnectionHandle, id: u64, kind: TransactionKind) -> Self {
        Self {
            connection,
            id,
            kind,
        }
    }

    /// Returns the handle a provider hands out when a transaction could not start.
    #[must_use]
    pub const fn invalid(connection: ConnectionHandle, kind: TransactionKind) -> Self {
        Self::new(connection, Self::INVALID_ID, kind)
    }

    /// Checks whether the provider actually opened this snapshot.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.id != Self::INVALID_ID
    }

    /// Returns the connection the snapshot belongs to.
    #[must_use]
    pub const fn connection(&self) -> ConnectionHandle {
        self.connection
    }

    /// Returns the raw snapshot id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the snapshot kind.
    #[must_use]
    pub const fn kind(&self) -> TransactionKind {
        self.kind
    }
}

/// Index of a row inside a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowIndex(pub u64);

impl RowIndex {
    /// Creates a row index.
    #[must_use]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row:{}", self.0)
    }
}

/// The storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Double,
    /// UTF-8 string.
    String,
    /// Raw bytes.
    Binary,
}

impl ColumnType {
    /// Returns the value stored in fresh rows of a column of this type.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Double => Value::Double(0.0),
            Self::String => Value::String(String::new()),
            Self::Binary => Value::Binary(Vec::new()),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Double => "double",
            Self::String => "string",
            Self::Binary => "binary",
        };
        f.write_str(name)
    }
}

/// A column as stored in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Persisted column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
}

impl ColumnSpec {
    /// Creates a column spec.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Double(f64),
    /// String value.
    String(String),
    /// Byte string.
    Binary(Vec<u8>),
}

impl Value {
    /// Returns the column type this value can be stored in.
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Bool(_) => ColumnType::Bool,
            Self::Int(_) => ColumnType::Int,
            Self::Double(_) => ColumnType::Double,
            Self::String(_) => ColumnType::String,
            Self::Binary(_) => ColumnType::Binary,
        }
    }

    /// Returns the boolean payload, if any.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the integer payload, if any.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float payload, if any.
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the binary payload, if any.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_snapshot_is_not_valid() {
        let conn = ConnectionHandle::new(7);
        let snapshot = SnapshotHandle::invalid(conn, TransactionKind::Write);
        assert!(!snapshot.is_valid());
        assert_eq!(snapshot.connection(), conn);

        let snapshot = SnapshotHandle::new(conn, 3, TransactionKind::Read);
        assert!(snapshot.is_valid());
        assert_eq!(snapshot.kind(), TransactionKind::Read);
    }

    #[test]
    fn default_values_match_their_column_type() {
        for column_type in [
            ColumnType::Bool,
            ColumnType::Int,
            ColumnType::Double,
            ColumnType::String,
            ColumnType::Binary,
        ] {
            assert_eq!(column_type.default_value().column_type(), column_type);
        }
    }

    #[test]
    fn value_conversions() {
        assert_eq!(Value::from("ada").as_str(), Some("ada"));
        assert_eq!(Value::from(42i32).as_int(), Some(42));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(1.5).as_double(), Some(1.5));
        assert_eq!(Value::from(vec![1u8, 2]).as_bytes(), Some(&[1u8, 2][..]));
        assert!(Value::from(1i64).as_str().is_none());
    }

    #[test]
    fn state_from_kind() {
        assert_eq!(
            TransactionState::from(TransactionKind::Read),
            TransactionState::Read
        );
        assert_eq!(
            TransactionState::from(TransactionKind::Write),
            TransactionState::Write
        );
        assert_eq!(TransactionState::default(), TransactionState::None);
    }
}
