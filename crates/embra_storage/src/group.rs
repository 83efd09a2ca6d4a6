//! Tables and the group that holds them.

use crate::error::{StorageError, StorageResult};
use crate::types::{ColumnSpec, ColumnType, RowIndex, Value};
use serde::{Deserialize, Serialize};

/// A table: ordered columns plus rows stored column-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Table {
    name: String,
    columns: Vec<ColumnSpec>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub(crate) fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub(crate) fn row_count(&self) -> u64 {
        self.rows.len() as u64
    }

    fn column_position(&self, column: &str) -> StorageResult<usize> {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| StorageError::ColumnNotFound {
                table: self.name.clone(),
                column: column.to_owned(),
            })
    }

    fn row_position(&self, row: RowIndex) -> StorageResult<usize> {
        let len = self.row_count();
        if row.as_u64() >= len {
            return Err(StorageError::RowOutOfRange {
                table: self.name.clone(),
                row: row.as_u64(),
                len,
            });
        }
        Ok(row.as_u64() as usize)
    }

    fn add_column(&mut self, column: &str, column_type: ColumnType) -> StorageResult<()> {
        if self.columns.iter().any(|c| c.name == column) {
            return Err(StorageError::ColumnExists {
                table: self.name.clone(),
                column: column.to_owned(),
            });
        }
        self.columns.push(ColumnSpec::new(column, column_type));
        for row in &mut self.rows {
            row.push(column_type.default_value());
        }
        Ok(())
    }

    fn add_empty_row(&mut self) -> RowIndex {
        let row = self
            .columns
            .iter()
            .map(|c| c.column_type.default_value())
            .collect();
        self.rows.push(row);
        RowIndex::new(self.rows.len() as u64 - 1)
    }

    fn get(&self, column: &str, row: RowIndex) -> StorageResult<Value> {
        let col = self.column_position(column)?;
        let row = self.row_position(row)?;
        Ok(self.rows[row][col].clone())
    }

    fn set(&mut self, column: &str, row: RowIndex, value: Value) -> StorageResult<()> {
        let col = self.column_position(column)?;
        let row = self.row_position(row)?;
        let expected = self.columns[col].column_type;
        if value.column_type() != expected {
            return Err(StorageError::TypeMismatch {
                column: column.to_owned(),
                expected,
                actual: value.column_type(),
            });
        }
        self.rows[row][col] = value;
        Ok(())
    }
}

/// All tables of one database, in creation order.
///
/// A committed group is immutable and shared by readers behind an `Arc`;
/// a writer mutates a private clone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Group {
    tables: Vec<Table>,
}

impl Group {
    pub(crate) fn has_table(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name)
    }

    pub(crate) fn table(&self, name: &str) -> StorageResult<&Table> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_owned()))
    }

    fn table_mut(&mut self, name: &str) -> StorageResult<&mut Table> {
        self.tables
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_owned()))
    }

    pub(crate) fn add_table(&mut self, name: &str) -> StorageResult<()> {
        if self.has_table(name) {
            return Err(StorageError::TableExists(name.to_owned()));
        }
        self.tables.push(Table::new(name));
        Ok(())
    }

    pub(crate) fn add_column(
        &mut self,
        table: &str,
        column: &str,
        column_type: ColumnType,
    ) -> StorageResult<()> {
        self.table_mut(table)?.add_column(column, column_type)
    }

    pub(crate) fn add_empty_row(&mut self, table: &str) -> StorageResult<RowIndex> {
        Ok(self.table_mut(table)?.add_empty_row())
    }

    pub(crate) fn get_value(&self, table: &str, column: &str, row: RowIndex) -> StorageResult<Value> {
        self.table(table)?.get(column, row)
    }

    pub(crate) fn set_value(
        &mut self,
        table: &str,
        column: &str,
        row: RowIndex,
        value: Value,
    ) -> StorageResult<()> {
        self.table_mut(table)?.set(column, row, value)
    }
}
