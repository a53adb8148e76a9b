use crate::core::{Column, DbError, Result, Row, Schema, Value};
use serde::{Deserialize, Serialize};

/// A table's schema plus its rows, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    schema: TableSchema,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Validates and widens `row` against the schema, then appends it.
    pub fn insert(&mut self, row: Row) -> Result<()> {
        let row = self.prepare_row(row)?;
        self.rows.push(row);
        Ok(())
    }

    /// Replaces the rows at `updates` positions. Either every replacement
    /// validates and all are applied, or none are.
    pub fn update(&mut self, updates: Vec<(usize, Row)>) -> Result<usize> {
        let prepared = updates
            .into_iter()
            .map(|(idx, row)| {
                if idx >= self.rows.len() {
                    return Err(DbError::ExecutionError(format!("Row {} out of range", idx)));
                }
                Ok((idx, self.prepare_row(row)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let count = prepared.len();
        for (idx, row) in prepared {
            self.rows[idx] = row;
        }
        Ok(count)
    }

    /// Keeps only the rows for which `keep` is true at the same position.
    pub fn retain_by_mask(&mut self, keep: &[bool]) -> usize {
        let before = self.rows.len();
        let mut flags = keep.iter();
        self.rows.retain(|_| flags.next().copied().unwrap_or(true));
        before - self.rows.len()
    }

    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if self.schema.schema.find_column_index(&column.name).is_some() {
            return Err(DbError::ExecutionError(format!(
                "Column '{}' already exists in table '{}'",
                column.name, self.schema.name
            )));
        }
        if !column.nullable && !self.rows.is_empty() {
            return Err(DbError::ConstraintViolation(format!(
                "Cannot add NOT NULL column '{}' to non-empty table '{}'",
                column.name, self.schema.name
            )));
        }

        self.schema.schema.columns_mut().push(column);
        for row in &mut self.rows {
            row.push(Value::Null);
        }
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Result<()> {
        let idx = self.column_index(name)?;
        if self.schema.schema.column_count() == 1 {
            return Err(DbError::ExecutionError(format!(
                "Cannot drop the only column of table '{}'",
                self.schema.name
            )));
        }

        self.schema.schema.columns_mut().remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        Ok(())
    }

    pub fn rename_column(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let idx = self.column_index(old_name)?;
        if self.schema.schema.find_column_index(new_name).is_some() {
            return Err(DbError::ExecutionError(format!(
                "Column '{}' already exists in table '{}'",
                new_name, self.schema.name
            )));
        }
        self.schema.schema.columns_mut()[idx].name = new_name.to_string();
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.schema
            .schema
            .find_column_index(name)
            .ok_or_else(|| DbError::ColumnNotFound(name.to_string(), self.schema.name.clone()))
    }

    fn prepare_row(&self, row: Row) -> Result<Row> {
        let columns = self.schema.schema.columns();
        if row.len() != columns.len() {
            return Err(DbError::ExecutionError(format!(
                "Table '{}' expects {} values, got {}",
                self.schema.name,
                columns.len(),
                row.len()
            )));
        }

        columns
            .iter()
            .zip(row)
            .map(|(col, value)| {
                col.validate(&value)?;
                Ok(col.data_type.coerce(value))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    schema: Schema,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}
