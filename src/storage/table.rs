use crate::core::{DataType, EnsembleError, Result, Row, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Rows of values under named columns.
///
/// Every row has exactly one value per column; missing cells are
/// `Value::Null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        let mut table = Self::with_columns(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table column by column. All columns must have equal length.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<Value>)>) -> Result<Self> {
        let height = columns.first().map_or(0, |(_, values)| values.len());
        let mut names = Vec::with_capacity(columns.len());
        let mut rows: Vec<Row> = (0..height).map(|_| Vec::with_capacity(columns.len())).collect();
        for (name, values) in columns {
            let name = name.into();
            if values.len() != height {
                return Err(EnsembleError::ParseError(format!(
                    "Column '{}' has {} values, expected {}",
                    name,
                    values.len(),
                    height
                )));
            }
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value);
            }
            names.push(name);
        }
        Ok(Self { columns: names, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Most general type among the non-null cells of a column.
    pub fn column_type(&self, name: &str) -> Option<DataType> {
        let types: Vec<DataType> = self
            .column(name)?
            .filter_map(Value::data_type)
            .collect();
        DataType::most_general(&types)
    }

    pub fn push_row(&mut self, row: Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(EnsembleError::ParseError(format!(
                "Expected {} columns, got {}",
                self.columns.len(),
                row.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Inserts a column at `position` holding `value` in every row.
    pub fn insert_column(&mut self, position: usize, name: &str, value: Value) -> Result<()> {
        if self.has_column(name) {
            return Err(EnsembleError::UnsupportedOperation(format!(
                "Column '{}' already exists",
                name
            )));
        }
        let position = position.min(self.columns.len());
        self.columns.insert(position, name.to_string());
        for row in &mut self.rows {
            row.insert(position, value.clone());
        }
        Ok(())
    }

    pub fn push_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if self.has_column(name) {
            return Err(EnsembleError::UnsupportedOperation(format!(
                "Column '{}' already exists",
                name
            )));
        }
        if values.len() != self.rows.len() {
            return Err(EnsembleError::ParseError(format!(
                "Column '{}' has {} values, table has {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    /// Projects onto the named columns; unknown names are skipped.
    pub fn select(&self, columns: &[&str]) -> Table {
        let indices: Vec<usize> = columns.iter().filter_map(|c| self.column_index(c)).collect();
        Table {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    pub fn filter_rows<F>(&self, mut predicate: F) -> Table
    where
        F: FnMut(&Table, &Row) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| predicate(self, *row))
                .cloned()
                .collect(),
        }
    }

    /// Stable ascending sort on one column, NULLs last.
    pub fn sort_by_column(&mut self, column: &str) -> Result<()> {
        let idx = self.column_index(column).ok_or_else(|| {
            EnsembleError::KeyNotFound(format!("column {}", column))
        })?;
        let mut failure = None;
        self.rows.sort_by(|a, b| match a[idx].compare(&b[idx]) {
            Ok(ordering) => ordering,
            Err(err) => {
                failure.get_or_insert(err);
                std::cmp::Ordering::Equal
            }
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Stacks tables vertically. Columns are the union in first-seen
    /// order; cells a source table lacks become NULL.
    pub fn concat<'a>(tables: impl IntoIterator<Item = &'a Table>) -> Table {
        let tables: Vec<&Table> = tables.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for col in &table.columns {
                if !columns.contains(col) {
                    columns.push(col.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(tables.iter().map(|t| t.row_count()).sum());
        for table in tables {
            let mapping: Vec<Option<usize>> =
                columns.iter().map(|c| table.column_index(c)).collect();
            for row in &table.rows {
                rows.push(
                    mapping
                        .iter()
                        .map(|idx| idx.map_or(Value::Null, |i| row[i].clone()))
                        .collect(),
                );
            }
        }
        Table { columns, rows }
    }

    /// Full outer join on a shared key column.
    ///
    /// Right-hand columns that clash with left-hand ones get a `_right`
    /// suffix. Rows without a partner on the other side are kept with
    /// NULLs in the missing cells.
    pub fn outer_join(&self, other: &Table, on: &str) -> Result<Table> {
        let left_key = self
            .column_index(on)
            .ok_or_else(|| EnsembleError::KeyNotFound(format!("column {}", on)))?;
        let right_key = other
            .column_index(on)
            .ok_or_else(|| EnsembleError::KeyNotFound(format!("column {}", on)))?;

        let right_columns: Vec<usize> = (0..other.columns.len()).filter(|&i| i != right_key).collect();
        let mut columns = self.columns.clone();
        for &i in &right_columns {
            let name = &other.columns[i];
            if columns.contains(name) {
                columns.push(format!("{}_right", name));
            } else {
                columns.push(name.clone());
            }
        }

        let mut right_by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, row) in other.rows.iter().enumerate() {
            right_by_key.entry(row[right_key].to_string()).or_default().push(i);
        }

        let mut matched = vec![false; other.rows.len()];
        let mut rows = Vec::new();
        for left in &self.rows {
            match right_by_key.get(&left[left_key].to_string()) {
                Some(partners) if !left[left_key].is_null() => {
                    for &p in partners {
                        matched[p] = true;
                        let mut row = left.clone();
                        row.extend(right_columns.iter().map(|&i| other.rows[p][i].clone()));
                        rows.push(row);
                    }
                }
                _ => {
                    let mut row = left.clone();
                    row.extend(right_columns.iter().map(|_| Value::Null));
                    rows.push(row);
                }
            }
        }

        for (p, right) in other.rows.iter().enumerate() {
            if matched[p] {
                continue;
            }
            let mut row = vec![Value::Null; self.columns.len()];
            row[left_key] = right[right_key].clone();
            row.extend(right_columns.iter().map(|&i| right[i].clone()));
            rows.push(row);
        }

        Ok(Table { columns, rows })
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return writeln!(f, "Empty table");
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        for row in &self.rows {
            for (i, value) in row.iter().enumerate() {
                widths[i] = widths[i].max(value.to_string().len());
            }
        }

        let header: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{:width$}", col, width = widths[i]))
            .collect();
        writeln!(f, "{}", header.join(" | "))?;

        let separator: String = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-");
        writeln!(f, "{}", separator)?;

        for row in &self.rows {
            let row_str: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, val)| format!("{:width$}", val.to_string(), width = widths[i]))
                .collect();
            writeln!(f, "{}", row_str.join(" | "))?;
        }

        writeln!(f, "\n{} row(s)", self.rows.len())
    }
}
