use crate::core::{DataValue, EnsembleError, Result, Value};
use crate::storage::DataStore;

/// Condition a realization's data must satisfy to pass
/// [`Ensemble::filter`](super::Ensemble::filter).
#[derive(Debug, Clone, PartialEq)]
pub enum RealizationFilter {
    /// The key exists.
    Present,
    /// A key-value mapping holds `key` equal to `value`. Numbers and
    /// their text form compare equal.
    KeyValue { key: String, value: Value },
    /// A table has the column.
    HasColumn(String),
    /// A table column contains the value.
    ColumnContains { column: String, value: Value },
}

impl RealizationFilter {
    pub fn key_value(key: &str, value: impl Into<Value>) -> Self {
        Self::KeyValue {
            key: key.to_string(),
            value: value.into(),
        }
    }

    pub fn column_contains(column: &str, value: impl Into<Value>) -> Self {
        Self::ColumnContains {
            column: column.to_string(),
            value: value.into(),
        }
    }

    /// Tests the data stored under `localpath`. A missing key never
    /// passes; asking a mapping for columns, or a table for keys, is an
    /// error.
    pub fn matches(&self, data: &DataStore, localpath: &str) -> Result<bool> {
        let value = match data.get(localpath) {
            Ok(value) => value,
            Err(EnsembleError::KeyNotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        };

        match (self, value) {
            (Self::Present, _) => Ok(true),
            (Self::KeyValue { key, value: wanted }, DataValue::KeyValues(kv)) => {
                Ok(kv.get(key).is_some_and(|v| v.loosely_equals(wanted)))
            }
            (Self::HasColumn(column), DataValue::Table(table)) => Ok(table.has_column(column)),
            (Self::ColumnContains { column, value: wanted }, DataValue::Table(table)) => Ok(table
                .column(column)
                .is_some_and(|mut cells| cells.any(|v| v.loosely_equals(wanted)))),
            (_, other) => Err(EnsembleError::UnsupportedOperation(format!(
                "cannot filter on '{}' as it is a {}",
                localpath,
                other.kind()
            ))),
        }
    }
}
