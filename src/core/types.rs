use super::Value;
use crate::storage::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Row = Vec<Value>;

/// Parsed `<key> <value>` pairs, ordered by key.
pub type KeyValues = BTreeMap<String, Value>;

/// One cached entry in a realization's data store.
///
/// Consumers must handle every shape explicitly; the variant of an entry
/// only changes through an explicit forced re-read or a replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    KeyValues(KeyValues),
    Table(Table),
    Scalar(Value),
    /// The source existed but held no data.
    Absent,
}

impl DataValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::KeyValues(_) => "key-value mapping",
            Self::Table(_) => "table",
            Self::Scalar(_) => "scalar",
            Self::Absent => "absent",
        }
    }

    pub fn as_key_values(&self) -> Option<&KeyValues> {
        match self {
            Self::KeyValues(kv) => Some(kv),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl From<KeyValues> for DataValue {
    fn from(kv: KeyValues) -> Self {
        Self::KeyValues(kv)
    }
}

impl From<Table> for DataValue {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

impl From<Option<Table>> for DataValue {
    fn from(table: Option<Table>) -> Self {
        table.map_or(Self::Absent, Self::Table)
    }
}

impl From<Value> for DataValue {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}
