use super::Realization;
use crate::core::{DataValue, KeyValues, Result};
use crate::storage::DataStore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cached data of a realization, detached from disk.
///
/// Nothing is ever re-read. New keys only enter through [`put`](Self::put).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualRealization {
    name: String,
    data: DataStore,
}

impl VirtualRealization {
    pub fn new(name: impl Into<String>, data: DataStore) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores externally computed data under an exact key.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<DataValue>) {
        self.data.insert(key, value);
    }

    /// Removes an exact key; absent keys are ignored.
    pub fn delete(&mut self, key: &str) {
        self.data.remove(key);
    }

    pub fn parameters(&self) -> Option<&KeyValues> {
        self.data.get("parameters.txt").ok()?.as_key_values()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Realization for VirtualRealization {
    fn data(&self) -> &DataStore {
        &self.data
    }
}

impl fmt::Display for VirtualRealization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<VirtualRealization, {}>", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EnsembleError, Value};
    use crate::storage::Table;

    fn volumes() -> Table {
        Table::from_columns(vec![("STOIIP_OIL", vec![Value::Integer(1000)])]).unwrap()
    }

    #[test]
    fn test_put_get_delete() {
        let mut real = VirtualRealization::new("test", DataStore::new());
        real.put("share/results/volumes/simulator_volume_fipnum.csv", volumes());
        real.put("npv.txt", Value::Integer(3444));

        assert!(real.get("simulator_volume_fipnum").unwrap().as_table().is_some());
        assert_eq!(real.get("npv").unwrap().as_scalar(), Some(&Value::Integer(3444)));

        real.delete("simulator_volume_fipnum");
        assert_eq!(real.len(), 2);
        real.delete("share/results/volumes/simulator_volume_fipnum.csv");
        real.delete("share/results/volumes/simulator_volume_fipnum.csv");
        assert_eq!(real.keys(), vec!["npv.txt"]);
        assert!(matches!(real.get("simulator_volume_fipnum"), Err(EnsembleError::KeyNotFound(_))));
    }

    #[test]
    fn test_parameters() {
        let mut real = VirtualRealization::new("test", DataStore::new());
        assert!(real.parameters().is_none());
        let mut params = KeyValues::new();
        params.insert("FWL".into(), Value::Integer(1700));
        real.put("parameters.txt", params);
        assert_eq!(real.parameters().unwrap()["FWL"], Value::Integer(1700));
    }

    #[test]
    fn test_serialization_keeps_shapes() {
        let mut real = VirtualRealization::new("test", DataStore::new());
        real.put("volumes.csv", volumes());
        let mut params = KeyValues::new();
        params.insert("FWL".into(), Value::Float(1700.5));
        real.put("parameters.txt", params);

        let bytes = rmp_serde::to_vec(&real).unwrap();
        let restored: VirtualRealization = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(restored, real);
        assert!(restored.get("volumes.csv").unwrap().as_table().is_some());
        assert!(restored.get("parameters.txt").unwrap().as_key_values().is_some());
    }
}
