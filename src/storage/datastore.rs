//! Key → value cache shared by scratch and virtual realizations.
//!
//! Keys are realization-local paths such as
//! `share/results/volumes/simulator_volume_fipnum.csv`. Lookups accept
//! shorthand as long as it is unambiguous:
//!
//! 1. exact key
//! 2. file name of a key (`simulator_volume_fipnum.csv`)
//! 3. key without its final suffix (`share/results/volumes/simulator_volume_fipnum`)
//! 4. file name without its final suffix (`simulator_volume_fipnum`)
//!
//! Every tier is tested against the full key set. The first tier with any
//! match decides: one match resolves, several fail as ambiguous.

use crate::core::{DataValue, EnsembleError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataStore {
    entries: BTreeMap<String, Arc<DataValue>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under the exact key `key`, replacing any earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DataValue>) {
        self.entries.insert(key.into(), Arc::new(value.into()));
    }

    /// Returns the fully qualified key that `key` denotes.
    pub fn resolve(&self, key: &str) -> Result<&str> {
        if let Some((exact, _)) = self.entries.get_key_value(key) {
            return Ok(exact);
        }

        let tiers: [fn(&str) -> Option<&str>; 3] = [by_basename, strip_suffix, by_basename_stem];
        for shorthand in tiers {
            let candidates: Vec<&str> = self
                .entries
                .keys()
                .map(String::as_str)
                .filter(|k| shorthand(k) == Some(key))
                .collect();
            match candidates.as_slice() {
                [] => continue,
                [single] => return Ok(*single),
                _ => {
                    return Err(EnsembleError::AmbiguousKey {
                        key: key.to_string(),
                        candidates: candidates.iter().map(|c| c.to_string()).collect(),
                    });
                }
            }
        }
        Err(EnsembleError::KeyNotFound(key.to_string()))
    }

    pub fn get(&self, key: &str) -> Result<&DataValue> {
        self.get_shared(key).map(|value| value.as_ref())
    }

    pub fn get_shared(&self, key: &str) -> Result<&Arc<DataValue>> {
        let resolved = self.resolve(key)?;
        self.entries
            .get(resolved)
            .ok_or_else(|| EnsembleError::KeyNotFound(key.to_string()))
    }

    /// Exact-key lookup without shorthand.
    pub fn get_exact(&self, key: &str) -> Option<&DataValue> {
        self.entries.get(key).map(|value| value.as_ref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes an exact key. Removing an absent key does nothing.
    pub fn remove(&mut self, key: &str) -> Option<Arc<DataValue>> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy sharing every value with `self`.
    pub fn shallow_copy(&self) -> Self {
        self.clone()
    }

    /// Copy owning fresh allocations of every value.
    pub fn deep_copy(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), Arc::new(DataValue::clone(v))))
                .collect(),
        }
    }

    /// True when both stores hold the same allocation for `key`.
    pub fn shares_value(&self, other: &DataStore, key: &str) -> bool {
        match (self.entries.get(key), other.entries.get(key)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

fn by_basename(key: &str) -> Option<&str> {
    Some(basename(key))
}

fn by_basename_stem(key: &str) -> Option<&str> {
    strip_suffix(basename(key))
}

/// Drops the final suffix of the last path component. Keys without a
/// suffix have no suffix-less form.
fn strip_suffix(key: &str) -> Option<&str> {
    let name_start = key.rfind('/').map_or(0, |i| i + 1);
    match key[name_start..].rfind('.') {
        Some(dot) if dot > 0 => Some(&key[..name_start + dot]),
        _ => None,
    }
}
