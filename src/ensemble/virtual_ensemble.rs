use super::combine::{self, REAL};
use crate::core::{EnsembleError, Result, Value};
use crate::expression::Statistic;
use crate::realization::{Realization, VirtualRealization};
use crate::storage::{ArchiveManager, EnsembleArchive, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{Level, event, info_span};

/// Virtual realizations indexed by realization number.
///
/// Unlike a single [`VirtualRealization`] the container itself can be
/// edited: members can be added or removed and data appended across
/// members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualEnsemble {
    name: String,
    members: BTreeMap<usize, VirtualRealization>,
}

/// A REAL cell as a realization index. Floats count only when integral.
fn real_index(value: &Value) -> Option<usize> {
    match value {
        Value::Integer(i) => usize::try_from(*i).ok(),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 && *f >= 0.0 => value.as_i64().map(|i| i as usize),
        _ => None,
    }
}

impl VirtualEnsemble {
    pub fn new(name: &str) -> Self {
        Self::from_members(name, BTreeMap::new())
    }

    pub fn from_members(name: &str, members: BTreeMap<usize, VirtualRealization>) -> Self {
        Self {
            name: name.to_string(),
            members,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds `member` under `index`, replacing (with a warning) any
    /// member already there.
    pub fn add_realization(&mut self, index: usize, member: VirtualRealization) {
        if self.members.insert(index, member).is_some() {
            let _enter = info_span!("virtual_ensemble", name = %self.name).entered();
            event!(Level::WARN, index, "replaced existing realization");
        }
    }

    /// Drops members. Indices that are not members are logged and ignored.
    pub fn remove_realizations(&mut self, indices: &[usize]) {
        let _enter = info_span!("virtual_ensemble", name = %self.name).entered();
        for index in indices {
            if self.members.remove(index).is_none() {
                event!(Level::WARN, index, "realization not in ensemble, nothing removed");
            }
        }
    }

    /// Removes an exact key from every member.
    pub fn remove_data(&mut self, key: &str) {
        let _enter = info_span!("virtual_ensemble", name = %self.name).entered();
        let missing = self.members.values().filter(|m| !m.contains_key(key)).count();
        if missing > 0 {
            event!(Level::WARN, key, missing, "key absent in some realizations");
        }
        for member in self.members.values_mut() {
            member.delete(key);
        }
    }

    /// Splits a combined table on its REAL column and stores each slice,
    /// without the REAL column, under `key` in the matching member.
    ///
    /// Rows whose REAL matches no member are dropped with a warning; add
    /// the member first to keep them.
    pub fn append(&mut self, key: &str, table: &Table) -> Result<()> {
        let _enter = info_span!("virtual_ensemble", name = %self.name).entered();
        let Some(reals) = table.column(REAL) else {
            return Err(EnsembleError::UnsupportedOperation(format!(
                "cannot append '{}' without a {} column",
                key, REAL
            )));
        };

        let mut indices = Vec::new();
        for real in reals {
            let index = real_index(real)
                .ok_or_else(|| EnsembleError::TypeMismatch(format!("{} value '{}' is not an index", REAL, real)))?;
            if !indices.contains(&index) {
                indices.push(index);
            }
        }

        for index in indices {
            let Some(member) = self.members.get_mut(&index) else {
                event!(Level::WARN, key, real = index, "no realization for appended rows, dropping them");
                continue;
            };
            let mut slice = table.filter_rows(|t, row| {
                t.column_index(REAL)
                    .and_then(|i| real_index(&row[i]))
                    .is_some_and(|r| r == index)
            });
            slice.drop_column(REAL);
            member.put(key, slice);
        }
        Ok(())
    }

    /// The member under `index`.
    ///
    /// A missing member is reported as `RealizationNotFound` rather than
    /// `KeyNotFound`, which is kept for cached data keys.
    pub fn get_realization(&self, index: usize) -> Result<&VirtualRealization> {
        self.members.get(&index).ok_or(EnsembleError::RealizationNotFound(index))
    }

    pub fn get_realization_mut(&mut self, index: usize) -> Result<&mut VirtualRealization> {
        self.members.get_mut(&index).ok_or(EnsembleError::RealizationNotFound(index))
    }

    pub fn realizations(&self) -> impl Iterator<Item = (usize, &VirtualRealization)> {
        self.members.iter().map(|(index, member)| (*index, member))
    }

    pub fn indices(&self) -> Vec<usize> {
        self.members.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Union of the members' keys.
    pub fn keys(&self) -> Vec<String> {
        combine::union_keys(self.members.values())
    }

    /// `key` combined over the members holding it, tagged with REAL.
    pub fn get(&self, key: &str) -> Result<Table> {
        combine::combined_get(self.realizations(), key)
    }

    pub fn parameters(&self) -> Result<Table> {
        self.get("parameters.txt")
    }

    /// Concatenates `key` over members, or reduces it with `stat`.
    pub fn aggregate(&self, key: &str, stat: Option<Statistic>) -> Result<Table> {
        match stat {
            Some(stat) => combine::combined_aggregate(self.realizations(), key, stat),
            None => self.get(key),
        }
    }

    /// A virtual realization holding `stat` of every key.
    pub fn agg(&self, stat: Statistic) -> Result<VirtualRealization> {
        let _enter = info_span!("virtual_ensemble", name = %self.name).entered();
        combine::combined_agg(self.members.values(), stat, &format!("{} {}", self.name, stat))
    }

    /// Writes the ensemble to an archive file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let archive = EnsembleArchive::new(&self.name, self.members.clone());
        ArchiveManager::new(path).save(&archive)
    }

    /// Reads an ensemble written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let manager = ArchiveManager::new(&path);
        let archive = manager
            .load()?
            .ok_or_else(|| EnsembleError::FileNotFound(manager.path().to_path_buf()))?;
        Ok(Self::from_members(&archive.name, archive.realizations))
    }
}

impl fmt::Display for VirtualEnsemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<VirtualEnsemble {}, {} realizations>", self.name, self.members.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DataStore;

    fn ensemble(indices: &[usize]) -> VirtualEnsemble {
        let mut ens = VirtualEnsemble::new("test");
        for &index in indices {
            let mut real = VirtualRealization::new(format!("r{}", index), DataStore::new());
            real.put("npv.txt", Value::from(index * 100));
            ens.add_realization(index, real);
        }
        ens
    }

    #[test]
    fn test_append_requires_real_column() {
        let mut ens = ensemble(&[0, 1]);
        let table = Table::from_columns(vec![("NPV", vec![Value::Integer(1)])]).unwrap();
        assert!(matches!(
            ens.append("npv.csv", &table),
            Err(EnsembleError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_append_rejects_fractional_real() {
        let mut ens = ensemble(&[0, 1, 2]);
        let table = Table::from_columns(vec![
            (REAL, vec![Value::Float(2.5)]),
            ("NPV", vec![Value::Integer(7)]),
        ])
        .unwrap();
        assert!(matches!(ens.append("x", &table), Err(EnsembleError::TypeMismatch(_))));
        assert!(!ens.get_realization(2).unwrap().contains_key("x"));
    }

    #[test]
    fn test_append_accepts_integral_float_real() {
        let mut ens = ensemble(&[0, 1, 2]);
        let table = Table::from_columns(vec![
            (REAL, vec![Value::Float(2.0)]),
            ("NPV", vec![Value::Integer(7)]),
        ])
        .unwrap();
        ens.append("x", &table).unwrap();
        let slice = ens.get_realization(2).unwrap().get("x").unwrap().as_table().unwrap().clone();
        assert_eq!(slice.value(0, "NPV"), Some(&Value::Integer(7)));
        assert!(!ens.get_realization(1).unwrap().contains_key("x"));
    }

    #[test]
    fn test_append_drops_unmatched_rows() {
        let mut ens = ensemble(&[0, 1]);
        let table = Table::from_columns(vec![
            (REAL, vec![Value::Integer(0), Value::Integer(1), Value::Integer(7)]),
            ("NPV", vec![Value::Integer(10), Value::Integer(11), Value::Integer(17)]),
        ])
        .unwrap();
        ens.append("npv.csv", &table).unwrap();
        assert_eq!(ens.len(), 2);
        let slice = ens.get_realization(1).unwrap().get("npv.csv").unwrap().as_table().unwrap().clone();
        assert_eq!(slice.columns(), &["NPV"]);
        assert_eq!(slice.value(0, "NPV"), Some(&Value::Integer(11)));
        assert_eq!(ens.get("npv.csv").unwrap().row_count(), 2);
    }

    #[test]
    fn test_aggregate_scalars() {
        let ens = ensemble(&[0, 1, 2]);
        let mean = ens.aggregate("npv.txt", Some(Statistic::Mean)).unwrap();
        assert_eq!(mean.value(0, "npv.txt").unwrap().as_f64(), Some(100.0));
        let combined = ens.aggregate("npv", None).unwrap();
        assert_eq!(combined.row_count(), 3);
        let agg = ens.agg(Statistic::Max).unwrap();
        assert_eq!(agg.get("npv.txt").unwrap().as_scalar().unwrap().as_f64(), Some(200.0));
    }
}
