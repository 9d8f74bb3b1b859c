//! An ensemble of realizations read from disk.

use super::combine::{self, REAL, tag_table};
use super::filter::RealizationFilter;
use super::virtual_ensemble::VirtualEnsemble;
use crate::config::EnsembleConfig;
use crate::core::{DataValue, EnsembleError, Result, Value};
use crate::expression::Statistic;
use crate::realization::{Realization, RealizationStore, VirtualRealization};
use crate::storage::{FileMetadata, Table, file_index};
use crate::summary::{DATE, Frequency, TimeIndex};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{Level, Span, event, info_span};

/// Statistic name column of [`Ensemble::summary_stats`].
pub const STATISTIC: &str = "STATISTIC";

#[derive(Debug)]
pub struct Ensemble {
    name: String,
    members: BTreeMap<usize, RealizationStore>,
    config: EnsembleConfig,
    span: Span,
}

impl Ensemble {
    /// An empty ensemble configured from the environment.
    pub fn new(name: &str) -> Self {
        Self::with_config(name, EnsembleConfig::from_env())
    }

    pub fn with_config(name: &str, config: EnsembleConfig) -> Self {
        let span = info_span!("ensemble", name = %name);
        Self {
            name: name.to_string(),
            members: BTreeMap::new(),
            config,
            span,
        }
    }

    /// Builds an ensemble from realization directory globs such as
    /// `/scratch/field/realization-*/iter-0`.
    pub fn from_paths<S: AsRef<str>>(name: &str, patterns: &[S]) -> Result<Self> {
        let mut ensemble = Self::new(name);
        ensemble.add_realizations(patterns)?;
        Ok(ensemble)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Opens every directory matching `patterns` as a member.
    ///
    /// Directories without a realization index in their path, and
    /// directories that fail to open, are skipped with a warning. A
    /// directory whose index is already taken replaces the earlier
    /// member. Returns the number of new indices; replacements are not
    /// counted.
    pub fn add_realizations<S: AsRef<str>>(&mut self, patterns: &[S]) -> Result<usize> {
        let span = self.span.clone();
        let _enter = span.enter();

        let mut directories: BTreeSet<PathBuf> = BTreeSet::new();
        for pattern in patterns {
            for path in glob::glob(pattern.as_ref())? {
                match path {
                    Ok(path) if path.is_dir() => {
                        directories.insert(path);
                    }
                    Ok(_) => {}
                    Err(err) => {
                        event!(Level::WARN, error = %err, "skipping unreadable path");
                    }
                }
            }
        }

        let mut candidates: Vec<PathBuf> = Vec::with_capacity(directories.len());
        for path in directories {
            let absolute = std::path::absolute(&path)?;
            if self.config.realization.index_of(&absolute.to_string_lossy()).is_some() {
                candidates.push(path);
            } else {
                event!(Level::WARN, path = %path.display(), "no realization index in path, skipping");
            }
        }

        let opened = self.open_members(&candidates);

        let mut added = 0;
        for (path, result) in candidates.iter().zip(opened) {
            match result {
                Ok(realization) => {
                    let Some(index) = realization.index() else {
                        continue;
                    };
                    if self.members.insert(index, realization).is_some() {
                        event!(Level::WARN, index, path = %path.display(), "duplicate realization index, replacing earlier member");
                    } else {
                        added += 1;
                    }
                }
                Err(err) => {
                    event!(Level::WARN, path = %path.display(), error = %err, "skipping realization");
                }
            }
        }
        event!(Level::INFO, added, members = self.members.len(), "realizations added");
        Ok(added)
    }

    /// Opens candidates on a scoped worker pool. Results come back in
    /// candidate order regardless of scheduling.
    fn open_members(&self, candidates: &[PathBuf]) -> Vec<Result<RealizationStore>> {
        let open = |path: &PathBuf| RealizationStore::with_config(path, self.config.realization.clone(), &self.span);
        let workers = self.config.concurrency.min(candidates.len());
        if workers <= 1 {
            return candidates.iter().map(open).collect();
        }

        let chunk_size = candidates.len().div_ceil(workers);
        std::thread::scope(|scope| {
            let handles: Vec<_> = candidates
                .chunks(chunk_size)
                .map(|chunk| scope.spawn(move || chunk.iter().map(open).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .zip(candidates.chunks(chunk_size))
                .flat_map(|(handle, chunk)| match handle.join() {
                    Ok(results) => results,
                    Err(_) => chunk
                        .iter()
                        .map(|path| {
                            Err(EnsembleError::IoError(format!(
                                "worker panicked while opening {}",
                                path.display()
                            )))
                        })
                        .collect(),
                })
                .collect()
        })
    }

    /// Drops members. Indices that are not members are logged and ignored.
    pub fn remove_realizations(&mut self, indices: &[usize]) {
        let _enter = self.span.enter();
        for index in indices {
            if self.members.remove(index).is_none() {
                event!(Level::WARN, index, "realization not in ensemble, nothing removed");
            }
        }
    }

    /// Removes an exact key from every member.
    pub fn remove_data(&mut self, key: &str) {
        let _enter = self.span.enter();
        let missing = self.members.values().filter(|m| !m.contains_key(key)).count();
        if missing > 0 {
            event!(Level::WARN, key, missing, "key absent in some realizations");
        }
        for member in self.members.values_mut() {
            member.delete(key);
        }
    }

    /// The member under `index`. A missing member is
    /// `RealizationNotFound`; `KeyNotFound` is kept for cached data keys.
    pub fn get_realization(&self, index: usize) -> Result<&RealizationStore> {
        self.members.get(&index).ok_or(EnsembleError::RealizationNotFound(index))
    }

    pub fn get_realization_mut(&mut self, index: usize) -> Result<&mut RealizationStore> {
        self.members.get_mut(&index).ok_or(EnsembleError::RealizationNotFound(index))
    }

    pub fn realizations(&self) -> impl Iterator<Item = (usize, &RealizationStore)> {
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

    /// Parameters of every member, one row per realization.
    pub fn parameters(&self) -> Result<Table> {
        self.get(&self.config.realization.parameters_file)
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
        let _enter = self.span.enter();
        combine::combined_agg(self.members.values(), stat, &format!("{} {}", self.name, stat))
    }

    /// File catalogs of all members with a REAL column.
    pub fn files(&self) -> Result<Table> {
        let tables = self
            .realizations()
            .map(|(index, member)| member.files().to_table().and_then(|table| tag_table(&table, index)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Table::concat(&tables))
    }

    /// Discovers files in every member and returns the newly matched
    /// entries with a REAL column.
    pub fn find_files<S: AsRef<str>>(&mut self, patterns: &[S], metadata: Option<&FileMetadata>) -> Result<Table> {
        let mut tables = Vec::new();
        for (index, member) in self.members.iter_mut() {
            let found = member.discover(patterns, metadata)?;
            tables.push(tag_table(&file_index::entries_to_table(found.iter())?, *index)?);
        }
        Ok(Table::concat(&tables))
    }

    /// Runs `load` on every member and combines what they return.
    ///
    /// A member whose load fails is logged and skipped. The call only
    /// fails when no member produced data.
    fn load_each<F>(&mut self, name: &str, mut load: F) -> Result<Table>
    where
        F: FnMut(&mut RealizationStore) -> Result<Option<DataValue>>,
    {
        let span = self.span.clone();
        let _enter = span.enter();

        let mut loaded: Vec<(usize, DataValue)> = Vec::new();
        let mut first_error = None;
        for (index, member) in self.members.iter_mut() {
            match load(member) {
                Ok(Some(value)) => loaded.push((*index, value)),
                Ok(None) => {}
                Err(err) => {
                    event!(Level::WARN, real = index, key = name, error = %err, "load failed, skipping realization");
                    first_error.get_or_insert(err);
                }
            }
        }

        if loaded.is_empty() {
            return Err(first_error.unwrap_or_else(|| EnsembleError::KeyNotFound(name.to_string())));
        }
        combine::combine_values(name, loaded.iter().map(|(index, value)| (*index, value)))
    }

    /// Loads a `<key> <value>` file in every member; one row per member.
    pub fn load_keyvalue(&mut self, localpath: &str, numeric: bool, force: bool) -> Result<Table> {
        self.load_each(localpath, |member| {
            member.load_keyvalue(localpath, numeric, force).map(|kv| Some(DataValue::KeyValues(kv)))
        })
    }

    /// Loads a comma separated file in every member.
    pub fn load_table(&mut self, localpath: &str, numeric: bool, force: bool) -> Result<Table> {
        self.load_each(localpath, |member| {
            member.load_table(localpath, numeric, force).map(|t| t.map(DataValue::Table))
        })
    }

    /// Loads a single-value file in every member; columns `REAL, <localpath>`.
    pub fn load_scalar(&mut self, localpath: &str, numeric: bool, force: bool) -> Result<Table> {
        self.load_each(localpath, |member| {
            member.load_scalar(localpath, numeric, force).map(|v| v.map(DataValue::Scalar))
        })
    }

    /// Summary vectors of every member with columns `REAL, DATE, ...`.
    ///
    /// Regular frequencies and `Last` use one date grid for the whole
    /// ensemble so rows line up across realizations.
    pub fn load_summary(&mut self, time_index: &TimeIndex, column_keys: &[String]) -> Result<Table> {
        let targets = match time_index {
            TimeIndex::Frequency(Frequency::Raw) => None,
            TimeIndex::Frequency(freq) => Some(self.summary_dates(*freq)),
            TimeIndex::Custom(dates) => Some(dates.clone()),
        };
        let grid = time_index.cache_name();
        let name = crate::realization::summary_cache_key(grid);
        self.load_each(&name, |member| {
            let table = member.summary_on(targets.clone(), grid, column_keys)?;
            Ok((!table.is_empty() || table.has_column(DATE)).then_some(DataValue::Table(table)))
        })
    }

    /// Union of the members' summary vector names matching `patterns`.
    pub fn summary_keys(&mut self, patterns: &[String]) -> Result<Vec<String>> {
        let mut keys = BTreeSet::new();
        for member in self.members.values_mut() {
            keys.extend(member.summary_keys(patterns)?);
        }
        Ok(keys.into_iter().collect())
    }

    /// Dates at `frequency` over all members with a summary.
    ///
    /// `Raw` is the sorted union of report dates and `Last` the latest
    /// end date. Regular grids run from the earliest start to the latest
    /// end, rounded outward to whole periods.
    pub fn summary_dates(&mut self, frequency: Frequency) -> Vec<NaiveDateTime> {
        let mut raw: BTreeSet<NaiveDateTime> = BTreeSet::new();
        let mut start: Option<NaiveDateTime> = None;
        let mut end: Option<NaiveDateTime> = None;
        for member in self.members.values_mut() {
            let Some(dates) = member.summary_dates(Frequency::Raw) else {
                continue;
            };
            if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
                start = Some(start.map_or(*first, |s| s.min(*first)));
                end = Some(end.map_or(*last, |e| e.max(*last)));
            }
            raw.extend(dates);
        }

        match (frequency, start, end) {
            (Frequency::Raw, _, _) => raw.into_iter().collect(),
            (Frequency::Last, _, Some(end)) => vec![end],
            (freq, Some(start), Some(end)) => freq.dates_covering(start, end),
            _ => Vec::new(),
        }
    }

    /// Ensemble statistics of summary vectors.
    ///
    /// Columns are `STATISTIC, DATE` followed by the vectors. Rows come
    /// in blocks of mean, minimum, maximum and one block per quantile
    /// (`p10`, `p90` when none are given). Quantiles follow the
    /// oil-industry convention, `p10` being the high estimate.
    pub fn summary_stats(&mut self, column_keys: &[String], time_index: &TimeIndex, quantiles: &[&str]) -> Result<Table> {
        let mut stats = vec![Statistic::Mean, Statistic::Min, Statistic::Max];
        let quantiles: &[&str] = if quantiles.is_empty() { &["p10", "p90"] } else { quantiles };
        for quantile in quantiles {
            stats.push(parse_quantile(quantile)?);
        }

        let mut summary = self.load_summary(time_index, column_keys)?;
        summary.drop_column(REAL);

        let mut blocks = Vec::with_capacity(stats.len());
        for stat in stats {
            let mut block = combine::aggregate_tables(&[&summary], stat)?;
            block.insert_column(0, STATISTIC, Value::Text(stat.name()))?;
            blocks.push(block);
        }
        Ok(Table::concat(&blocks))
    }

    /// Indices of the members whose data under `key` passes `filter`.
    /// With `inplace` the other members are removed.
    pub fn filter(&mut self, key: &str, filter: &RealizationFilter, inplace: bool) -> Result<Vec<usize>> {
        let mut kept = Vec::new();
        for (index, member) in &self.members {
            if filter.matches(member.data(), key)? {
                kept.push(*index);
            }
        }
        if inplace {
            let _enter = self.span.enter();
            let before = self.members.len();
            self.members.retain(|index, _| kept.contains(index));
            event!(Level::INFO, key, removed = before - self.members.len(), "filtered ensemble");
        }
        Ok(kept)
    }

    /// Runs `callback` on every member and stacks the results with REAL.
    /// With `localpath` each result is also stored in its member.
    /// Failing members are logged and skipped.
    pub fn apply<F>(&mut self, callback: F, localpath: Option<&str>) -> Result<Table>
    where
        F: Fn(&RealizationStore) -> Result<Table>,
    {
        let span = self.span.clone();
        let _enter = span.enter();

        let mut tables = Vec::new();
        for (index, member) in self.members.iter_mut() {
            let result = match callback(member) {
                Ok(result) => result,
                Err(err) => {
                    event!(Level::WARN, real = index, error = %err, "apply failed, skipping realization");
                    continue;
                }
            };
            tables.push(tag_table(&result, *index)?);
            if let Some(localpath) = localpath {
                member.insert(localpath, result);
            }
        }
        Ok(Table::concat(&tables))
    }

    /// Snapshots every member into a [`VirtualEnsemble`].
    pub fn to_virtual(&self, name: Option<&str>) -> VirtualEnsemble {
        let members = self
            .realizations()
            .map(|(index, member)| (index, member.snapshot(None, true)))
            .collect();
        VirtualEnsemble::from_members(name.unwrap_or(&self.name), members)
    }
}

fn parse_quantile(raw: &str) -> Result<Statistic> {
    let raw = raw.trim();
    let name = if raw.starts_with(['p', 'P']) { raw.to_string() } else { format!("p{}", raw) };
    match name.parse::<Statistic>() {
        Ok(stat @ Statistic::Percentile(_)) => Ok(stat),
        _ => Err(EnsembleError::ParseError(format!("invalid quantile '{}'", raw))),
    }
}

impl std::fmt::Display for Ensemble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Ensemble {}, {} realizations>", self.name, self.members.len())
    }
}
