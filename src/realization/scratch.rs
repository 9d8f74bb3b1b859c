//! A realization read from its run directory on disk.

use super::{Realization, VirtualRealization, summary_cache_key};
use crate::config::RealizationConfig;
use crate::core::{DataValue, EnsembleError, KeyValues, Result, Value};
use crate::parser::{parse_keyvalue, parse_scalar, parse_table};
use crate::storage::{DataStore, FileEntry, FileIndex, FileMetadata, Table};
use crate::summary::{Frequency, SummarySource, TimeIndex, locate_summary};
use chrono::NaiveDateTime;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{Level, Span, event, info_span};

/// How `load_file` parses a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `<key> <value>` lines
    Text,
    /// Comma separated table with header
    Csv,
    /// A single value
    Scalar,
}

impl FromStr for FileFormat {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Text),
            "csv" => Ok(Self::Csv),
            "scalar" => Ok(Self::Scalar),
            other => Err(EnsembleError::UnsupportedOperation(format!(
                "File format '{}' not supported",
                other
            ))),
        }
    }
}

/// Lazily populated cache over one realization directory.
///
/// Files are parsed on first request and kept under their path relative
/// to the realization root. Lookups accept unambiguous shorthand, see
/// [`DataStore`].
#[derive(Debug)]
pub struct RealizationStore {
    origin: PathBuf,
    index: Option<usize>,
    files: FileIndex,
    data: DataStore,
    config: RealizationConfig,
    summary: Option<Arc<dyn SummarySource>>,
    span: Span,
}

impl RealizationStore {
    /// Opens `path` with the default layout.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(path, RealizationConfig::default(), &Span::current())
    }

    /// Opens `path`. Events of this realization are emitted in a
    /// `realization` span created below `parent`.
    ///
    /// Fails with [`EnsembleError::Structural`] when the status log is
    /// missing. Parameters and the job timeline are loaded right away.
    pub fn with_config(path: impl AsRef<Path>, config: RealizationConfig, parent: &Span) -> Result<Self> {
        let origin = std::path::absolute(path.as_ref())?;
        let index = config.index_of(&origin.to_string_lossy());
        let span = info_span!(
            parent: parent,
            "realization",
            index = ?index,
            path = %origin.display()
        );
        let _enter = span.enter();

        if index.is_none() {
            event!(Level::WARN, "no realization index in path");
        }

        let status_path = origin.join(&config.status_file);
        if !status_path.is_file() {
            event!(Level::WARN, "invalid realization, no status file");
            return Err(EnsembleError::Structural(format!(
                "{} missing in {}",
                config.status_file,
                origin.display()
            )));
        }

        let mut files = FileIndex::new(origin.clone());
        for localpath in [&config.status_file, &config.jobs_file, &config.ok_file] {
            if origin.join(localpath).is_file() {
                files.ensure(localpath);
            }
        }

        let mut realization = Self {
            origin,
            index,
            files,
            data: DataStore::new(),
            config,
            summary: None,
            span: span.clone(),
        };

        let parameters = realization.config.parameters_file.clone();
        if realization.origin.join(&parameters).is_file() {
            realization.load_keyvalue(&parameters, true, false)?;
        }
        realization.timeline()?;

        event!(Level::DEBUG, keys = realization.data.len(), "realization opened");
        Ok(realization)
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn files(&self) -> &FileIndex {
        &self.files
    }

    pub fn config(&self) -> &RealizationConfig {
        &self.config
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Reads a `<key> <value>` file, or returns the cached mapping.
    pub fn load_keyvalue(&mut self, localpath: &str, numeric: bool, force: bool) -> Result<KeyValues> {
        if !force && let Some(cached) = self.data.get_exact(localpath) {
            return match cached {
                DataValue::KeyValues(kv) => Ok(kv.clone()),
                other => Err(cached_as(localpath, other)),
            };
        }
        let bytes = self.read_file(localpath)?;
        let values = {
            let _enter = self.span.enter();
            parse_keyvalue(&bytes, numeric)
        };
        self.data.insert(localpath, values.clone());
        Ok(values)
    }

    /// Reads a comma separated file, or returns the cached table. An
    /// empty file gives `None`.
    pub fn load_table(&mut self, localpath: &str, numeric: bool, force: bool) -> Result<Option<Table>> {
        if !force && let Some(cached) = self.data.get_exact(localpath) {
            return match cached {
                DataValue::Table(table) => Ok(Some(table.clone())),
                DataValue::Absent => Ok(None),
                other => Err(cached_as(localpath, other)),
            };
        }
        let bytes = self.read_file(localpath)?;
        let table = {
            let _enter = self.span.enter();
            parse_table(&bytes, numeric)?
        };
        if table.is_none() {
            let _enter = self.span.enter();
            event!(Level::WARN, localpath, "table file is empty");
        }
        self.data.insert(localpath, table.clone());
        Ok(table)
    }

    /// Reads a file holding a single value, or returns the cached one.
    /// An empty file gives `None` when read as text.
    pub fn load_scalar(&mut self, localpath: &str, numeric: bool, force: bool) -> Result<Option<Value>> {
        if !force && let Some(cached) = self.data.get_exact(localpath) {
            return match cached {
                DataValue::Scalar(value) => Ok(Some(value.clone())),
                DataValue::Absent => Ok(None),
                other => Err(cached_as(localpath, other)),
            };
        }
        let bytes = self.read_file(localpath)?;
        let value = parse_scalar(&bytes, numeric)?;
        let scalar = value.as_scalar().cloned();
        self.data.insert(localpath, value);
        Ok(scalar)
    }

    /// Dispatches to the loader for `format`.
    pub fn load_file(&mut self, localpath: &str, format: FileFormat, numeric: bool, force: bool) -> Result<DataValue> {
        Ok(match format {
            FileFormat::Text => DataValue::KeyValues(self.load_keyvalue(localpath, numeric, force)?),
            FileFormat::Csv => DataValue::from(self.load_table(localpath, numeric, force)?),
            FileFormat::Scalar => self.load_scalar(localpath, numeric, force)?.map_or(DataValue::Absent, DataValue::Scalar),
        })
    }

    /// Registers the files matching `patterns` (globs relative to the
    /// realization root), tagged with `metadata`.
    pub fn discover<S: AsRef<str>>(&mut self, patterns: &[S], metadata: Option<&FileMetadata>) -> Result<Vec<FileEntry>> {
        let _enter = self.span.enter();
        let found = self.files.discover(patterns, metadata)?;
        event!(Level::DEBUG, count = found.len(), "discovered files");
        Ok(found)
    }

    /// Removes an exact key from the cache. Absent keys are ignored.
    pub fn delete(&mut self, key: &str) {
        self.data.remove(key);
    }

    /// Stores caller computed data under an exact key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DataValue>) {
        self.data.insert(key, value);
    }

    /// Re-reads the status log (and job sidecar) into the cached timeline.
    pub fn timeline(&mut self) -> Result<Table> {
        let status_file = self.config.status_file.clone();
        let status = self.read_file(&status_file)?;
        let jobs_path = self.origin.join(&self.config.jobs_file);
        let jobs = if jobs_path.is_file() {
            match std::fs::read(&jobs_path) {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    let _enter = self.span.enter();
                    event!(Level::WARN, error = %err, "cannot read job description sidecar");
                    None
                }
            }
        } else {
            None
        };

        let timeline = {
            let _enter = self.span.enter();
            self.config.timeline.build(&status, jobs.as_deref())?
        };
        self.data.insert(status_file, timeline.clone());
        Ok(timeline)
    }

    /// True when the success marker exists on disk.
    pub fn is_complete(&self) -> bool {
        self.origin.join(&self.config.ok_file).is_file()
    }

    /// The cached parameter mapping, if the realization has one.
    pub fn parameters(&self) -> Option<&KeyValues> {
        self.data.get_exact(&self.config.parameters_file)?.as_key_values()
    }

    /// Copies the cache into a [`VirtualRealization`] named `name`
    /// (default: the origin path). With `deep` unset the snapshot shares
    /// values with this store.
    pub fn snapshot(&self, name: Option<&str>, deep: bool) -> VirtualRealization {
        let name = name.map_or_else(|| self.origin.display().to_string(), str::to_string);
        let data = if deep { self.data.deep_copy() } else { self.data.shallow_copy() };
        VirtualRealization::new(name, data)
    }

    fn summary_source(&mut self) -> Option<Arc<dyn SummarySource>> {
        if let Some(source) = &self.summary {
            return Some(Arc::clone(source));
        }
        let _enter = self.span.enter();
        let provider = Arc::clone(&self.config.summary_provider);
        let path = locate_summary(&self.files, provider.file_type(), &self.config.summary_glob)?;
        let source: Arc<dyn SummarySource> = Arc::from(provider.open(&path)?);
        event!(Level::DEBUG, path = %path.display(), "summary source opened");
        self.summary = Some(Arc::clone(&source));
        Some(source)
    }

    /// Whether a summary source can be opened for this realization.
    pub fn has_summary(&mut self) -> bool {
        self.summary_source().is_some()
    }

    /// Summary vectors matching `column_keys` (all when empty) on the
    /// requested time axis, cached under
    /// `share/results/tables/unsmry-<grid>.csv`. Without a summary source
    /// the result is an empty table and nothing is cached.
    pub fn summary(&mut self, time_index: &TimeIndex, column_keys: &[String]) -> Result<Table> {
        let targets = match time_index {
            TimeIndex::Frequency(Frequency::Raw) => None,
            TimeIndex::Frequency(freq) => match self.summary_source() {
                Some(source) => Some(dates_for(source.as_ref(), *freq)),
                None => return Ok(Table::empty()),
            },
            TimeIndex::Custom(dates) => Some(dates.clone()),
        };
        self.summary_on(targets, time_index.cache_name(), column_keys)
    }

    /// Summary vectors on explicit dates (raw dates for `None`), cached
    /// under the summary key of `grid`.
    pub fn summary_on(
        &mut self,
        targets: Option<Vec<NaiveDateTime>>,
        grid: &str,
        column_keys: &[String],
    ) -> Result<Table> {
        let Some(source) = self.summary_source() else {
            return Ok(Table::empty());
        };
        let keys = source.matching_keys(column_keys)?;
        let table = source.frame(&keys, targets.as_deref())?;
        self.data.insert(summary_cache_key(grid), table.clone());
        Ok(table)
    }

    /// Names of the summary vectors matching any of `patterns`.
    pub fn summary_keys(&mut self, patterns: &[String]) -> Result<Vec<String>> {
        match self.summary_source() {
            Some(source) => source.matching_keys(patterns),
            None => Ok(Vec::new()),
        }
    }

    /// Dates of the summary at `frequency`; `None` without a summary.
    /// Regular grids stay inside the simulated period.
    pub fn summary_dates(&mut self, frequency: Frequency) -> Option<Vec<NaiveDateTime>> {
        let source = self.summary_source()?;
        Some(dates_for(source.as_ref(), frequency))
    }

    /// Raw-time vectors matching `patterns`. Not cached.
    pub fn summary_values(&mut self, patterns: &[String]) -> Result<Table> {
        let Some(source) = self.summary_source() else {
            return Ok(Table::empty());
        };
        let keys = source.matching_keys(patterns)?;
        source.frame(&keys, None)
    }

    fn read_file(&mut self, localpath: &str) -> Result<Vec<u8>> {
        let fullpath = self.origin.join(localpath);
        if !fullpath.is_file() {
            return Err(EnsembleError::FileNotFound(fullpath));
        }
        self.files.ensure(localpath);
        Ok(std::fs::read(&fullpath)?)
    }
}

fn dates_for(source: &dyn SummarySource, frequency: Frequency) -> Vec<NaiveDateTime> {
    match (frequency, source.start_date(), source.end_date()) {
        (Frequency::Raw, _, _) => source.dates().to_vec(),
        (Frequency::Last, _, Some(end)) => vec![end],
        (freq, Some(start), Some(end)) => freq.dates_within(start, end),
        _ => Vec::new(),
    }
}

fn cached_as(localpath: &str, cached: &DataValue) -> EnsembleError {
    EnsembleError::TypeMismatch(format!(
        "'{}' is cached as a {}, re-read with force to replace it",
        localpath,
        cached.kind()
    ))
}

impl Realization for RealizationStore {
    fn data(&self) -> &DataStore {
        &self.data
    }
}

impl fmt::Display for RealizationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.origin.display().to_string();
        let tail: String = {
            let chars: Vec<char> = path.chars().collect();
            chars[chars.len().saturating_sub(50)..].iter().collect()
        };
        match self.index {
            Some(index) => write!(f, "<Realization, index={}, path=...{}>", index, tail),
            None => write!(f, "<Realization, index=None, path=...{}>", tail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const STATUS: &str = "\
Current host                    : st-rst16-02-03/x86_64  file-server:10.14.10.238
LSF JOBID: 1865412
MAKE_DIRECTORY                  : 15:56:40 .... 15:56:40
ECLIPSE100_2014.2               : 16:01:04 .... 16:04:19
";

    fn realization_dir() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("realization-3").join("iter-0");
        fs::create_dir_all(root.join("share/results/volumes")).unwrap();
        fs::write(root.join("STATUS"), STATUS).unwrap();
        fs::write(root.join("parameters.txt"), "FWL 1700\nRMS_SEED 422851785\nMULTFLT 1.5\n").unwrap();
        fs::write(root.join("npv.txt"), "3444\n").unwrap();
        fs::write(
            root.join("share/results/volumes/simulator_volume_fipnum.csv"),
            "FIPNUM,STOIIP_OIL\n1,1000\n2,2000\n",
        )
        .unwrap();
        (temp, root)
    }

    #[test]
    fn test_open_loads_parameters_and_timeline() {
        let (_temp, root) = realization_dir();
        let real = RealizationStore::open(&root).unwrap();
        assert_eq!(real.index(), Some(3));
        assert_eq!(real.parameters().unwrap()["FWL"], Value::Integer(1700));
        assert_eq!(real.parameters().unwrap()["MULTFLT"], Value::Float(1.5));
        assert_eq!(real.get("STATUS").unwrap().as_table().unwrap().row_count(), 2);
        assert!(!real.is_complete());
        assert!(real.files().contains_localpath("STATUS"));
    }

    #[test]
    fn test_missing_status_is_structural() {
        let temp = TempDir::new().unwrap();
        let result = RealizationStore::open(temp.path());
        assert!(matches!(result, Err(EnsembleError::Structural(_))));
    }

    #[test]
    fn test_load_errors_and_type_changes() {
        let (_temp, root) = realization_dir();
        let mut real = RealizationStore::open(&root).unwrap();
        assert!(matches!(
            real.load_table("nothere.csv", true, false),
            Err(EnsembleError::FileNotFound(_))
        ));

        assert_eq!(real.load_scalar("npv.txt", true, false).unwrap(), Some(Value::Integer(3444)));
        assert!(matches!(
            real.load_keyvalue("npv.txt", true, false),
            Err(EnsembleError::TypeMismatch(_))
        ));
        let forced = real.load_keyvalue("npv.txt", true, true).unwrap();
        assert!(forced.is_empty());
        assert!(real.get("npv.txt").unwrap().as_key_values().is_some());
    }

    #[test]
    fn test_load_file_dispatch() {
        let (_temp, root) = realization_dir();
        let mut real = RealizationStore::open(&root).unwrap();
        let value = real
            .load_file("share/results/volumes/simulator_volume_fipnum.csv", FileFormat::Csv, true, false)
            .unwrap();
        assert_eq!(value.as_table().unwrap().row_count(), 2);
        assert!("xls".parse::<FileFormat>().is_err());
        assert_eq!("TXT".parse::<FileFormat>().unwrap(), FileFormat::Text);
    }

    #[test]
    fn test_snapshot_depth() {
        let (_temp, root) = realization_dir();
        let real = RealizationStore::open(&root).unwrap();
        let deep = real.snapshot(Some("deep"), true);
        let shallow = real.snapshot(None, false);
        assert_eq!(deep.name(), "deep");
        assert_eq!(shallow.name(), real.origin().display().to_string());
        assert!(!deep.data().shares_value(real.data(), "STATUS"));
        assert!(shallow.data().shares_value(real.data(), "STATUS"));
        assert_eq!(deep.keys(), real.keys());
    }

    #[test]
    fn test_no_summary_gives_empty_results() {
        let (_temp, root) = realization_dir();
        let mut real = RealizationStore::open(&root).unwrap();
        let keys_before = real.keys();
        let table = real.summary(&TimeIndex::default(), &[]).unwrap();
        assert!(table.is_empty());
        assert_eq!(real.keys(), keys_before);
        assert!(real.summary_dates(Frequency::Monthly).is_none());
        assert!(real.summary_keys(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_display() {
        let (_temp, root) = realization_dir();
        let real = RealizationStore::open(&root).unwrap();
        assert!(real.to_string().starts_with("<Realization, index=3, path=..."));
    }
}
