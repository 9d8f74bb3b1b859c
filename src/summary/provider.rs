use crate::core::Result;
use crate::expression::filter_names;
use crate::storage::{FileIndex, Table};
use chrono::NaiveDateTime;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{Level, event};

/// Column holding the time axis of every summary table.
pub const DATE: &str = "DATE";

/// An opened time-series source for one realization.
pub trait SummarySource: Send + Sync + fmt::Debug {
    /// Every vector name, sorted.
    fn keys(&self) -> Vec<String>;

    /// Report dates, ascending.
    fn dates(&self) -> &[NaiveDateTime];

    /// Materializes `keys` as a table with a leading DATE column, on the
    /// raw dates or resampled to `time_index`.
    fn frame(&self, keys: &[String], time_index: Option<&[NaiveDateTime]>) -> Result<Table>;

    fn start_date(&self) -> Option<NaiveDateTime> {
        self.dates().first().copied()
    }

    fn end_date(&self) -> Option<NaiveDateTime> {
        self.dates().last().copied()
    }

    /// Vector names matching any wildcard; no patterns means all.
    fn matching_keys(&self, patterns: &[String]) -> Result<Vec<String>> {
        let keys = self.keys();
        filter_names(keys.iter().map(String::as_str), patterns)
    }
}

/// Opens summary sources of one file format.
pub trait SummaryProvider: Send + Sync + fmt::Debug {
    /// File type (final suffix) of the files this provider reads.
    fn file_type(&self) -> &str;

    /// `None` when the file is missing or unreadable.
    fn open(&self, path: &Path) -> Option<Box<dyn SummarySource>>;
}

/// Picks the summary file of a realization.
///
/// A single registered file of the provider's type wins. Otherwise the
/// first match of `default_glob` below the realization root is used.
pub fn locate_summary(files: &FileIndex, file_type: &str, default_glob: &str) -> Option<PathBuf> {
    let registered = files.find(Some(file_type), None);
    if let [entry] = registered.as_slice() {
        return Some(entry.fullpath.clone());
    }

    let pattern = files.root().join(default_glob);
    let mut matches: Vec<PathBuf> = match glob::glob(&pattern.to_string_lossy()) {
        Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
        Err(err) => {
            event!(Level::WARN, error = %err, pattern = default_glob, "invalid summary glob");
            return None;
        }
    };
    matches.sort();
    matches.into_iter().next()
}
