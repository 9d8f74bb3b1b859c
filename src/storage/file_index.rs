//! Catalog of the on-disk files discovered for one realization.

use crate::core::{Result, Value};
use crate::storage::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{Level, event};

pub const FULLPATH: &str = "FULLPATH";
pub const FILETYPE: &str = "FILETYPE";
pub const LOCALPATH: &str = "LOCALPATH";
pub const BASENAME: &str = "BASENAME";

/// Caller supplied metadata columns attached to discovered files.
pub type FileMetadata = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub fullpath: PathBuf,
    pub filetype: String,
    pub localpath: String,
    pub basename: String,
    pub metadata: FileMetadata,
}

impl FileEntry {
    /// Describes `localpath` relative to a realization `root`.
    pub fn new(root: &Path, localpath: &str) -> Self {
        Self::from_fullpath(root, root.join(localpath))
    }

    pub fn from_fullpath(root: &Path, fullpath: PathBuf) -> Self {
        let localpath = fullpath
            .strip_prefix(root)
            .unwrap_or(&fullpath)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let basename = fullpath
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            filetype: filetype_of(&basename),
            localpath,
            basename,
            fullpath,
            metadata: FileMetadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: FileMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Text after the final dot of a file name, or the whole name when it
/// has no dot (so `STATUS` has file type `STATUS`).
pub fn filetype_of(basename: &str) -> String {
    basename
        .rsplit_once('.')
        .map_or(basename, |(_, suffix)| suffix)
        .to_string()
}

/// Files keyed by absolute path. Registering a path again replaces the
/// earlier entry, metadata included.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileIndex {
    root: PathBuf,
    entries: BTreeMap<PathBuf, FileEntry>,
}

impl FileIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn register(&mut self, entry: FileEntry) {
        self.entries.insert(entry.fullpath.clone(), entry);
    }

    /// Registers `localpath` unless its full path is already known.
    pub fn ensure(&mut self, localpath: &str) -> &FileEntry {
        let entry = FileEntry::new(&self.root, localpath);
        self.entries.entry(entry.fullpath.clone()).or_insert(entry)
    }

    /// Expands glob patterns relative to the root and registers every
    /// match, merged with `metadata`. A pattern without matches is fine.
    pub fn discover<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        metadata: Option<&FileMetadata>,
    ) -> Result<Vec<FileEntry>> {
        let mut discovered = Vec::new();
        for pattern in patterns {
            let full_pattern = self.root.join(pattern.as_ref());
            let paths = glob::glob(&full_pattern.to_string_lossy())?;
            for path in paths {
                let path = match path {
                    Ok(path) => path,
                    Err(err) => {
                        event!(Level::WARN, error = %err, "skipping unreadable path during discovery");
                        continue;
                    }
                };
                let mut entry = FileEntry::from_fullpath(&self.root, path);
                if let Some(metadata) = metadata {
                    entry.metadata = metadata.clone();
                }
                discovered.push(entry.clone());
                self.register(entry);
            }
        }
        Ok(discovered)
    }

    pub fn find(&self, filetype: Option<&str>, fullpath: Option<&Path>) -> Vec<&FileEntry> {
        self.entries
            .values()
            .filter(|e| filetype.is_none_or(|t| e.filetype == t))
            .filter(|e| fullpath.is_none_or(|p| e.fullpath == p))
            .collect()
    }

    pub fn get(&self, fullpath: &Path) -> Option<&FileEntry> {
        self.entries.get(fullpath)
    }

    pub fn contains(&self, fullpath: &Path) -> bool {
        self.entries.contains_key(fullpath)
    }

    pub fn contains_localpath(&self, localpath: &str) -> bool {
        self.entries.values().any(|e| e.localpath == localpath)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The catalog as a table: the four fixed columns followed by the
    /// union of metadata columns (NULL where a file has no such field).
    pub fn to_table(&self) -> Result<Table> {
        entries_to_table(self.entries.values())
    }
}

pub(crate) fn entries_to_table<'a>(entries: impl Iterator<Item = &'a FileEntry> + Clone) -> Result<Table> {
    let mut metadata_columns: Vec<&str> = Vec::new();
    for entry in entries.clone() {
        for key in entry.metadata.keys() {
            if !metadata_columns.contains(&key.as_str()) {
                metadata_columns.push(key);
            }
        }
    }

    let mut columns: Vec<String> = [FULLPATH, FILETYPE, LOCALPATH, BASENAME].map(String::from).to_vec();
    columns.extend(metadata_columns.iter().map(|c| c.to_string()));
    let mut rows = Vec::new();
    for entry in entries {
        let mut row = vec![
            Value::Text(entry.fullpath.to_string_lossy().into_owned()),
            Value::Text(entry.filetype.clone()),
            Value::Text(entry.localpath.clone()),
            Value::Text(entry.basename.clone()),
        ];
        row.extend(
            metadata_columns
                .iter()
                .map(|key| entry.metadata.get(*key).cloned().unwrap_or(Value::Null)),
        );
        rows.push(row);
    }
    Table::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn realization_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let volumes = dir.path().join("share/results/volumes");
        fs::create_dir_all(&volumes).unwrap();
        fs::write(volumes.join("simulator_volume_fipnum.csv"), "FIPNUM,STOIIP\n1,100\n").unwrap();
        fs::write(volumes.join("geogrid_volume.csv"), "ZONE,STOIIP\nA,5\n").unwrap();
        fs::write(dir.path().join("STATUS"), "header\n").unwrap();
        dir
    }

    #[test]
    fn test_entry_fields() {
        let root = Path::new("/scratch/case/realization-3/iter-0");
        let entry = FileEntry::new(root, "share/results/tables/unsmry.csv");
        assert_eq!(entry.filetype, "csv");
        assert_eq!(entry.basename, "unsmry.csv");
        assert_eq!(entry.localpath, "share/results/tables/unsmry.csv");
        assert_eq!(filetype_of("STATUS"), "STATUS");
    }

    #[test]
    fn test_discover_with_metadata() {
        let dir = realization_dir();
        let mut index = FileIndex::new(dir.path());
        let mut metadata = FileMetadata::new();
        metadata.insert("GRID".into(), Value::from("simgrid"));

        let found = index
            .discover(&["share/results/volumes/*csv"], Some(&metadata))
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(index.len(), 2);

        let table = index.to_table().unwrap();
        assert!(table.has_column("GRID"));
        assert!(table.column("GRID").unwrap().all(|v| v == &Value::from("simgrid")));
    }

    #[test]
    fn test_rediscovery_replaces_entries() {
        let dir = realization_dir();
        let mut index = FileIndex::new(dir.path());
        let mut metadata = FileMetadata::new();
        metadata.insert("GRID".into(), Value::from("simgrid"));
        index.discover(&["share/results/volumes/*csv"], Some(&metadata)).unwrap();
        index.discover(&["share/results/volumes/*csv"], None).unwrap();

        assert_eq!(index.len(), 2);
        assert!(!index.to_table().unwrap().has_column("GRID"));
    }

    #[test]
    fn test_unmatched_pattern_is_not_an_error() {
        let dir = realization_dir();
        let mut index = FileIndex::new(dir.path());
        assert!(index.discover(&["nothing/here/*.txt"], None).unwrap().is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_find_by_filetype() {
        let dir = realization_dir();
        let mut index = FileIndex::new(dir.path());
        index.discover(&["STATUS", "share/results/volumes/*"], None).unwrap();
        assert_eq!(index.find(Some("csv"), None).len(), 2);
        assert_eq!(index.find(Some("STATUS"), None).len(), 1);
        let status = dir.path().join("STATUS");
        assert_eq!(index.find(None, Some(&status)).len(), 1);
    }
}
