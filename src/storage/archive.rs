//! On-disk archives of virtual ensembles.

use crate::core::{EnsembleError, Result};
use crate::realization::VirtualRealization;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const ARCHIVE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleArchive {
    pub version: u32,
    pub name: String,
    pub realizations: BTreeMap<usize, VirtualRealization>,
    pub metadata: ArchiveMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub created_at: NaiveDateTime,
    pub realization_count: usize,
    pub key_count: usize,
}

impl EnsembleArchive {
    pub fn new(name: &str, realizations: BTreeMap<usize, VirtualRealization>) -> Self {
        let key_count = realizations.values().map(VirtualRealization::len).sum();
        Self {
            version: ARCHIVE_VERSION,
            name: name.to_string(),
            metadata: ArchiveMetadata {
                created_at: Utc::now().naive_utc(),
                realization_count: realizations.len(),
                key_count,
            },
            realizations,
        }
    }
}

/// Reads and writes one archive file. Writes go to a temporary file in
/// the same directory that is renamed over the target when complete.
pub struct ArchiveManager {
    archive_path: PathBuf,
}

impl ArchiveManager {
    pub fn new<P: AsRef<Path>>(archive_path: P) -> Self {
        Self {
            archive_path: archive_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.archive_path
    }

    pub fn save(&self, archive: &EnsembleArchive) -> Result<()> {
        let parent = match self.archive_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let serialized = rmp_serde::to_vec(archive)?;
        let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
        temp.write_all(&serialized)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.archive_path).map_err(|e| EnsembleError::IoError(e.to_string()))?;

        log::info!(
            "saved ensemble archive '{}' ({} realizations) to {}",
            archive.name,
            archive.realizations.len(),
            self.archive_path.display()
        );
        Ok(())
    }

    /// `None` when no archive exists at the path.
    pub fn load(&self) -> Result<Option<EnsembleArchive>> {
        if !self.archive_path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.archive_path)?;
        let archive: EnsembleArchive = rmp_serde::from_slice(&data)?;
        if archive.version != ARCHIVE_VERSION {
            log::warn!(
                "archive {} has version {}, expected {}",
                self.archive_path.display(),
                archive.version,
                ARCHIVE_VERSION
            );
            return Err(EnsembleError::ParseError(format!(
                "unsupported archive version {}",
                archive.version
            )));
        }
        Ok(Some(archive))
    }

    pub fn exists(&self) -> bool {
        self.archive_path.exists()
    }

    pub fn delete(&self) -> Result<()> {
        if self.archive_path.exists() {
            fs::remove_file(&self.archive_path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::storage::DataStore;
    use tempfile::TempDir;

    fn archive() -> EnsembleArchive {
        let mut real = VirtualRealization::new("r0", DataStore::new());
        real.put("npv.txt", Value::Integer(3444));
        EnsembleArchive::new("iter-0", BTreeMap::from([(0, real)]))
    }

    #[test]
    fn test_save_load_delete() {
        let temp = TempDir::new().unwrap();
        let manager = ArchiveManager::new(temp.path().join("archives/iter-0.ens"));
        assert!(manager.load().unwrap().is_none());

        let original = archive();
        manager.save(&original).unwrap();
        assert!(manager.exists());
        assert_eq!(manager.load().unwrap(), Some(original));

        manager.delete().unwrap();
        assert!(!manager.exists());
        manager.delete().unwrap();
    }

    #[test]
    fn test_rejects_unknown_version() {
        let temp = TempDir::new().unwrap();
        let manager = ArchiveManager::new(temp.path().join("future.ens"));
        let mut future = archive();
        future.version = ARCHIVE_VERSION + 1;
        manager.save(&future).unwrap();
        assert!(matches!(manager.load(), Err(EnsembleError::ParseError(_))));
    }
}
