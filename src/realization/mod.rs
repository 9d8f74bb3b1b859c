//! Single realizations: the file-backed store and its in-memory snapshot.

pub mod scratch;
pub mod virtual_realization;

pub use scratch::{FileFormat, RealizationStore};
pub use virtual_realization::VirtualRealization;

use crate::core::{DataValue, Result};
use crate::storage::DataStore;

/// Cache key prefix of resampled summary tables.
pub const SUMMARY_KEY_PREFIX: &str = "share/results/tables/unsmry-";

pub fn summary_cache_key(grid: &str) -> String {
    format!("{}{}.csv", SUMMARY_KEY_PREFIX, grid)
}

/// Keyed read access shared by scratch and virtual realizations.
pub trait Realization {
    fn data(&self) -> &DataStore;

    /// Looks up `key`, accepting unambiguous shorthand.
    fn get(&self, key: &str) -> Result<&DataValue> {
        self.data().get(key)
    }

    fn keys(&self) -> Vec<String> {
        self.data().keys().map(str::to_string).collect()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.data().contains_key(key)
    }
}
