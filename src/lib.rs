// ============================================================================
// EnsembleDB Library
// ============================================================================

//! File-backed realization stores and ensemble aggregation.
//!
//! A [`RealizationStore`] caches files from one simulation run directory
//! and hands out parsed tables and key-value mappings. An [`Ensemble`]
//! groups many of them and combines their data into tables tagged with
//! the realization index (REAL). Both can be detached from disk into
//! virtual counterparts.
//!
//! ```no_run
//! use ensembledb::prelude::*;
//!
//! # fn main() -> ensembledb::Result<()> {
//! let mut ensemble = Ensemble::from_paths("iter-0", &["/scratch/field/realization-*/iter-0"])?;
//! let volumes = ensemble.load_table("share/results/volumes/simulator_volume_fipnum.csv", true, false)?;
//! println!("{}", volumes);
//!
//! let stats = ensemble.summary_stats(&["FOPT".to_string()], &Frequency::Yearly.into(), &[])?;
//! println!("{}", stats);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod ensemble;
pub mod expression;
pub mod parser;
pub mod prelude;
pub mod realization;
pub mod storage;
pub mod summary;

// Re-export main types for convenience
pub use config::{EnsembleConfig, RealizationConfig};
pub use core::{DataType, DataValue, EnsembleError, KeyValues, Result, Value};
pub use ensemble::{Ensemble, RealizationFilter, VirtualEnsemble};
pub use realization::{FileFormat, Realization, RealizationStore, VirtualRealization};
pub use storage::Table;
