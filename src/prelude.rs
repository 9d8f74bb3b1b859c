//! Everything an application usually needs in one import.

pub use crate::config::{EnsembleConfig, RealizationConfig};
pub use crate::core::{DataValue, EnsembleError, KeyValues, Result, Value};
pub use crate::ensemble::{Ensemble, REAL, RealizationFilter, STATISTIC, VirtualEnsemble};
pub use crate::expression::Statistic;
pub use crate::realization::{FileFormat, Realization, RealizationStore, VirtualRealization};
pub use crate::storage::{FileMetadata, Table};
pub use crate::summary::{DATE, Frequency, SummaryProvider, SummarySource, TimeIndex};
