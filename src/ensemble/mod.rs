//! Collections of realizations and their REAL-tagged combined views.

pub mod combine;
pub mod filter;
pub mod scratch;
pub mod virtual_ensemble;

pub use combine::REAL;
pub use filter::RealizationFilter;
pub use scratch::{Ensemble, STATISTIC};
pub use virtual_ensemble::VirtualEnsemble;
