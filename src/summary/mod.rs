//! Boundary to simulated time series.
//!
//! The core never decodes summary files itself. A [`SummaryProvider`]
//! opens a [`SummarySource`] for a realization and everything downstream
//! works on the tables it materializes.

pub mod columnar;
pub mod provider;
pub mod time_index;

pub use columnar::{ColumnarSource, ColumnarSummaryProvider};
pub use provider::{DATE, SummaryProvider, SummarySource, locate_summary};
pub use time_index::{Frequency, TimeIndex, interpolate};
