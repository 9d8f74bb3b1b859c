pub mod aggregate;
pub mod pattern;

pub use aggregate::Statistic;
pub use pattern::{filter_names, matches_wildcard};
