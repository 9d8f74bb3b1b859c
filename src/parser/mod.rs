//! Stateless parsers turning raw file bytes into cache values.

pub mod tabular;
pub mod keyvalue;
pub mod status;

pub use tabular::parse_table;
pub use keyvalue::{parse_keyvalue, parse_scalar};
pub use status::StatusTimelineBuilder;
