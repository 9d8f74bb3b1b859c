pub mod error;
pub mod types;
pub mod value;

pub use error::{EnsembleError, Result};
pub use types::{DataValue, KeyValues, Row};
pub use value::{DataType, Value, collapse_float, parse_number, parse_timestamp};
