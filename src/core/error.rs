use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnsembleError {
    /// A file the realization cannot exist without is missing.
    #[error("Invalid realization: {0}")]
    Structural(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Key '{0}' not found")]
    KeyNotFound(String),

    #[error("Realization {0} not found")]
    RealizationNotFound(usize),

    #[error("Ambiguous key '{key}', candidates: {}", candidates.join(", "))]
    AmbiguousKey {
        key: String,
        candidates: Vec<String>,
    },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, EnsembleError>;

impl From<std::io::Error> for EnsembleError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<csv::Error> for EnsembleError {
    fn from(err: csv::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<serde_json::Error> for EnsembleError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<regex::Error> for EnsembleError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidPattern(err.to_string())
    }
}

impl From<glob::PatternError> for EnsembleError {
    fn from(err: glob::PatternError) -> Self {
        Self::InvalidPattern(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for EnsembleError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::IoError(format!("Failed to serialize archive: {}", err))
    }
}

impl From<rmp_serde::decode::Error> for EnsembleError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::ParseError(format!("Failed to deserialize archive: {}", err))
    }
}
