use crate::core::{EnsembleError, Result};
use crate::parser::StatusTimelineBuilder;
use crate::summary::{ColumnarSummaryProvider, SummaryProvider};
use regex::Regex;
use std::sync::Arc;

/// Environment variable read by [`EnsembleConfig::from_env`].
pub const CONCURRENCY_ENV: &str = "ENSEMBLE_CONCURRENCY";

/// File layout of one realization directory
///
/// Every name is relative to the realization root.
#[derive(Debug, Clone)]
pub struct RealizationConfig {
    /// Status log; a realization cannot be opened without it
    pub status_file: String,

    /// Optional structured job description
    pub jobs_file: String,

    /// Success marker written when every job finished
    pub ok_file: String,

    /// Optional `<key> <value>` parameter file
    pub parameters_file: String,

    /// Extracts the realization index from a path (first capture group)
    pub index_pattern: Regex,

    /// Where to look for a summary file when none is registered
    pub summary_glob: String,

    pub summary_provider: Arc<dyn SummaryProvider>,

    pub timeline: StatusTimelineBuilder,
}

impl RealizationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_file(mut self, name: &str) -> Self {
        self.status_file = name.to_string();
        self
    }

    pub fn jobs_file(mut self, name: &str) -> Self {
        self.jobs_file = name.to_string();
        self
    }

    pub fn ok_file(mut self, name: &str) -> Self {
        self.ok_file = name.to_string();
        self
    }

    pub fn parameters_file(mut self, name: &str) -> Self {
        self.parameters_file = name.to_string();
        self
    }

    /// Set the index pattern. It must have at least one capture group.
    pub fn index_pattern(mut self, pattern: &str) -> Result<Self> {
        self.index_pattern = Regex::new(pattern)?;
        self.validate()?;
        Ok(self)
    }

    pub fn summary_glob(mut self, glob: &str) -> Self {
        self.summary_glob = glob.to_string();
        self
    }

    pub fn summary_provider(mut self, provider: Arc<dyn SummaryProvider>) -> Self {
        self.summary_provider = provider;
        self
    }

    pub fn timeline(mut self, builder: StatusTimelineBuilder) -> Self {
        self.timeline = builder;
        self
    }

    /// Realization index encoded in `path`, if the pattern matches.
    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.index_pattern
            .captures(path)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    pub fn validate(&self) -> Result<()> {
        if self.index_pattern.captures_len() < 2 {
            return Err(EnsembleError::InvalidPattern(format!(
                "index pattern '{}' has no capture group",
                self.index_pattern.as_str()
            )));
        }
        let names = [
            &self.status_file,
            &self.jobs_file,
            &self.ok_file,
            &self.parameters_file,
            &self.summary_glob,
        ];
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(EnsembleError::UnsupportedOperation(
                "realization file names must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RealizationConfig {
    fn default() -> Self {
        Self {
            status_file: "STATUS".to_string(),
            jobs_file: "jobs.json".to_string(),
            ok_file: "OK".to_string(),
            parameters_file: "parameters.txt".to_string(),
            index_pattern: default_index_pattern(),
            summary_glob: "eclipse/model/*.UNSMRY".to_string(),
            summary_provider: Arc::new(ColumnarSummaryProvider::default()),
            timeline: StatusTimelineBuilder::default(),
        }
    }
}

fn default_index_pattern() -> Regex {
    lazy_static::lazy_static! {
        static ref INDEX_PATTERN: Regex = Regex::new(r".*realization-(\d+)")
            .unwrap_or_else(|_| unreachable!("static pattern is valid"));
    }
    INDEX_PATTERN.clone()
}

/// Ensemble-wide settings
#[derive(Debug, Clone)]
pub struct EnsembleConfig {
    pub realization: RealizationConfig,

    /// Worker threads used to open members; 1 means sequential
    pub concurrency: usize,
}

impl EnsembleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with the worker count taken from
    /// `ENSEMBLE_CONCURRENCY`: "0" or "false" runs sequentially, a
    /// positive integer sets the worker count, anything else (or no
    /// value) uses the available parallelism.
    pub fn from_env() -> Self {
        let raw = std::env::var(CONCURRENCY_ENV).ok();
        Self::default().concurrency(parse_concurrency(raw.as_deref()))
    }

    pub fn realization(mut self, config: RealizationConfig) -> Self {
        self.realization = config;
        self
    }

    /// Set the worker count; zero is treated as one
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers.max(1);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.realization.validate()
    }
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            realization: RealizationConfig::default(),
            concurrency: available_workers(),
        }
    }
}

fn available_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

fn parse_concurrency(raw: Option<&str>) -> usize {
    match raw.map(|s| s.trim().to_ascii_lowercase()) {
        Some(s) if s == "0" || s == "false" => 1,
        Some(s) => match s.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => available_workers(),
        },
        None => available_workers(),
    }
}
