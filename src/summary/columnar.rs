//! Summary vectors exported as comma separated columns.
//!
//! ```text
//! DATE,FOPT,FOPR,WOPR:OP_1
//! 2000-01-01,0,0,0
//! 2000-02-01,31000,1000,500
//! ```
//!
//! The export is stored under the summary file name of the realization,
//! so the default location glob finds it like a binary summary file.

use super::provider::{DATE, SummaryProvider, SummarySource};
use super::time_index::interpolate;
use crate::core::{EnsembleError, Result, Value, parse_timestamp};
use crate::parser::parse_table;
use crate::storage::Table;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{Level, event};

#[derive(Debug, Clone)]
pub struct ColumnarSummaryProvider {
    file_type: String,
}

impl ColumnarSummaryProvider {
    pub fn new(file_type: &str) -> Self {
        Self {
            file_type: file_type.to_string(),
        }
    }
}

impl Default for ColumnarSummaryProvider {
    fn default() -> Self {
        Self::new("UNSMRY")
    }
}

impl SummaryProvider for ColumnarSummaryProvider {
    fn file_type(&self) -> &str {
        &self.file_type
    }

    fn open(&self, path: &Path) -> Option<Box<dyn SummarySource>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                event!(Level::WARN, path = %path.display(), error = %err, "cannot read summary file");
                return None;
            }
        };
        match ColumnarSource::parse(&bytes) {
            Ok(source) => Some(Box::new(source)),
            Err(err) => {
                event!(Level::WARN, path = %path.display(), error = %err, "failed to create summary source");
                None
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnarSource {
    dates: Vec<NaiveDateTime>,
    vectors: BTreeMap<String, Vec<f64>>,
}

impl ColumnarSource {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let table = parse_table(bytes, true)?
            .ok_or_else(|| EnsembleError::ParseError("summary export is empty".into()))?;
        let date_column = table
            .column(DATE)
            .ok_or_else(|| EnsembleError::ParseError(format!("summary export has no {} column", DATE)))?;

        let mut dates = Vec::with_capacity(table.row_count());
        for cell in date_column {
            let date = match cell {
                Value::Timestamp(t) => Some(*t),
                Value::Text(s) => parse_timestamp(s),
                _ => None,
            }
            .ok_or_else(|| EnsembleError::ParseError(format!("invalid summary date '{}'", cell)))?;
            dates.push(date);
        }

        // Rows are read in date order whatever order the export uses.
        let mut order: Vec<usize> = (0..dates.len()).collect();
        order.sort_by_key(|&i| dates[i]);

        let mut vectors = BTreeMap::new();
        for name in table.columns().iter().filter(|c| c.as_str() != DATE) {
            let values: Vec<f64> = match table.column(name) {
                Some(cells) => cells.map(|v| v.as_f64().unwrap_or(f64::NAN)).collect(),
                None => continue,
            };
            vectors.insert(name.clone(), order.iter().map(|&i| values[i]).collect());
        }
        let dates = order.iter().map(|&i| dates[i]).collect();
        Ok(Self { dates, vectors })
    }
}

impl SummarySource for ColumnarSource {
    fn keys(&self) -> Vec<String> {
        self.vectors.keys().cloned().collect()
    }

    fn dates(&self) -> &[NaiveDateTime] {
        &self.dates
    }

    fn frame(&self, keys: &[String], time_index: Option<&[NaiveDateTime]>) -> Result<Table> {
        let dates = time_index.unwrap_or(&self.dates);
        let mut columns: Vec<(String, Vec<Value>)> = Vec::with_capacity(keys.len() + 1);
        columns.push((DATE.to_string(), dates.iter().map(|d| Value::Timestamp(*d)).collect()));

        for key in keys {
            let raw = self
                .vectors
                .get(key)
                .ok_or_else(|| EnsembleError::KeyNotFound(key.clone()))?;
            let values = match time_index {
                Some(targets) => interpolate(&self.dates, raw, targets),
                None => raw.clone(),
            };
            columns.push((key.clone(), values.into_iter().map(Value::Float).collect()));
        }
        Table::from_columns(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const EXPORT: &str = "\
DATE,FOPT,FOPR
2000-03-01,2000,100
2000-01-01,0,0
2000-02-01,1000,50
";

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_sorts_by_date() {
        let source = ColumnarSource::parse(EXPORT.as_bytes()).unwrap();
        assert_eq!(source.start_date(), Some(at(2000, 1, 1)));
        assert_eq!(source.end_date(), Some(at(2000, 3, 1)));
        assert_eq!(source.keys(), vec!["FOPR", "FOPT"]);
        assert_eq!(source.matching_keys(&["FOPT".to_string()]).unwrap(), vec!["FOPT"]);
    }

    #[test]
    fn test_frame_raw_and_resampled() {
        let source = ColumnarSource::parse(EXPORT.as_bytes()).unwrap();
        let keys = vec!["FOPT".to_string()];

        let raw = source.frame(&keys, None).unwrap();
        assert_eq!(raw.columns(), &[DATE, "FOPT"]);
        assert_eq!(raw.row_count(), 3);
        assert_eq!(raw.value(1, "FOPT").unwrap().as_f64(), Some(1000.0));

        let targets = [at(2000, 3, 1)];
        let last = source.frame(&keys, Some(&targets)).unwrap();
        assert_eq!(last.row_count(), 1);
        assert_eq!(last.value(0, "FOPT").unwrap().as_f64(), Some(2000.0));

        assert!(source.frame(&["NOPE".to_string()], None).is_err());
    }

    #[test]
    fn test_missing_date_column() {
        assert!(ColumnarSource::parse(b"FOPT\n1\n").is_err());
        let provider = ColumnarSummaryProvider::default();
        assert!(provider.open(Path::new("/nonexistent/MODEL.UNSMRY")).is_none());
    }
}
