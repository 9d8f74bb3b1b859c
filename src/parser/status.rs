//! Per-job execution timeline from a realization's status log.
//!
//! The log has one header line followed by one line per job:
//!
//! ```text
//! MAKE_DIRECTORY                  : 15:56:40 .... 15:56:40
//! ECLIPSE100_2014.2               : 16:01:04 .... 16:04:19
//! ```
//!
//! An unfinished job has no end time and gets a NaN duration.
//!
//! Known limitation: durations are time-of-day differences. An end time
//! earlier than the start time counts as crossing one midnight, so any
//! job running longer than 24 hours reports a wrong duration. There is
//! no date in the log to detect this.

use crate::core::{Result, Row, Value};
use crate::storage::Table;
use chrono::NaiveTime;
use serde_json::Value as JsonValue;
use tracing::{Level, event};

pub const JOBINDEX: &str = "JOBINDEX";
pub const FORWARD_MODEL: &str = "FORWARD_MODEL";
pub const STARTTIME: &str = "STARTTIME";
pub const ENDTIME: &str = "ENDTIME";
pub const DURATION: &str = "DURATION";

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct StatusTimelineBuilder {
    /// `(first token, second token)` pairs of lines that are queue system
    /// artifacts rather than jobs.
    junk: Vec<(String, String)>,
}

impl Default for StatusTimelineBuilder {
    fn default() -> Self {
        Self {
            junk: vec![("LSF".to_string(), "JOBID:".to_string())],
        }
    }
}

impl StatusTimelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn junk_line(mut self, first: &str, second: &str) -> Self {
        self.junk.push((first.to_string(), second.to_string()));
        self
    }

    /// Builds the timeline, outer-joined with the job list of the
    /// `jobs` sidecar when one is given. A sidecar that cannot be used is
    /// logged and ignored.
    pub fn build(&self, status: &[u8], jobs: Option<&[u8]>) -> Result<Table> {
        let mut timeline = self.parse_status(status)?;
        if let Some(jobs) = jobs {
            match parse_job_list(jobs) {
                Ok(job_table) => timeline = timeline.outer_join(&job_table, JOBINDEX)?,
                Err(reason) => {
                    event!(Level::WARN, %reason, "ignoring unusable job description sidecar");
                }
            }
        }
        timeline.sort_by_column(JOBINDEX)?;
        Ok(timeline)
    }

    fn parse_status(&self, status: &[u8]) -> Result<Table> {
        let text = String::from_utf8_lossy(status);
        let mut table = Table::with_columns([JOBINDEX, FORWARD_MODEL, STARTTIME, ENDTIME, DURATION]);
        let mut jobindex: i64 = 0;

        for (lineno, line) in text.lines().enumerate().skip(1) {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() > 5 {
                event!(Level::WARN, line = lineno + 1, "skipping unparseable status line");
                continue;
            }
            if self.is_junk(&tokens) {
                continue;
            }

            let start = tokens.get(2).copied();
            let end = tokens.get(4).copied();
            let row: Row = vec![
                Value::Integer(jobindex),
                Value::from(tokens[0]),
                start.map_or(Value::Null, Value::from),
                end.map_or(Value::Null, Value::from),
                Value::Float(duration(start, end, lineno + 1)),
            ];
            table.push_row(row)?;
            jobindex += 1;
        }
        Ok(table)
    }

    fn is_junk(&self, tokens: &[&str]) -> bool {
        let second = tokens.get(1).copied().unwrap_or_default();
        self.junk.iter().any(|(a, b)| tokens[0] == a && second == b)
    }
}

/// Seconds from `start` to `end`, wrapping once past midnight.
fn duration(start: Option<&str>, end: Option<&str>, lineno: usize) -> f64 {
    let (Some(start), Some(end)) = (start, end) else {
        return f64::NAN;
    };
    match (parse_clock(start), parse_clock(end)) {
        (Some(start), Some(end)) => {
            let seconds = (end - start).num_seconds().rem_euclid(SECONDS_PER_DAY);
            seconds as f64
        }
        _ => {
            event!(Level::WARN, line = lineno, start, end, "unparseable job times");
            f64::NAN
        }
    }
}

fn parse_clock(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S").ok()
}

/// Table of the sidecar's `jobList`, with JOBINDEX set from list position.
fn parse_job_list(bytes: &[u8]) -> std::result::Result<Table, String> {
    let document: JsonValue = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    let jobs = document
        .get("jobList")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| "missing jobList array".to_string())?;

    let mut columns: Vec<String> = vec![JOBINDEX.to_string()];
    for job in jobs {
        let fields = job
            .as_object()
            .ok_or_else(|| "jobList entries must be objects".to_string())?;
        for key in fields.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut table = Table::with_columns(columns.clone());
    for (index, job) in jobs.iter().enumerate() {
        let mut row: Row = vec![Value::from(index)];
        row.extend(
            columns[1..]
                .iter()
                .map(|c| job.get(c).map_or(Value::Null, json_to_value)),
        );
        table.push_row(row).map_err(|e| e.to_string())?;
    }
    Ok(table)
}

fn json_to_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Float))
            .unwrap_or(Value::Null),
        JsonValue::String(s) => Value::Text(s.clone()),
        // Complex types are kept as their JSON text
        JsonValue::Array(_) | JsonValue::Object(_) => Value::Text(value.to_string()),
    }
}
