//! Calendar grids for resampling summary vectors.

use crate::core::{EnsembleError, Result};
use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    /// The simulator's own report steps.
    Raw,
    Daily,
    Monthly,
    Yearly,
    /// Only the final date.
    Last,
}

impl Frequency {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Last => "last",
        }
    }

    /// Daily, monthly and yearly grids are calendar regular.
    pub fn is_regular(&self) -> bool {
        matches!(self, Self::Daily | Self::Monthly | Self::Yearly)
    }

    /// Latest grid point at or before `t`.
    fn floor(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        let date = t.date();
        let date = match self {
            Self::Daily => Some(date),
            Self::Monthly => date.with_day(1),
            Self::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1),
            Self::Raw | Self::Last => None,
        }?;
        date.and_hms_opt(0, 0, 0)
    }

    fn step(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Self::Daily => t.checked_add_days(Days::new(1)),
            Self::Monthly => t.checked_add_months(Months::new(1)),
            Self::Yearly => t.checked_add_months(Months::new(12)),
            Self::Raw | Self::Last => None,
        }
    }

    /// Earliest grid point at or after `t`.
    fn ceil(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        let floor = self.floor(t)?;
        if floor < t { self.step(floor) } else { Some(floor) }
    }

    /// Grid points inside `[start, end]`. Empty for non-regular frequencies.
    pub fn dates_within(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<NaiveDateTime> {
        match self.ceil(start) {
            Some(first) => self.walk(first, end),
            None => Vec::new(),
        }
    }

    /// Grid points covering `[start, end]`, rounded outward so the first
    /// point is at or before `start` and the last at or after `end`.
    pub fn dates_covering(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<NaiveDateTime> {
        match (self.floor(start), self.ceil(end)) {
            (Some(first), Some(last)) => self.walk(first, last),
            _ => Vec::new(),
        }
    }

    fn walk(&self, first: NaiveDateTime, last: NaiveDateTime) -> Vec<NaiveDateTime> {
        let mut dates = Vec::new();
        let mut current = Some(first);
        while let Some(t) = current
            && t <= last
        {
            dates.push(t);
            current = self.step(t);
        }
        dates
    }
}

impl FromStr for Frequency {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "report" => Ok(Self::Raw),
            "daily" => Ok(Self::Daily),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "last" => Ok(Self::Last),
            other => Err(EnsembleError::UnsupportedOperation(format!(
                "Requested frequency '{}' not supported",
                other
            ))),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Time axis requested for a summary table.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeIndex {
    Frequency(Frequency),
    Custom(Vec<NaiveDateTime>),
}

impl TimeIndex {
    /// Name used in the summary cache key.
    pub fn cache_name(&self) -> &'static str {
        match self {
            Self::Frequency(freq) => freq.name(),
            Self::Custom(_) => "custom",
        }
    }
}

impl Default for TimeIndex {
    fn default() -> Self {
        Self::Frequency(Frequency::Raw)
    }
}

impl From<Frequency> for TimeIndex {
    fn from(freq: Frequency) -> Self {
        Self::Frequency(freq)
    }
}

impl From<Vec<NaiveDateTime>> for TimeIndex {
    fn from(dates: Vec<NaiveDateTime>) -> Self {
        Self::Custom(dates)
    }
}

impl FromStr for TimeIndex {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<Frequency>().map(Self::Frequency)
    }
}

/// Linear interpolation of `(dates, values)` at `targets`.
///
/// Targets outside the sampled range take the nearest end value. `dates`
/// must be ascending and as long as `values`.
pub fn interpolate(dates: &[NaiveDateTime], values: &[f64], targets: &[NaiveDateTime]) -> Vec<f64> {
    targets
        .iter()
        .map(|target| {
            let upper = dates.partition_point(|d| d < target);
            match (upper, dates.get(upper)) {
                (_, Some(d)) if d == target => values[upper],
                (0, Some(_)) => values[0],
                (_, None) => values.last().copied().unwrap_or(f64::NAN),
                (i, Some(right)) => {
                    let left = dates[i - 1];
                    let span = (*right - left).num_seconds() as f64;
                    let offset = (*target - left).num_seconds() as f64;
                    let weight = if span > 0.0 { offset / span } else { 0.0 };
                    values[i - 1] + (values[i] - values[i - 1]) * weight
                }
            }
        })
        .collect()
}
