use crate::core::{EnsembleError, Result};
use std::fmt;
use std::str::FromStr;

/// Reduction applied across realizations.
///
/// Percentiles follow the oil-industry convention: `p10` is the value
/// exceeded by 10 % of the realizations, which is the 90th percentile of
/// the distribution. A high `pNN` is therefore the pessimistic side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    Mean,
    Median,
    Min,
    Max,
    Std,
    Percentile(f64),
}

impl Statistic {
    /// Reduces the non-NaN values; `None` when nothing is left (or, for
    /// the sample standard deviation, fewer than two values).
    pub fn reduce(&self, values: &[f64]) -> Option<f64> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len() as f64;

        match self {
            Self::Mean => Some(sorted.iter().sum::<f64>() / n),
            Self::Median => Some(quantile(&sorted, 0.5)),
            Self::Min => sorted.first().copied(),
            Self::Max => sorted.last().copied(),
            Self::Std => {
                if sorted.len() < 2 {
                    return None;
                }
                let mean = sorted.iter().sum::<f64>() / n;
                let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
                Some(variance.sqrt())
            }
            Self::Percentile(p) => Some(quantile(&sorted, 1.0 - p / 100.0)),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Mean => "mean".to_string(),
            Self::Median => "median".to_string(),
            Self::Min => "minimum".to_string(),
            Self::Max => "maximum".to_string(),
            Self::Std => "std".to_string(),
            Self::Percentile(p) => format!("p{}", p),
        }
    }
}

/// Linear interpolation between closest ranks of sorted data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let q = q.clamp(0.0, 1.0);
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

impl FromStr for Statistic {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "min" | "minimum" => Ok(Self::Min),
            "max" | "maximum" => Ok(Self::Max),
            "std" => Ok(Self::Std),
            other => other
                .strip_prefix('p')
                .and_then(|p| p.parse::<f64>().ok())
                .filter(|p| (0.0..=100.0).contains(p))
                .map(Self::Percentile)
                .ok_or_else(|| EnsembleError::ParseError(format!("Unknown statistic '{}'", s))),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
