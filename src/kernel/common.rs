//! Shared pieces of the averaging kernels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CollocError;

use super::{KernelContext, KernelResult};

/// How an aggregate treats candidates that are masked or undefined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialValidity {
    /// Aggregate the valid subset; invalid only if nothing is valid
    #[default]
    MeanOfValid,
    /// Any unusable candidate makes the result invalid
    InvalidIfAnyMissing,
}

/// Function reducing a set of values to one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    #[default]
    Mean,
    Median,
    Min,
    Max,
    /// Sample standard deviation (n - 1)
    #[serde(alias = "std_dev")]
    StdDev,
    Count,
}

impl Reduction {
    /// Reduce the values; `None` when the reduction is undefined for them
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        let n = values.len() as f64;
        match self {
            Reduction::Count => Some(n),
            _ if values.is_empty() => None,
            Reduction::Mean => Some(values.iter().sum::<f64>() / n),
            Reduction::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Some(sorted[mid])
                }
            }
            Reduction::Min => values.iter().copied().reduce(f64::min),
            Reduction::Max => values.iter().copied().reduce(f64::max),
            Reduction::StdDev => {
                if values.len() < 2 {
                    return None;
                }
                let mean = values.iter().sum::<f64>() / n;
                let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
                Some((sum_sq / (n - 1.0)).sqrt())
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Reduction::Mean => "mean",
            Reduction::Median => "median",
            Reduction::Min => "min",
            Reduction::Max => "max",
            Reduction::StdDev => "stddev",
            Reduction::Count => "count",
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Reduction {
    type Err = CollocError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mean" | "avg" | "average" => Ok(Reduction::Mean),
            "median" => Ok(Reduction::Median),
            "min" => Ok(Reduction::Min),
            "max" => Ok(Reduction::Max),
            "stddev" | "std_dev" | "std" => Ok(Reduction::StdDev),
            "count" | "num" => Ok(Reduction::Count),
            _ => Err(CollocError::config(format!(
                "Unknown reduction: {}. Must be one of: mean, median, min, max, stddev, count",
                s
            ))),
        }
    }
}

/// Values of the usable candidates, and how many candidates were unusable
pub fn usable_values(ctx: &KernelContext<'_>, candidates: &[usize]) -> (Vec<f64>, usize) {
    let mut values = Vec::with_capacity(candidates.len());
    let mut missing = 0;
    for &index in candidates {
        let point = ctx.point(index);
        if point.is_usable() {
            values.push(point.value());
        } else {
            missing += 1;
        }
    }
    (values, missing)
}

/// Reduce the candidates under a partial-validity policy
pub fn reduce_candidates(
    ctx: &KernelContext<'_>,
    candidates: &[usize],
    reduction: Reduction,
    policy: PartialValidity,
) -> KernelResult {
    let (values, missing) = usable_values(ctx, candidates);
    if policy == PartialValidity::InvalidIfAnyMissing && missing > 0 {
        return KernelResult::invalid(values.len());
    }
    KernelResult::from_option(reduction.apply(&values), values.len())
}
