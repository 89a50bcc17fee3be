//! Folding per-point kernel results into the output dataset.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::constraint::SeparationConstraints;
use crate::data::{CommonData, DataView, Dataset, VariableMeta};
use crate::error::{CollocError, Result};
use crate::kernel::KernelResult;

/// Result of one target point after fill-value handling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub result: KernelResult,
    pub filled: bool,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            result: KernelResult::invalid(0),
            filled: false,
        }
    }
}

impl Slot {
    /// Apply the fill value to an invalid result
    pub fn new(result: KernelResult, fill_value: Option<f64>) -> Self {
        match fill_value {
            Some(fill) if !result.valid => Self {
                result: KernelResult {
                    value: fill,
                    valid: true,
                    count: result.count,
                },
                filled: true,
            },
            _ => Self {
                result,
                filled: false,
            },
        }
    }
}

/// Outcome counts of a collocation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollocationSummary {
    /// Target points processed
    pub points: usize,
    /// Points with a computed value
    pub valid: usize,
    /// Points without a value (fill values count as invalid here)
    pub invalid: usize,
    /// Invalid points replaced by the fill value
    pub filled: usize,
    /// Points for which no source point contributed
    pub empty: usize,
}

impl CollocationSummary {
    fn from_slots(slots: &[Slot]) -> Self {
        let mut summary = Self {
            points: slots.len(),
            ..Self::default()
        };
        for slot in slots {
            if slot.filled {
                summary.filled += 1;
                summary.invalid += 1;
            } else if slot.result.valid {
                summary.valid += 1;
            } else {
                summary.invalid += 1;
            }
            if slot.result.count == 0 {
                summary.empty += 1;
            }
        }
        summary
    }

    /// Share of target points without a computed value
    pub fn invalid_fraction(&self) -> f64 {
        if self.points == 0 {
            0.0
        } else {
            self.invalid as f64 / self.points as f64
        }
    }
}

/// The output of a collocation run
#[derive(Debug, Clone, PartialEq)]
pub struct Collocated {
    /// Result values, shaped like the target
    pub data: Dataset,
    pub summary: CollocationSummary,
    /// Number of contributing source points per target point
    pub counts: Vec<usize>,
}

impl Collocated {
    /// Companion dataset holding the contributing counts, `<var_name>_num_points`
    pub fn count_dataset(&self) -> Result<Dataset> {
        let var_name = self.data.var_name();
        let mut meta = VariableMeta::new(format!("{}_num_points", var_name))
            .with_long_name(format!(
                "Number of points used to calculate the value of {}",
                var_name
            ))
            .with_units("1")
            .with_filenames(self.data.filenames().to_vec());
        meta.history = self.data.history().to_string();

        let values = self.counts.iter().map(|c| *c as f64).collect();
        self.data
            .view()
            .with_values(meta, values, vec![false; self.counts.len()])
    }

    /// Fail when more than `max_fraction` of the target points have no value
    pub fn check_tolerance(&self, max_fraction: f64) -> Result<()> {
        let fraction = self.summary.invalid_fraction();
        if fraction > max_fraction {
            return Err(CollocError::InsufficientData {
                message: format!(
                    "{} of {} points ({:.1}%) could not be collocated, above the tolerated {:.1}%",
                    self.summary.invalid,
                    self.summary.points,
                    fraction * 100.0,
                    max_fraction * 100.0
                ),
            });
        }
        Ok(())
    }
}

/// Describe the run for the output history
pub fn history_note(
    kernel: &str,
    constraints: &SeparationConstraints,
    source: &VariableMeta,
    target: &VariableMeta,
) -> String {
    let files = |meta: &VariableMeta| {
        if meta.filenames.is_empty() {
            "<memory>".to_string()
        } else {
            meta.filenames.join(", ")
        }
    };
    format!(
        "{} Collocated {} from {} onto the sampling of {} from {} using kernel '{}' ({})",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        source.var_name,
        files(source),
        target.var_name,
        files(target),
        kernel,
        constraints
    )
}

/// Build the output dataset, shaped like `target`
pub fn assemble(target: DataView<'_>, mut meta: VariableMeta, note: &str, slots: &[Slot]) -> Result<Collocated> {
    meta.add_history(note);

    let values = slots
        .iter()
        .map(|s| if s.result.valid { s.result.value } else { f64::NAN })
        .collect();
    let mask = slots.iter().map(|s| !s.result.valid).collect();
    let data = target.with_values(meta, values, mask)?;

    Ok(Collocated {
        data,
        summary: CollocationSummary::from_slots(slots),
        counts: slots.iter().map(|s| s.result.count).collect(),
    })
}
