//! Options controlling a collocation run.

use serde::{Deserialize, Serialize};

use crate::constraint::{SeparationConstraints, SeparationWeights};
use crate::data::VariableMeta;
use crate::error::{CollocError, Result};
use crate::kernel::{KernelParams, PartialValidity, Reduction};

/// Everything a caller can configure about one collocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollocationOptions {
    /// Kernel name, looked up in the kernel registry
    pub kernel: String,

    /// Maximum separations
    #[serde(flatten)]
    pub constraints: SeparationConstraints,

    /// A sample point whose own value is missing yields a missing result
    pub missing_data_for_missing_sample: bool,

    /// Value written, and marked valid, wherever no result could be computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<f64>,

    /// Treatment of missing candidates by the averaging kernels
    pub partial_validity: PartialValidity,

    /// Nearest-neighbour ranking weights
    pub weights: SeparationWeights,

    /// Reduction used by the box kernel
    pub reduction: Reduction,

    /// Naming of the output variable
    #[serde(flatten)]
    pub naming: OutputNaming,
}

impl Default for CollocationOptions {
    fn default() -> Self {
        Self {
            kernel: "nn".to_string(),
            constraints: SeparationConstraints::default(),
            missing_data_for_missing_sample: true,
            fill_value: None,
            partial_validity: PartialValidity::default(),
            weights: SeparationWeights::default(),
            reduction: Reduction::default(),
            naming: OutputNaming::default(),
        }
    }
}

impl CollocationOptions {
    /// Default options using the named kernel
    pub fn new(kernel: impl Into<String>) -> Self {
        Self {
            kernel: kernel.into(),
            ..Self::default()
        }
    }

    pub fn with_constraints(mut self, constraints: SeparationConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    pub fn with_missing_data_for_missing_sample(mut self, enabled: bool) -> Self {
        self.missing_data_for_missing_sample = enabled;
        self
    }

    pub fn with_partial_validity(mut self, policy: PartialValidity) -> Self {
        self.partial_validity = policy;
        self
    }

    pub fn with_weights(mut self, weights: SeparationWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn with_var_name(mut self, var_name: impl Into<String>) -> Self {
        self.naming.var_name = Some(var_name.into());
        self
    }

    /// Settings handed to the kernel factory
    pub fn kernel_params(&self) -> KernelParams {
        KernelParams {
            reduction: self.reduction,
            partial_validity: self.partial_validity,
        }
    }

    /// Fail fast on malformed options
    pub fn validate(&self) -> Result<()> {
        if self.kernel.trim().is_empty() {
            return Err(CollocError::config("No kernel was given"));
        }
        self.constraints.validate()?;
        self.weights.validate()?;
        if let Some(fill) = self.fill_value {
            if fill.is_nan() {
                return Err(CollocError::config("The fill value must be a number"));
            }
        }
        if matches!(self.naming.var_name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(CollocError::config("The output variable name cannot be empty"));
        }
        Ok(())
    }
}

/// Requested naming of the output variable; unset fields follow the source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputNaming {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_long_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_units: Option<String>,
}

impl OutputNaming {
    /// Output metadata, defaulting from the source variable
    pub fn resolve(&self, source: &VariableMeta) -> Result<VariableMeta> {
        let var_name = self
            .var_name
            .clone()
            .unwrap_or_else(|| source.var_name.clone());
        if var_name.trim().is_empty() {
            return Err(CollocError::config(
                "The output variable has no name; set var_name",
            ));
        }

        Ok(VariableMeta {
            var_name,
            long_name: self.var_long_name.clone().or_else(|| source.long_name.clone()),
            units: self.var_units.clone().or_else(|| source.units.clone()),
            alias: None,
            history: source.history.clone(),
            filenames: source.filenames.clone(),
        })
    }
}
