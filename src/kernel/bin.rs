//! Binning kernel.
//!
//! Averages every source point that falls inside the target's grid cell.

use crate::error::{CollocError, Result};
use crate::point::Point;

use super::common::{reduce_candidates, PartialValidity, Reduction};
use super::{Kernel, KernelContext, KernelPlan, KernelResult, Neighbourhood};

/// Cell-averaging kernel for gridded targets
#[derive(Debug, Clone, Copy, Default)]
pub struct BinKernel {
    policy: PartialValidity,
}

impl BinKernel {
    pub fn new(policy: PartialValidity) -> Self {
        Self { policy }
    }
}

impl Kernel for BinKernel {
    fn name(&self) -> &str {
        "bin"
    }

    fn neighbourhood(&self) -> Neighbourhood {
        Neighbourhood::Cell
    }

    fn check(&self, plan: &KernelPlan<'_>) -> Result<()> {
        if !plan.target_gridded {
            return Err(CollocError::config(
                "Binning requires a gridded sample to define the cells",
            ));
        }
        Ok(())
    }

    fn aggregate(
        &self,
        ctx: &KernelContext<'_>,
        _target: &Point,
        candidates: &[usize],
    ) -> Result<KernelResult> {
        Ok(reduce_candidates(ctx, candidates, Reduction::Mean, self.policy))
    }
}
