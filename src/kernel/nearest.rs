//! Nearest-neighbour kernel.
//!
//! Takes the value of the usable candidate with the smallest weighted
//! separation from the target. Ties go to the candidate seen first.

use crate::error::Result;
use crate::index::improves;
use crate::point::Point;

use super::{Kernel, KernelContext, KernelResult, Neighbourhood};

/// Nearest-neighbour kernel
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestKernel;

impl Kernel for NearestKernel {
    fn name(&self) -> &str {
        "nn"
    }

    fn neighbourhood(&self) -> Neighbourhood {
        Neighbourhood::Nearest
    }

    fn aggregate(
        &self,
        ctx: &KernelContext<'_>,
        target: &Point,
        candidates: &[usize],
    ) -> Result<KernelResult> {
        let mut best: Option<(f64, usize)> = None;
        for &index in candidates {
            let candidate = ctx.point(index);
            if !candidate.is_usable() {
                continue;
            }
            let distance = ctx
                .frame
                .weighted_separation(target.coords(), candidate.coords(), ctx.weights);
            if improves((distance, index), best) {
                best = Some((distance, index));
            }
        }

        Ok(match best {
            Some((_, index)) => KernelResult::valid(ctx.point(index).value(), 1),
            None => KernelResult::invalid(0),
        })
    }
}
