//! Multilinear interpolation kernel.
//!
//! Interpolates between the corners of the source grid cell enclosing the
//! target. Every frame dimension needs a bracketing pair (or an exact hit);
//! targets outside the grid are never extrapolated and yield an invalid value,
//! as does any unusable corner that carries weight.

use crate::error::{CollocError, Result};
use crate::geo;
use crate::point::Point;

use super::{Kernel, KernelContext, KernelPlan, KernelResult, Neighbourhood};

/// Tolerance when matching candidate offsets against the bracketing offsets
const OFFSET_TOLERANCE: f64 = 1e-9;

/// Linear interpolation kernel
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearKernel;

/// Bracketing offsets of the candidates along one frame axis
#[derive(Debug, Clone, Copy)]
struct Bracket {
    lower: f64,
    upper: f64,
}

impl Bracket {
    /// Weight of the lower and upper side
    fn weights(&self) -> (f64, f64) {
        let span = self.upper - self.lower;
        if span <= 0.0 {
            (1.0, 0.0)
        } else {
            let t = -self.lower / span;
            (1.0 - t, t)
        }
    }
}

fn same_offset(a: f64, b: f64) -> bool {
    (a - b).abs() <= OFFSET_TOLERANCE * (1.0 + a.abs().max(b.abs()))
}

impl LinearKernel {
    /// Signed offset of `candidate` from `target` along each frame axis
    fn offsets(ctx: &KernelContext<'_>, target: &Point, candidate: &Point) -> Vec<f64> {
        (0..ctx.frame.len())
            .map(|axis| {
                if Some(axis) == ctx.frame.longitude() {
                    geo::signed_longitude_difference(target.coord(axis), candidate.coord(axis))
                } else {
                    candidate.coord(axis) - target.coord(axis)
                }
            })
            .collect()
    }
}

impl Kernel for LinearKernel {
    fn name(&self) -> &str {
        "lin"
    }

    fn neighbourhood(&self) -> Neighbourhood {
        Neighbourhood::Enclosing
    }

    fn check(&self, plan: &KernelPlan<'_>) -> Result<()> {
        if !plan.source_gridded {
            return Err(CollocError::config(
                "Linear interpolation requires a gridded source",
            ));
        }
        if !plan.source_searchable_grid {
            return Err(CollocError::config(
                "Linear interpolation requires monotonic source axes that are all present in the sample",
            ));
        }
        Ok(())
    }

    fn aggregate(
        &self,
        ctx: &KernelContext<'_>,
        target: &Point,
        candidates: &[usize],
    ) -> Result<KernelResult> {
        let dims = ctx.frame.len();
        if candidates.is_empty() {
            return Ok(KernelResult::invalid(0));
        }

        let offsets: Vec<Vec<f64>> = candidates
            .iter()
            .map(|&i| Self::offsets(ctx, target, ctx.point(i)))
            .collect();

        let mut brackets = Vec::with_capacity(dims);
        for axis in 0..dims {
            let lower = offsets
                .iter()
                .map(|o| o[axis])
                .filter(|o| *o <= 0.0)
                .reduce(f64::max);
            let upper = offsets
                .iter()
                .map(|o| o[axis])
                .filter(|o| *o >= 0.0)
                .reduce(f64::min);
            match (lower, upper) {
                (Some(lower), Some(upper)) => brackets.push(Bracket { lower, upper }),
                // no bracketing pair along this axis
                _ => return Ok(KernelResult::invalid(0)),
            }
        }

        let mut total = 0.0;
        let mut weight_sum = 0.0;
        let mut used = 0;

        // walk the 2^dims corners; bit k selects the upper side of axis k
        for corner in 0..(1usize << dims) {
            let mut weight = 1.0;
            let mut wanted = Vec::with_capacity(dims);
            for (axis, bracket) in brackets.iter().enumerate() {
                let (w_lower, w_upper) = bracket.weights();
                if corner & (1 << axis) == 0 {
                    weight *= w_lower;
                    wanted.push(bracket.lower);
                } else {
                    weight *= w_upper;
                    wanted.push(bracket.upper);
                }
            }
            if weight <= 0.0 {
                continue;
            }

            let found = offsets.iter().position(|o| {
                o.iter().zip(&wanted).all(|(a, b)| same_offset(*a, *b))
            });
            let point = match found {
                Some(position) => ctx.point(candidates[position]),
                None => return Ok(KernelResult::invalid(used)),
            };
            if !point.is_usable() {
                return Ok(KernelResult::invalid(used));
            }

            total += weight * point.value();
            weight_sum += weight;
            used += 1;
        }

        if weight_sum <= 0.0 {
            return Ok(KernelResult::invalid(used));
        }
        Ok(KernelResult::valid(total / weight_sum, used))
    }
}
