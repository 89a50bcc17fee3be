//! Box kernel.
//!
//! Reduces every source point inside the separation window of the target,
//! without any geometric enclosure requirement.

use crate::error::{CollocError, Result};
use crate::point::Point;

use super::common::{reduce_candidates, PartialValidity, Reduction};
use super::{Kernel, KernelContext, KernelPlan, KernelResult, Neighbourhood};

/// Window-reduction kernel
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxKernel {
    reduction: Reduction,
    policy: PartialValidity,
}

impl BoxKernel {
    pub fn new(reduction: Reduction, policy: PartialValidity) -> Self {
        Self { reduction, policy }
    }

    /// The configured reduction
    pub fn reduction(&self) -> Reduction {
        self.reduction
    }
}

impl Kernel for BoxKernel {
    fn name(&self) -> &str {
        "box"
    }

    fn neighbourhood(&self) -> Neighbourhood {
        Neighbourhood::Window
    }

    fn check(&self, plan: &KernelPlan<'_>) -> Result<()> {
        if plan.constraints.is_unconstrained() {
            return Err(CollocError::config(
                "The box kernel needs at least one separation constraint",
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
        Ok(reduce_candidates(ctx, candidates, self.reduction, self.policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{SeparationConstraints, SeparationWeights};
    use crate::frame::Frame;
    use crate::point::Dim;

    fn reduce(kernel: BoxKernel, points: &[Point]) -> KernelResult {
        let frame = Frame::new([Dim::Time]).unwrap();
        let weights = SeparationWeights::default();
        let ctx = KernelContext {
            frame: &frame,
            points,
            weights: &weights,
        };
        let candidates: Vec<usize> = (0..points.len()).collect();
        kernel
            .aggregate(&ctx, &Point::coordinates_only(vec![0.0]), &candidates)
            .unwrap()
    }

    #[test]
    fn test_reductions_over_window() {
        let points = vec![
            Point::new(vec![0.0], 2.0, true),
            Point::new(vec![0.5], 8.0, true),
            Point::new(vec![0.7], 4.0, true),
            Point::new(vec![0.9], 100.0, false),
        ];

        assert_eq!(reduce(BoxKernel::default(), &points), KernelResult::valid(14.0 / 3.0, 3));
        assert_eq!(
            reduce(BoxKernel::new(Reduction::Max, PartialValidity::MeanOfValid), &points).value,
            8.0
        );
        assert_eq!(
            reduce(BoxKernel::new(Reduction::Count, PartialValidity::MeanOfValid), &points).value,
            3.0
        );
    }

    #[test]
    fn test_count_of_empty_window_is_zero() {
        let result = reduce(BoxKernel::new(Reduction::Count, PartialValidity::MeanOfValid), &[]);
        assert_eq!(result, KernelResult::valid(0.0, 0));
    }

    #[test]
    fn test_requires_a_constraint() {
        let frame = Frame::new([Dim::Time]).unwrap();
        let none = SeparationConstraints::new();
        let some = SeparationConstraints::new().with_temporal(1.0);
        let plan = KernelPlan {
            frame: &frame,
            constraints: &none,
            source_gridded: false,
            target_gridded: false,
            source_searchable_grid: false,
        };

        assert!(BoxKernel::default().check(&plan).unwrap_err().is_configuration());
        assert!(BoxKernel::default()
            .check(&KernelPlan {
                constraints: &some,
                ..plan
            })
            .is_ok());
    }
}
