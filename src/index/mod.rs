//! Spatial/temporal indexes over source points.
//!
//! Scattered sources are searched through a balanced k-d tree; gridded sources
//! with monotonic axes compute candidate cells directly from their axis
//! coordinates. Both answer window queries (every point inside a per-axis
//! window, in source order) and nearest-neighbour queries.

pub mod grid;
pub mod kdtree;

use tracing::debug;

use crate::constraint::SeparationWeights;
use crate::frame::Frame;
use crate::geo;
use crate::point::{Dim, Point};

pub use grid::GridIndex;
pub use kdtree::KdTree;

/// Inclusive interval of canonical coordinate values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    /// Create an interval
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Interval of half-width `radius` around `centre`
    pub fn around(centre: f64, radius: f64) -> Self {
        Self::new(centre - radius, centre + radius)
    }

    /// The whole real line
    pub fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Whether `value` lies inside
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }

    /// Whether the interval overlaps `[lo, hi]`
    pub fn overlaps(&self, lo: f64, hi: f64) -> bool {
        self.lo <= hi && self.hi >= lo
    }

    /// Whether the interval spans the whole real line
    pub fn is_unbounded(&self) -> bool {
        self.lo == f64::NEG_INFINITY && self.hi == f64::INFINITY
    }
}

/// Per-axis search window in frame coordinates.
///
/// Each axis holds a union of intervals; longitude windows crossing the
/// dateline are split in two.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    axes: Vec<Vec<Interval>>,
}

impl Window {
    /// A window that accepts everything
    pub fn unbounded(dims: usize) -> Self {
        Self {
            axes: vec![vec![Interval::unbounded()]; dims],
        }
    }

    /// Replace the intervals of one axis
    pub fn set(&mut self, axis: usize, intervals: Vec<Interval>) {
        self.axes[axis] = intervals;
    }

    /// Intervals of one axis
    pub fn axis(&self, axis: usize) -> &[Interval] {
        &self.axes[axis]
    }

    /// Whether an axis accepts every value
    pub fn is_unbounded_axis(&self, axis: usize) -> bool {
        self.axes[axis].iter().any(Interval::is_unbounded)
    }

    /// Whether a frame coordinate tuple lies inside the window
    pub fn contains(&self, coords: &[f64]) -> bool {
        self.axes
            .iter()
            .zip(coords)
            .all(|(intervals, value)| intervals.iter().any(|i| i.contains(*value)))
    }

    /// Whether the window overlaps an axis-aligned box
    pub fn overlaps_box(&self, lower: &[f64], upper: &[f64]) -> bool {
        self.axes
            .iter()
            .enumerate()
            .all(|(axis, intervals)| intervals.iter().any(|i| i.overlaps(lower[axis], upper[axis])))
    }
}

/// Searchable structure over the canonical source points
pub trait SpatialIndex: Send + Sync {
    /// Short name of the strategy, for logging
    fn kind(&self) -> &'static str;

    /// The indexed points, in source order
    fn points(&self) -> &[Point];

    /// Indices of every point inside `window`, ascending
    fn query(&self, window: &Window) -> Vec<usize>;

    /// The accepted point inside `window` with the smallest weighted separation
    /// from `target`; ties go to the lowest index
    fn nearest(
        &self,
        target: &Point,
        window: &Window,
        weights: &SeparationWeights,
        accept: &dyn Fn(usize) -> bool,
    ) -> Option<usize>;

    /// Corner points of the grid cell enclosing `target`, if the index knows cells
    fn enclosing(&self, _target: &Point) -> Option<Vec<usize>> {
        None
    }

    /// Indices of every point inside a target cell, ascending
    fn cell(&self, cell: &Cell) -> Vec<usize> {
        let points = self.points();
        self.query(&cell.window())
            .into_iter()
            .filter(|&i| cell.contains(points[i].coords()))
            .collect()
    }
}

/// A target grid cell in frame coordinates.
///
/// Membership is half-open, `[lower, upper)`, except along axes where the cell
/// is the last one, which are closed. Longitudes are compared by their wrapped
/// offset from the cell centre.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub centre: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub closed: Vec<bool>,
    pub longitude: Option<usize>,
}

impl Cell {
    /// Whether a frame coordinate tuple belongs to the cell
    pub fn contains(&self, coords: &[f64]) -> bool {
        (0..self.centre.len()).all(|axis| {
            let (value, lo, hi) = if Some(axis) == self.longitude {
                let centre = self.centre[axis];
                (
                    geo::signed_longitude_difference(centre, coords[axis]),
                    self.lower[axis] - centre,
                    self.upper[axis] - centre,
                )
            } else {
                (coords[axis], self.lower[axis], self.upper[axis])
            };
            value >= lo && (value < hi || (self.closed[axis] && value <= hi))
        })
    }

    /// Inclusive window covering the cell
    pub fn window(&self) -> Window {
        let mut window = Window::unbounded(self.centre.len());
        for axis in 0..self.centre.len() {
            let intervals = if Some(axis) == self.longitude {
                geo::wrap_longitude_interval(self.lower[axis], self.upper[axis])
                    .into_iter()
                    .map(|(lo, hi)| Interval::new(lo, hi))
                    .collect()
            } else {
                vec![Interval::new(self.lower[axis], self.upper[axis])]
            };
            window.set(axis, intervals);
        }
        window
    }
}

/// One axis of a gridded source, in canonical units
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutAxis {
    /// Kind of the axis coordinate
    pub dim: Dim,
    /// Position of the axis kind in the frame, if shared
    pub frame_pos: Option<usize>,
    /// Axis coordinate values; longitudes keep their native range
    pub values: Vec<f64>,
}

/// Lattice description of a gridded source
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    pub axes: Vec<LayoutAxis>,
}

impl GridLayout {
    /// Number of lattice points
    pub fn size(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Whether every axis kind is part of the frame
    pub fn fully_framed(&self) -> bool {
        self.axes.iter().all(|a| a.frame_pos.is_some())
    }

    /// Whether cells can be located directly: every axis framed and monotonic
    pub fn is_searchable(&self) -> bool {
        self.fully_framed() && self.axes.iter().all(|a| grid::is_monotonic(&a.values))
    }
}

/// Build the index best suited to the source structure
pub fn build_index(points: Vec<Point>, layout: Option<GridLayout>, frame: Frame) -> Box<dyn SpatialIndex> {
    match layout {
        Some(layout) => match GridIndex::try_new(points, layout, frame.clone()) {
            Ok(index) => Box::new(index),
            Err(points) => {
                debug!(
                    points = points.len(),
                    "Grid axes are not monotonic, falling back to k-d tree"
                );
                Box::new(KdTree::build(points, frame))
            }
        },
        None => Box::new(KdTree::build(points, frame)),
    }
}

/// Distance from `value` to the interval `[lo, hi]`
pub(crate) fn interval_distance(value: f64, lo: f64, hi: f64) -> f64 {
    if value < lo {
        lo - value
    } else if value > hi {
        value - hi
    } else {
        0.0
    }
}

/// Keep the better of two nearest-neighbour candidates; ties go to the lower index
pub(crate) fn improves(candidate: (f64, usize), best: Option<(f64, usize)>) -> bool {
    match best {
        None => true,
        Some((distance, index)) => {
            candidate.0 < distance || (candidate.0 == distance && candidate.1 < index)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_contains() {
        let mut window = Window::unbounded(2);
        window.set(0, vec![Interval::new(0.0, 1.0)]);
        window.set(1, vec![Interval::new(170.0, 180.0), Interval::new(-180.0, -170.0)]);

        assert!(window.contains(&[0.5, 175.0]));
        assert!(window.contains(&[1.0, -175.0]));
        assert!(!window.contains(&[0.5, 0.0]));
        assert!(!window.contains(&[1.5, 175.0]));
        assert!(!window.is_unbounded_axis(0));
        assert!(Window::unbounded(1).is_unbounded_axis(0));
    }

    #[test]
    fn test_window_overlaps_box() {
        let mut window = Window::unbounded(2);
        window.set(0, vec![Interval::new(0.0, 1.0)]);

        assert!(window.overlaps_box(&[0.5, -10.0], &[3.0, 10.0]));
        assert!(!window.overlaps_box(&[1.5, -10.0], &[3.0, 10.0]));
    }

    #[test]
    fn test_cell_membership_is_half_open() {
        let cell = Cell {
            centre: vec![0.0, 0.0],
            lower: vec![-0.5, -5.0],
            upper: vec![0.5, 5.0],
            closed: vec![false, true],
            longitude: Some(1),
        };

        assert!(cell.contains(&[-0.5, 0.0]));
        assert!(!cell.contains(&[0.5, 0.0]));
        assert!(cell.contains(&[0.0, 5.0]));
        assert!(cell.contains(&[0.0, -5.0]));
        assert!(!cell.contains(&[0.0, 5.5]));
    }

    #[test]
    fn test_cell_across_dateline() {
        let cell = Cell {
            centre: vec![0.0, 180.0],
            lower: vec![-1.0, 175.0],
            upper: vec![1.0, 185.0],
            closed: vec![true, false],
            longitude: Some(1),
        };

        assert!(cell.contains(&[0.0, -178.0]));
        assert!(cell.contains(&[0.0, 176.0]));
        assert!(!cell.contains(&[0.0, -175.0]));
        assert_eq!(
            cell.window().axis(1),
            &[Interval::new(175.0, 180.0), Interval::new(-180.0, -175.0)]
        );
    }

    #[test]
    fn test_improves_prefers_lower_index_on_ties() {
        assert!(improves((1.0, 3), None));
        assert!(improves((0.5, 9), Some((1.0, 3))));
        assert!(improves((1.0, 2), Some((1.0, 3))));
        assert!(!improves((1.0, 4), Some((1.0, 3))));
    }

    #[test]
    fn test_interval_distance() {
        assert_eq!(interval_distance(0.0, 1.0, 2.0), 1.0);
        assert_eq!(interval_distance(1.5, 1.0, 2.0), 0.0);
        assert_eq!(interval_distance(5.0, 1.0, 2.0), 3.0);
    }
}
