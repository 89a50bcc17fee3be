//! Direct lookup over rectilinear grids.
//!
//! A gridded source with monotonic axes does not need a tree: the candidate
//! indices along each axis follow from the axis values themselves, either
//! arithmetically for evenly spaced axes or by binary search otherwise.
//! Source points are stored in lattice order, last axis fastest.

use crate::constraint::{ConstraintEvaluator, SeparationConstraints, SeparationWeights};
use crate::frame::Frame;
use crate::point::{Dim, Point};

use super::{improves, GridLayout, Interval, SpatialIndex, Window};

/// Relative tolerance for treating an axis as evenly spaced
const REGULAR_TOLERANCE: f64 = 1e-6;

/// Longitude shifts tried when matching canonical longitudes against native axes
const LONGITUDE_SHIFTS: [f64; 3] = [0.0, -360.0, 360.0];

/// How values along one axis are located
#[derive(Debug, Clone, PartialEq)]
enum AxisLookup {
    /// Evenly spaced values; `step` is negative for descending axes
    Regular { start: f64, step: f64, len: usize },
    /// Strictly monotonic values
    Monotonic { values: Vec<f64>, ascending: bool },
}

impl AxisLookup {
    /// Pick a lookup for the values, or `None` when they are not strictly monotonic
    fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        if values.len() == 1 {
            return Some(AxisLookup::Monotonic {
                values: values.to_vec(),
                ascending: true,
            });
        }

        let ascending = values[1] > values[0];
        let monotonic = values
            .windows(2)
            .all(|w| if ascending { w[1] > w[0] } else { w[1] < w[0] });
        if !monotonic {
            return None;
        }

        let len = values.len();
        let step = (values[len - 1] - values[0]) / (len - 1) as f64;
        let regular = values
            .windows(2)
            .all(|w| ((w[1] - w[0]) - step).abs() <= REGULAR_TOLERANCE * step.abs());

        if regular {
            Some(AxisLookup::Regular {
                start: values[0],
                step,
                len,
            })
        } else {
            Some(AxisLookup::Monotonic {
                values: values.to_vec(),
                ascending,
            })
        }
    }

    fn len(&self) -> usize {
        match self {
            AxisLookup::Regular { len, .. } => *len,
            AxisLookup::Monotonic { values, .. } => values.len(),
        }
    }

    /// Fractional position of `x` along the axis
    fn position(&self, x: f64) -> f64 {
        match self {
            AxisLookup::Regular { start, step, .. } => (x - start) / step,
            AxisLookup::Monotonic { values, ascending } => {
                let below = if *ascending {
                    values.partition_point(|v| *v < x)
                } else {
                    values.partition_point(|v| *v > x)
                };
                if below == 0 {
                    // before the first value
                    return if values[0] == x { 0.0 } else { -1.0 };
                }
                if below == values.len() {
                    return values.len() as f64;
                }
                let (v0, v1) = (values[below - 1], values[below]);
                (below - 1) as f64 + (x - v0) / (v1 - v0)
            }
        }
    }

    /// Inclusive index range possibly inside `[lo, hi]`, padded by one step
    fn range(&self, lo: f64, hi: f64) -> Option<(usize, usize)> {
        let last = self.len() as f64 - 1.0;
        let (a, b) = (self.position(lo), self.position(hi));
        let (from, to) = if a <= b { (a, b) } else { (b, a) };

        if to < -1.0 || from > last + 1.0 {
            return None;
        }
        let from = (from.floor() - 1.0).clamp(0.0, last) as usize;
        let to = (to.ceil() + 1.0).clamp(0.0, last) as usize;
        Some((from, to))
    }

    /// Neighbouring indices bracketing `x`, without extrapolation
    fn bracket(&self, x: f64) -> Option<(usize, usize)> {
        let len = self.len();
        let t = self.position(x);
        let last = (len - 1) as f64;
        if t.is_nan() || t < -1e-9 || t > last + 1e-9 {
            return None;
        }
        if len == 1 {
            return Some((0, 0));
        }
        let i0 = (t.floor().max(0.0) as usize).min(len - 2);
        Some((i0, i0 + 1))
    }

    /// Indices closest to `x`, clamped to the axis ends
    fn nearest_pair(&self, x: f64) -> Vec<usize> {
        let len = self.len();
        let t = self.position(x);
        if t.is_nan() || t <= 0.0 {
            vec![0]
        } else if t >= (len - 1) as f64 {
            vec![len - 1]
        } else {
            let i0 = t.floor() as usize;
            vec![i0, (i0 + 1).min(len - 1)]
        }
    }
}

/// Whether the values are finite and strictly monotonic
pub(crate) fn is_monotonic(values: &[f64]) -> bool {
    AxisLookup::from_values(values).is_some()
}

/// One axis of the lattice
#[derive(Debug, Clone)]
struct GridAxis {
    dim: Dim,
    frame_pos: Option<usize>,
    lookup: AxisLookup,
    // evenly spaced longitudes covering the full circle
    periodic: bool,
}

impl GridAxis {
    fn is_longitude(&self) -> bool {
        self.dim == Dim::Longitude
    }

    fn shifts(&self) -> &'static [f64] {
        if self.is_longitude() {
            &LONGITUDE_SHIFTS
        } else {
            &LONGITUDE_SHIFTS[..1]
        }
    }

    /// Candidate indices for a union of window intervals, ascending
    fn candidates(&self, intervals: &[Interval]) -> Vec<usize> {
        let mut found = Vec::new();
        for interval in intervals {
            for shift in self.shifts() {
                if let Some((from, to)) = self.lookup.range(interval.lo + shift, interval.hi + shift) {
                    found.extend(from..=to);
                }
            }
        }
        found.sort_unstable();
        found.dedup();
        found
    }

    fn bracket(&self, x: f64) -> Option<(usize, usize)> {
        for shift in self.shifts() {
            if let Some(pair) = self.lookup.bracket(x + shift) {
                return Some(pair);
            }
        }
        if self.periodic {
            // inside the gap between the last and the first longitude
            return Some((self.lookup.len() - 1, 0));
        }
        None
    }

    fn nearest(&self, x: f64) -> Vec<usize> {
        let mut found: Vec<usize> = self
            .shifts()
            .iter()
            .flat_map(|shift| self.lookup.nearest_pair(x + shift))
            .collect();
        if self.periodic {
            found.extend([0, self.lookup.len() - 1]);
        }
        found.sort_unstable();
        found.dedup();
        found
    }
}

/// Index over a rectilinear lattice of source points
pub struct GridIndex {
    points: Vec<Point>,
    frame: Frame,
    axes: Vec<GridAxis>,
    strides: Vec<usize>,
}

impl GridIndex {
    /// Build a grid index, handing the points back if the layout cannot be
    /// searched directly
    pub fn try_new(
        points: Vec<Point>,
        layout: GridLayout,
        frame: Frame,
    ) -> std::result::Result<Self, Vec<Point>> {
        if layout.axes.is_empty() || layout.size() != points.len() {
            return Err(points);
        }

        let mut axes = Vec::with_capacity(layout.axes.len());
        for axis in &layout.axes {
            let lookup = match AxisLookup::from_values(&axis.values) {
                Some(lookup) => lookup,
                None => return Err(points),
            };
            let periodic = axis.dim == Dim::Longitude
                && match lookup {
                    AxisLookup::Regular { step, len, .. } => {
                        ((len as f64 * step.abs()) - 360.0).abs() <= 360.0 * REGULAR_TOLERANCE
                    }
                    AxisLookup::Monotonic { .. } => false,
                };
            axes.push(GridAxis {
                dim: axis.dim,
                frame_pos: axis.frame_pos,
                lookup,
                periodic,
            });
        }

        let mut strides = vec![1; axes.len()];
        for k in (0..axes.len().saturating_sub(1)).rev() {
            strides[k] = strides[k + 1] * axes[k + 1].lookup.len();
        }

        Ok(Self {
            points,
            frame,
            axes,
            strides,
        })
    }

    /// Lattice shape
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(|a| a.lookup.len()).collect()
    }

    /// Flat indices of the cartesian product of per-axis index lists, ascending
    fn product(&self, lists: &[Vec<usize>]) -> Vec<usize> {
        if lists.iter().any(Vec::is_empty) {
            return Vec::new();
        }

        let total: usize = lists.iter().map(Vec::len).product();
        let mut out = Vec::with_capacity(total);
        let mut cursor = vec![0usize; lists.len()];

        loop {
            let flat = cursor
                .iter()
                .zip(lists)
                .zip(&self.strides)
                .map(|((&c, list), stride)| list[c] * stride)
                .sum();
            out.push(flat);

            // odometer, last axis fastest
            let mut axis = lists.len();
            loop {
                if axis == 0 {
                    return out;
                }
                axis -= 1;
                cursor[axis] += 1;
                if cursor[axis] < lists[axis].len() {
                    break;
                }
                cursor[axis] = 0;
            }
        }
    }

    fn all_indices(axis: &GridAxis) -> Vec<usize> {
        (0..axis.lookup.len()).collect()
    }

    /// Window holding every point within weighted separation `distance` of `target`
    fn reach(&self, target: &Point, distance: f64, weights: &SeparationWeights) -> Window {
        let limit = |weight: f64| (weight > 0.0).then(|| distance / weight);
        let constraints = SeparationConstraints {
            horizontal_separation: limit(weights.horizontal),
            vertical_separation: limit(weights.vertical),
            temporal_separation: limit(weights.temporal),
        };
        ConstraintEvaluator::new(&self.frame, &constraints).window(target)
    }

    /// Best accepted point among `indices`
    fn best_of(
        &self,
        indices: impl IntoIterator<Item = usize>,
        target: &Point,
        window: &Window,
        weights: &SeparationWeights,
        accept: &dyn Fn(usize) -> bool,
    ) -> Option<usize> {
        let mut best = None;
        for index in indices {
            let candidate = &self.points[index];
            if !window.contains(candidate.coords()) || !accept(index) {
                continue;
            }
            let distance = self
                .frame
                .weighted_separation(target.coords(), candidate.coords(), weights);
            if improves((distance, index), best) {
                best = Some((distance, index));
            }
        }
        best.map(|(_, index)| index)
    }
}

impl SpatialIndex for GridIndex {
    fn kind(&self) -> &'static str {
        "grid"
    }

    fn points(&self) -> &[Point] {
        &self.points
    }

    fn query(&self, window: &Window) -> Vec<usize> {
        let lists: Vec<Vec<usize>> = self
            .axes
            .iter()
            .map(|axis| match axis.frame_pos {
                Some(pos) if !window.is_unbounded_axis(pos) => axis.candidates(window.axis(pos)),
                _ => Self::all_indices(axis),
            })
            .collect();

        self.product(&lists)
            .into_iter()
            .filter(|&i| window.contains(self.points[i].coords()))
            .collect()
    }

    fn nearest(
        &self,
        target: &Point,
        window: &Window,
        weights: &SeparationWeights,
        accept: &dyn Fn(usize) -> bool,
    ) -> Option<usize> {
        let lists: Vec<Vec<usize>> = self
            .axes
            .iter()
            .map(|axis| match axis.frame_pos {
                Some(pos) => axis.nearest(target.coord(pos)),
                None => Self::all_indices(axis),
            })
            .collect();

        let corners = self.product(&lists);
        // a rejected corner may hide a closer point further out
        let complete = corners
            .iter()
            .all(|&i| !window.contains(self.points[i].coords()) || accept(i));
        let best = match self.best_of(corners, target, window, weights, accept) {
            Some(best) if complete => best,
            _ => return self.best_of(self.query(window), target, window, weights, accept),
        };

        // Latitude and longitude are coupled on the sphere, so a point outside
        // the bracketing corners can still be closer.
        let distance = self
            .frame
            .weighted_separation(target.coords(), self.points[best].coords(), weights);
        let reach = self.reach(target, distance, weights);
        self.best_of(self.query(&reach), target, window, weights, accept)
    }

    fn enclosing(&self, target: &Point) -> Option<Vec<usize>> {
        let mut lists = Vec::with_capacity(self.axes.len());
        for axis in &self.axes {
            let pos = axis.frame_pos?;
            let (i0, i1) = axis.bracket(target.coord(pos))?;
            let mut pair = vec![i0, i1];
            pair.sort_unstable();
            pair.dedup();
            lists.push(pair);
        }
        Some(self.product(&lists))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::normalize_longitude;
    use crate::index::LayoutAxis;

    /// Lat/lon lattice with value = flat index
    fn lattice(lats: &[f64], lons: &[f64]) -> (Vec<Point>, GridLayout, Frame) {
        let frame = Frame::new([Dim::Latitude, Dim::Longitude]).unwrap();
        let mut points = Vec::new();
        for &lat in lats {
            for &lon in lons {
                let index = points.len() as f64;
                points.push(Point::new(vec![lat, normalize_longitude(lon)], index, true));
            }
        }
        let layout = GridLayout {
            axes: vec![
                LayoutAxis {
                    dim: Dim::Latitude,
                    frame_pos: Some(0),
                    values: lats.to_vec(),
                },
                LayoutAxis {
                    dim: Dim::Longitude,
                    frame_pos: Some(1),
                    values: lons.to_vec(),
                },
            ],
        };
        (points, layout, frame)
    }

    fn index(lats: &[f64], lons: &[f64]) -> GridIndex {
        let (points, layout, frame) = lattice(lats, lons);
        GridIndex::try_new(points, layout, frame).unwrap_or_else(|_| panic!("grid rejected"))
    }

    fn range(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn test_axis_lookup_kinds() {
        assert!(matches!(
            AxisLookup::from_values(&[0.0, 1.0, 2.0]),
            Some(AxisLookup::Regular { .. })
        ));
        assert!(matches!(
            AxisLookup::from_values(&[0.0, 1.0, 5.0]),
            Some(AxisLookup::Monotonic { ascending: true, .. })
        ));
        assert!(matches!(
            AxisLookup::from_values(&[5.0, 1.0, 0.0]),
            Some(AxisLookup::Monotonic { ascending: false, .. })
        ));
        assert!(AxisLookup::from_values(&[0.0, 2.0, 1.0]).is_none());
        assert!(AxisLookup::from_values(&[0.0, f64::NAN]).is_none());
    }

    #[test]
    fn test_bracket() {
        let regular = AxisLookup::from_values(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(regular.bracket(2.5), Some((1, 2)));
        assert_eq!(regular.bracket(3.0), Some((1, 2)));
        assert_eq!(regular.bracket(0.5), None);

        let descending = AxisLookup::from_values(&[10.0, 4.0, 1.0]).unwrap();
        assert_eq!(descending.bracket(5.0), Some((0, 1)));
        assert_eq!(descending.bracket(11.0), None);
    }

    #[test]
    fn test_non_monotonic_layout_is_handed_back() {
        let (points, layout, frame) = lattice(&[0.0, 2.0, 1.0], &[0.0, 1.0]);
        let rejected = GridIndex::try_new(points, layout, frame);
        assert_eq!(rejected.err().map(|p| p.len()), Some(6));
    }

    #[test]
    fn test_query_matches_brute_force_across_dateline() {
        let grid = index(&range(-60.0, 5.0, 25), &range(0.0, 10.0, 36));

        let mut window = Window::unbounded(2);
        window.set(0, vec![Interval::new(-12.0, 20.0)]);
        window.set(1, vec![Interval::new(165.0, 180.0), Interval::new(-180.0, -155.0)]);

        let expected: Vec<usize> = grid
            .points()
            .iter()
            .enumerate()
            .filter(|(_, p)| window.contains(p.coords()))
            .map(|(i, _)| i)
            .collect();

        assert!(!expected.is_empty());
        assert_eq!(grid.query(&window), expected);
    }

    #[test]
    fn test_enclosing_wraps_periodic_longitude() {
        let grid = index(&[0.0, 1.0], &range(0.0, 10.0, 36));

        // 355E sits between the last column (350) and the first (0)
        let target = Point::coordinates_only(vec![0.5, -5.0]);
        let corners = grid.enclosing(&target).unwrap();
        assert_eq!(corners, vec![0, 35, 36, 71]);

        let target = Point::coordinates_only(vec![0.5, 15.0]);
        assert_eq!(grid.enclosing(&target).unwrap(), vec![1, 2, 37, 38]);

        let outside = Point::coordinates_only(vec![5.0, 15.0]);
        assert_eq!(grid.enclosing(&outside), None);
    }

    #[test]
    fn test_nearest_and_fallback_scan() {
        let grid = index(&range(0.0, 1.0, 5), &range(0.0, 1.0, 5));
        let target = Point::coordinates_only(vec![2.2, 2.1]);
        let weights = SeparationWeights::default();
        let window = Window::unbounded(2);

        assert_eq!(grid.nearest(&target, &window, &weights, &|_| true), Some(12));
        assert_eq!(grid.nearest(&target, &window, &weights, &|i| i != 12), Some(17));

        // Only the far corner is acceptable, which needs the scan
        assert_eq!(grid.nearest(&target, &window, &weights, &|i| i == 24), Some(24));
        assert_eq!(grid.nearest(&target, &window, &weights, &|_| false), None);
    }

    #[test]
    fn test_nearest_looks_past_bracketing_latitudes() {
        // the closest latitude to (29N, 60E) on this lattice is 60N, not 30N
        let lats = [0.0, 30.0, 60.0];
        let lons = [0.0, 120.0, 240.0];
        let grid = index(&lats, &lons);
        let target = Point::coordinates_only(vec![29.0, 60.0]);
        let weights = SeparationWeights::default();
        let window = Window::unbounded(2);

        let brute_force = grid
            .points()
            .iter()
            .enumerate()
            .map(|(i, p)| (grid.frame.weighted_separation(target.coords(), p.coords(), &weights), i))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, i)| i);

        assert_eq!(brute_force, Some(6));
        assert_eq!(grid.nearest(&target, &window, &weights, &|_| true), brute_force);
    }
}
