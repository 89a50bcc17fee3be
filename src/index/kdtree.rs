//! Balanced k-d tree over scattered source points.
//!
//! The tree is built once over the canonical frame coordinates (latitude,
//! normalised longitude, vertical level, time) and is read-only afterwards, so
//! it can be shared by any number of sampling workers. Each node keeps the
//! bounding box of its subtree: window queries prune boxes outside the window,
//! nearest-neighbour queries prune boxes whose lower-bound separation exceeds
//! the best match so far.

use crate::constraint::{Separation, SeparationWeights};
use crate::frame::Frame;
use crate::geo;
use crate::point::Point;

use super::{improves, interval_distance, SpatialIndex, Window};

/// Slack applied when comparing lower bounds against the best separation
const PRUNE_SLACK: f64 = 1e-9;

#[derive(Clone, Copy, Debug)]
struct KdNode {
    point: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// k-d tree over frame coordinates
pub struct KdTree {
    points: Vec<Point>,
    frame: Frame,
    nodes: Vec<KdNode>,
    root: Option<usize>,
    dims: usize,
    // subtree bounding boxes, `dims` values per node
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl KdTree {
    /// Build a balanced tree (median split on the widest axis).
    ///
    /// Points with a non-finite coordinate can never match and are left out of
    /// the tree, but keep their position in `points()`.
    pub fn build(points: Vec<Point>, frame: Frame) -> Self {
        let dims = frame.len();
        let mut tree = KdTree {
            nodes: Vec::with_capacity(points.len()),
            lower: Vec::with_capacity(points.len() * dims),
            upper: Vec::with_capacity(points.len() * dims),
            root: None,
            dims,
            frame,
            points,
        };

        let mut indices: Vec<usize> = (0..tree.points.len())
            .filter(|&i| tree.points[i].coords().iter().all(|c| c.is_finite()))
            .collect();
        tree.root = tree.build_rec(&mut indices);
        tree
    }

    fn build_rec(&mut self, indices: &mut [usize]) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        let mut lower = vec![f64::INFINITY; self.dims];
        let mut upper = vec![f64::NEG_INFINITY; self.dims];
        for &i in indices.iter() {
            for (axis, &value) in self.points[i].coords().iter().enumerate() {
                lower[axis] = lower[axis].min(value);
                upper[axis] = upper[axis].max(value);
            }
        }

        let axis = (0..self.dims)
            .max_by(|&a, &b| {
                (upper[a] - lower[a])
                    .total_cmp(&(upper[b] - lower[b]))
                    .then(b.cmp(&a))
            })
            .unwrap_or(0);

        // deterministic median: ties on the split axis fall back to source order
        let mid = indices.len() / 2;
        let points = &self.points;
        indices.select_nth_unstable_by(mid, |&a, &b| {
            points[a]
                .coord(axis)
                .total_cmp(&points[b].coord(axis))
                .then(a.cmp(&b))
        });

        let node_index = self.nodes.len();
        self.nodes.push(KdNode {
            point: indices[mid],
            left: None,
            right: None,
        });
        self.lower.extend_from_slice(&lower);
        self.upper.extend_from_slice(&upper);

        let (left_slice, right_slice) = indices.split_at_mut(mid);
        // right_slice includes the median at [0], so skip it
        let right_rest = &mut right_slice[1..];

        let left_child = self.build_rec(left_slice);
        let right_child = self.build_rec(right_rest);

        self.nodes[node_index].left = left_child;
        self.nodes[node_index].right = right_child;

        Some(node_index)
    }

    /// Number of points placed in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no searchable point
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn bounds(&self, node: usize) -> (&[f64], &[f64]) {
        let start = node * self.dims;
        let end = start + self.dims;
        (&self.lower[start..end], &self.upper[start..end])
    }

    /// Smallest weighted separation between `target` and anything in a node's box
    fn lower_bound(&self, node: usize, target: &[f64], weights: &SeparationWeights) -> f64 {
        let (lower, upper) = self.bounds(node);
        let frame = &self.frame;

        let horizontal = match (frame.latitude(), frame.longitude()) {
            (Some(lat), Some(lon)) => geo::min_great_circle_to_box(
                target[lat],
                target[lon],
                (lower[lat], upper[lat]),
                (lower[lon], upper[lon]),
            ),
            (Some(lat), None) => interval_distance(target[lat], lower[lat], upper[lat]),
            (None, Some(lon)) => {
                if target[lon] >= lower[lon] && target[lon] <= upper[lon] {
                    0.0
                } else {
                    geo::longitude_difference(target[lon], lower[lon])
                        .min(geo::longitude_difference(target[lon], upper[lon]))
                }
            }
            (None, None) => 0.0,
        };
        let vertical = frame
            .vertical()
            .map_or(0.0, |v| interval_distance(target[v], lower[v], upper[v]));
        let temporal = frame
            .time()
            .map_or(0.0, |t| interval_distance(target[t], lower[t], upper[t]));

        Separation {
            horizontal,
            vertical,
            temporal,
        }
        .weighted(weights)
    }

    fn nearest_rec(
        &self,
        node: usize,
        target: &Point,
        window: &Window,
        weights: &SeparationWeights,
        accept: &dyn Fn(usize) -> bool,
        best: &mut Option<(f64, usize)>,
    ) {
        let (lower, upper) = self.bounds(node);
        if !window.overlaps_box(lower, upper) {
            return;
        }
        if let Some((distance, _)) = *best {
            if self.lower_bound(node, target.coords(), weights) > distance + PRUNE_SLACK {
                return;
            }
        }

        let KdNode { point, left, right } = self.nodes[node];
        let candidate = &self.points[point];
        if window.contains(candidate.coords()) && accept(point) {
            let distance = self
                .frame
                .weighted_separation(target.coords(), candidate.coords(), weights);
            if improves((distance, point), *best) {
                *best = Some((distance, point));
            }
        }

        // visit the closer child first
        let mut children: Vec<(f64, usize)> = [left, right]
            .into_iter()
            .flatten()
            .map(|child| (self.lower_bound(child, target.coords(), weights), child))
            .collect();
        children.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (_, child) in children {
            self.nearest_rec(child, target, window, weights, accept, best);
        }
    }
}

impl SpatialIndex for KdTree {
    fn kind(&self) -> &'static str {
        "kdtree"
    }

    fn points(&self) -> &[Point] {
        &self.points
    }

    fn query(&self, window: &Window) -> Vec<usize> {
        let mut found = Vec::new();
        let mut stack: Vec<usize> = self.root.into_iter().collect();

        while let Some(node) = stack.pop() {
            let (lower, upper) = self.bounds(node);
            if !window.overlaps_box(lower, upper) {
                continue;
            }

            let KdNode { point, left, right } = self.nodes[node];
            if window.contains(self.points[point].coords()) {
                found.push(point);
            }
            stack.extend(left);
            stack.extend(right);
        }

        found.sort_unstable();
        found
    }

    fn nearest(
        &self,
        target: &Point,
        window: &Window,
        weights: &SeparationWeights,
        accept: &dyn Fn(usize) -> bool,
    ) -> Option<usize> {
        let mut best = None;
        if let Some(root) = self.root {
            self.nearest_rec(root, target, window, weights, accept, &mut best);
        }
        best.map(|(_, index)| index)
    }
}
