//! Separation constraints and their evaluation.
//!
//! A constraint limits how far a candidate source point may lie from a target
//! point along each dimension family. Horizontal separation is the great-circle
//! angle in degrees, vertical separation the absolute difference of altitude
//! (metres) or pressure (hPa), temporal separation the absolute difference in
//! days. Every configured family must hold for a match; bounds are inclusive.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{CollocError, Result};
use crate::frame::Frame;
use crate::geo;
use crate::index::{Interval, Window};
use crate::point::Point;
use crate::units;

/// Relative slack applied to inclusive bounds to absorb floating point round-off
pub const SEPARATION_TOLERANCE: f64 = 1e-9;

/// Maximum allowed separation per dimension family; `None` is unconstrained
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeparationConstraints {
    /// Great-circle separation in degrees of arc
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_separation: Option<f64>,
    /// Vertical separation in metres or hPa
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_separation: Option<f64>,
    /// Temporal separation in days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal_separation: Option<f64>,
}

impl SeparationConstraints {
    /// No constraints at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the great-circle separation, in degrees of arc
    pub fn with_horizontal(mut self, degrees: f64) -> Self {
        self.horizontal_separation = Some(degrees);
        self
    }

    /// Limit the great-circle separation, in kilometres
    pub fn with_horizontal_km(self, km: f64) -> Self {
        self.with_horizontal(geo::km_to_degrees(km))
    }

    /// Limit the vertical separation
    pub fn with_vertical(mut self, separation: f64) -> Self {
        self.vertical_separation = Some(separation);
        self
    }

    /// Limit the temporal separation, in days
    pub fn with_temporal(mut self, days: f64) -> Self {
        self.temporal_separation = Some(days);
        self
    }

    /// Limit the temporal separation by a time delta
    pub fn with_temporal_delta(self, delta: chrono::TimeDelta) -> Self {
        self.with_temporal(units::delta_to_days(delta))
    }

    /// Build constraints from short keyword names (`h_sep`, `v_sep`/`a_sep`, `t_sep`)
    pub fn from_map(map: &HashMap<String, f64>) -> Result<Self> {
        let mut constraints = Self::new();
        for (key, value) in map {
            match key.as_str() {
                "h_sep" | "horizontal_separation" => constraints.horizontal_separation = Some(*value),
                "v_sep" | "a_sep" | "vertical_separation" => {
                    constraints.vertical_separation = Some(*value)
                }
                "t_sep" | "temporal_separation" => constraints.temporal_separation = Some(*value),
                _ => {
                    return Err(CollocError::config(format!(
                        "Unknown separation constraint: {}",
                        key
                    )))
                }
            }
        }
        constraints.validate()?;
        Ok(constraints)
    }

    /// Reject negative or non-numeric separations
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.entries() {
            if let Some(value) = value {
                if value.is_nan() || value < 0.0 {
                    return Err(CollocError::config(format!(
                        "{} must be a non-negative number, got {}",
                        name, value
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether no family is constrained
    pub fn is_unconstrained(&self) -> bool {
        self.entries().iter().all(|(_, value)| value.is_none())
    }

    fn entries(&self) -> [(&'static str, Option<f64>); 3] {
        [
            ("horizontal_separation", self.horizontal_separation),
            ("vertical_separation", self.vertical_separation),
            ("temporal_separation", self.temporal_separation),
        ]
    }
}

impl fmt::Display for SeparationConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries()
            .iter()
            .filter_map(|(name, value)| value.map(|v| format!("{}={}", name, v)))
            .collect();

        if parts.is_empty() {
            f.write_str("unconstrained")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Separation of two points per dimension family
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Separation {
    pub horizontal: f64,
    pub vertical: f64,
    pub temporal: f64,
}

impl Separation {
    /// Weighted Euclidean combination of the three families
    pub fn weighted(&self, weights: &SeparationWeights) -> f64 {
        let h = weights.horizontal * self.horizontal;
        let v = weights.vertical * self.vertical;
        let t = weights.temporal * self.temporal;
        (h * h + v * v + t * t).sqrt()
    }
}

/// Per-family weights used to rank nearest neighbours
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeparationWeights {
    #[serde(default = "default_weight")]
    pub horizontal: f64,
    #[serde(default = "default_weight")]
    pub vertical: f64,
    #[serde(default = "default_weight")]
    pub temporal: f64,
}

impl SeparationWeights {
    /// Reject negative or non-finite weights
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("horizontal", self.horizontal),
            ("vertical", self.vertical),
            ("temporal", self.temporal),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CollocError::config(format!(
                    "Nearest-neighbour weight '{}' must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for SeparationWeights {
    fn default() -> Self {
        Self {
            horizontal: default_weight(),
            vertical: default_weight(),
            temporal: default_weight(),
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

/// Whether `separation` lies within the inclusive `limit`
pub fn within(separation: f64, limit: f64) -> bool {
    separation <= limit + SEPARATION_TOLERANCE * limit.max(1.0)
}

/// Decide whether `a` and `b` satisfy every configured constraint.
///
/// Both points must be expressed in `frame` coordinates.
pub fn matches(a: &Point, b: &Point, constraints: &SeparationConstraints, frame: &Frame) -> bool {
    ConstraintEvaluator::new(frame, constraints).matches(a, b)
}

/// Pure evaluator of separation constraints within a frame
#[derive(Debug, Clone, Copy)]
pub struct ConstraintEvaluator<'a> {
    frame: &'a Frame,
    constraints: &'a SeparationConstraints,
}

impl<'a> ConstraintEvaluator<'a> {
    /// Create an evaluator
    pub fn new(frame: &'a Frame, constraints: &'a SeparationConstraints) -> Self {
        Self { frame, constraints }
    }

    /// The frame this evaluator works in
    pub fn frame(&self) -> &'a Frame {
        self.frame
    }

    /// Whether the two points satisfy every configured constraint
    pub fn matches(&self, a: &Point, b: &Point) -> bool {
        if self.constraints.is_unconstrained() {
            return true;
        }

        let separation = self.frame.separation(a.coords(), b.coords());
        let checks = [
            (self.constraints.horizontal_separation, separation.horizontal, self.has_horizontal()),
            (self.constraints.vertical_separation, separation.vertical, self.frame.vertical().is_some()),
            (self.constraints.temporal_separation, separation.temporal, self.frame.time().is_some()),
        ];

        checks.iter().all(|(limit, value, present)| match limit {
            Some(limit) if *present => within(*value, *limit),
            _ => true,
        })
    }

    fn has_horizontal(&self) -> bool {
        self.frame.latitude().is_some() || self.frame.longitude().is_some()
    }

    /// Per-axis search window around `target` that contains every possible match
    pub fn window(&self, target: &Point) -> Window {
        let coords = target.coords();
        let mut window = Window::unbounded(self.frame.len());

        if let Some(radius) = self.constraints.horizontal_separation {
            let radius = radius + slack(radius);
            match (self.frame.latitude(), self.frame.longitude()) {
                (Some(lat), Some(lon)) => {
                    let centre = coords[lat];
                    window.set(lat, vec![Interval::new(centre - radius, centre + radius)]);
                    if let Some(width) = geo::longitude_half_width(centre, radius) {
                        window.set(lon, longitude_intervals(coords[lon], width));
                    }
                }
                (Some(lat), None) => {
                    window.set(lat, vec![Interval::around(coords[lat], radius)]);
                }
                (None, Some(lon)) => {
                    window.set(lon, longitude_intervals(coords[lon], radius));
                }
                (None, None) => {}
            }
        }

        if let (Some(limit), Some(pos)) = (self.constraints.vertical_separation, self.frame.vertical()) {
            window.set(pos, vec![Interval::around(coords[pos], limit + slack(limit))]);
        }

        if let (Some(limit), Some(pos)) = (self.constraints.temporal_separation, self.frame.time()) {
            window.set(pos, vec![Interval::around(coords[pos], limit + slack(limit))]);
        }

        window
    }
}

fn slack(limit: f64) -> f64 {
    2.0 * SEPARATION_TOLERANCE * limit.max(1.0)
}

/// Window intervals for a longitude band, split at the dateline
pub(crate) fn longitude_intervals(centre: f64, half_width: f64) -> Vec<Interval> {
    geo::wrap_longitude_interval(centre - half_width, centre + half_width)
        .into_iter()
        .map(|(lo, hi)| Interval::new(lo, hi))
        .collect()
}
