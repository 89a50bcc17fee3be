//! The comparison frame shared by a source and a target dataset.
//!
//! Two datasets are compared only along the dimension kinds they both carry.
//! A [`Frame`] lists those kinds in canonical order and a [`Projector`] maps a
//! dataset's native points into that frame, converting every coordinate to its
//! canonical unit.

use crate::constraint::{Separation, SeparationWeights};
use crate::error::{CollocError, Result};
use crate::geo;
use crate::point::{Dim, Point, Schema};
use crate::units::{self, UnitConversion};

/// Ordered set of dimension kinds used to compare two datasets
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    dims: Vec<Dim>,
    latitude: Option<usize>,
    longitude: Option<usize>,
    vertical: Option<usize>,
    time: Option<usize>,
}

impl Frame {
    /// Create a frame over the given kinds
    pub fn new(dims: impl IntoIterator<Item = Dim>) -> Result<Self> {
        let mut dims: Vec<Dim> = dims.into_iter().collect();
        dims.sort();
        dims.dedup();

        if dims.is_empty() {
            return Err(CollocError::config(
                "The datasets share no coordinate dimensions",
            ));
        }

        let position = |dim: Dim| dims.iter().position(|d| *d == dim);
        // Altitude wins over pressure when both are shared
        let vertical = position(Dim::Altitude).or_else(|| position(Dim::AirPressure));

        Ok(Self {
            latitude: position(Dim::Latitude),
            longitude: position(Dim::Longitude),
            vertical,
            time: position(Dim::Time),
            dims,
        })
    }

    /// The frame of all kinds shared by two schemas
    pub fn between(source: &Schema, target: &Schema) -> Result<Self> {
        Self::new(source.dims().filter(|dim| target.contains(*dim)))
    }

    /// Kinds in frame order
    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    /// Number of kinds
    pub fn len(&self) -> usize {
        self.dims.len()
    }

    /// Always false; a frame has at least one kind
    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Frame position of a kind
    pub fn position(&self, dim: Dim) -> Option<usize> {
        self.dims.iter().position(|d| *d == dim)
    }

    /// Frame position of latitude
    pub fn latitude(&self) -> Option<usize> {
        self.latitude
    }

    /// Frame position of longitude
    pub fn longitude(&self) -> Option<usize> {
        self.longitude
    }

    /// Frame position of the vertical kind used for separation
    pub fn vertical(&self) -> Option<usize> {
        self.vertical
    }

    /// Frame position of time
    pub fn time(&self) -> Option<usize> {
        self.time
    }

    /// Build the projector mapping points of `schema` into this frame
    pub fn projector(&self, schema: &Schema) -> Result<Projector> {
        let mut slots = Vec::with_capacity(self.dims.len());
        for dim in &self.dims {
            let position = schema.position(*dim).ok_or_else(|| {
                CollocError::config(format!("Dataset has no {} coordinate", dim))
            })?;
            let conversion = units::canonical_conversion(*dim, &schema.coords()[position].units)?;
            slots.push((position, conversion));
        }

        Ok(Projector {
            slots,
            longitude: self.longitude,
        })
    }

    /// Per-family separation of two frame coordinate tuples
    pub fn separation(&self, a: &[f64], b: &[f64]) -> Separation {
        let horizontal = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => geo::great_circle_degrees(a[lat], a[lon], b[lat], b[lon]),
            (Some(lat), None) => (a[lat] - b[lat]).abs(),
            (None, Some(lon)) => geo::longitude_difference(a[lon], b[lon]),
            (None, None) => 0.0,
        };
        let vertical = self.vertical.map_or(0.0, |v| (a[v] - b[v]).abs());
        let temporal = self.time.map_or(0.0, |t| (a[t] - b[t]).abs());

        Separation {
            horizontal,
            vertical,
            temporal,
        }
    }

    /// Weighted combined separation used to rank nearest neighbours
    pub fn weighted_separation(&self, a: &[f64], b: &[f64], weights: &SeparationWeights) -> f64 {
        self.separation(a, b).weighted(weights)
    }
}

/// Maps native points of one dataset into a frame
#[derive(Debug, Clone)]
pub struct Projector {
    slots: Vec<(usize, UnitConversion)>,
    longitude: Option<usize>,
}

impl Projector {
    /// Canonical frame coordinates of a native coordinate tuple
    pub fn project_coords(&self, coords: &[f64]) -> Vec<f64> {
        self.slots
            .iter()
            .enumerate()
            .map(|(frame_pos, (schema_pos, conversion))| {
                let value = conversion.apply(coords[*schema_pos]);
                if Some(frame_pos) == self.longitude {
                    geo::normalize_longitude(value)
                } else {
                    value
                }
            })
            .collect()
    }

    /// The same point expressed in the frame
    pub fn project(&self, point: &Point) -> Point {
        point.relocated(self.project_coords(point.coords()))
    }

    /// Unit conversion applied to a frame position
    pub fn conversion(&self, frame_pos: usize) -> UnitConversion {
        self.slots[frame_pos].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Coord;

    fn schema(coords: Vec<Coord>) -> Schema {
        Schema::new(coords).unwrap()
    }

    #[test]
    fn test_frame_is_intersection_in_canonical_order() {
        let a = schema(vec![
            Coord::time("days since 1970-01-01"),
            Coord::longitude(),
            Coord::latitude(),
        ]);
        let b = schema(vec![Coord::latitude(), Coord::longitude(), Coord::altitude()]);

        let frame = Frame::between(&a, &b).unwrap();
        assert_eq!(frame.dims(), &[Dim::Latitude, Dim::Longitude]);
        assert_eq!(frame.time(), None);
        assert_eq!(frame.vertical(), None);
    }

    #[test]
    fn test_disjoint_schemas_are_rejected() {
        let a = schema(vec![Coord::altitude()]);
        let b = schema(vec![Coord::time("days since 1970-01-01")]);
        assert!(Frame::between(&a, &b).unwrap_err().is_configuration());
    }

    #[test]
    fn test_altitude_preferred_as_vertical() {
        let frame = Frame::new([Dim::AirPressure, Dim::Altitude]).unwrap();
        assert_eq!(frame.vertical(), frame.position(Dim::Altitude));
    }

    #[test]
    fn test_projection_converts_units_and_wraps_longitude() {
        let native = schema(vec![
            Coord::new(Dim::Altitude, "alt", "km"),
            Coord::longitude(),
            Coord::time("hours since 1970-01-01 00:00:00"),
        ]);
        let frame = Frame::new([Dim::Longitude, Dim::Altitude, Dim::Time]).unwrap();
        let projector = frame.projector(&native).unwrap();

        let point = Point::new(vec![2.0, 350.0, 12.0], 1.0, true);
        let projected = projector.project(&point);

        assert_eq!(projected.coords(), &[-10.0, 2000.0, 0.5]);
        assert_eq!(projected.value(), 1.0);
    }

    #[test]
    fn test_separation_families() {
        let frame = Frame::new([Dim::Latitude, Dim::Longitude, Dim::Altitude, Dim::Time]).unwrap();
        let a = [0.0, 179.5, 100.0, 10.0];
        let b = [0.0, -179.5, 40.0, 12.5];

        let sep = frame.separation(&a, &b);
        assert!((sep.horizontal - 1.0).abs() < 1e-9);
        assert_eq!(sep.vertical, 60.0);
        assert_eq!(sep.temporal, 2.5);
    }
}
