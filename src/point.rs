//! The point model.
//!
//! A [`Point`] is one sample: an ordered tuple of coordinates laid out according
//! to a [`Schema`], a value and a validity flag. All points of one dataset share
//! the same schema, and a point's coordinates cannot be changed once built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CollocError, Result};

/// The physical kind of a coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dim {
    /// Latitude in degrees north
    Latitude,
    /// Longitude in degrees east
    Longitude,
    /// Height above the surface
    Altitude,
    /// Vertical level as air pressure
    AirPressure,
    /// Time relative to a reference epoch
    Time,
}

impl Dim {
    /// All kinds in canonical frame order
    pub const ALL: [Dim; 5] = [
        Dim::Latitude,
        Dim::Longitude,
        Dim::Altitude,
        Dim::AirPressure,
        Dim::Time,
    ];

    /// CF standard name of this kind
    pub fn standard_name(&self) -> &'static str {
        match self {
            Dim::Latitude => "latitude",
            Dim::Longitude => "longitude",
            Dim::Altitude => "altitude",
            Dim::AirPressure => "air_pressure",
            Dim::Time => "time",
        }
    }

    /// Whether this kind measures a vertical level
    pub fn is_vertical(&self) -> bool {
        matches!(self, Dim::Altitude | Dim::AirPressure)
    }

    /// Whether this kind is part of the horizontal position
    pub fn is_horizontal(&self) -> bool {
        matches!(self, Dim::Latitude | Dim::Longitude)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.standard_name())
    }
}

impl FromStr for Dim {
    type Err = CollocError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lat" | "latitude" | "y" => Ok(Dim::Latitude),
            "lon" | "long" | "longitude" | "x" => Ok(Dim::Longitude),
            "alt" | "altitude" | "height" | "z" => Ok(Dim::Altitude),
            "pres" | "pressure" | "air_pressure" | "p" => Ok(Dim::AirPressure),
            "time" | "t" => Ok(Dim::Time),
            _ => Err(CollocError::InvalidParameter {
                param: "dimension".to_string(),
                message: format!("Unknown dimension: {}", s),
            }),
        }
    }
}

/// Metadata describing one coordinate of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    /// Physical kind
    pub dim: Dim,
    /// Name of the coordinate variable
    pub name: String,
    /// Units string, e.g. `degrees_north` or `days since 2000-01-01`
    pub units: String,
}

impl Coord {
    /// Create a coordinate description
    pub fn new(dim: Dim, name: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            dim,
            name: name.into(),
            units: units.into(),
        }
    }

    /// Latitude in degrees north
    pub fn latitude() -> Self {
        Self::new(Dim::Latitude, "latitude", "degrees_north")
    }

    /// Longitude in degrees east
    pub fn longitude() -> Self {
        Self::new(Dim::Longitude, "longitude", "degrees_east")
    }

    /// Altitude in metres
    pub fn altitude() -> Self {
        Self::new(Dim::Altitude, "altitude", "m")
    }

    /// Air pressure in hectopascal
    pub fn air_pressure() -> Self {
        Self::new(Dim::AirPressure, "air_pressure", "hPa")
    }

    /// Time with the given units, e.g. `days since 1970-01-01`
    pub fn time(units: impl Into<String>) -> Self {
        Self::new(Dim::Time, "time", units)
    }
}

/// The ordered coordinate layout shared by all points of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coord>", into = "Vec<Coord>")]
pub struct Schema {
    coords: Vec<Coord>,
}

impl Schema {
    /// Create a schema; each dimension kind may appear at most once
    pub fn new(coords: Vec<Coord>) -> Result<Self> {
        for (i, coord) in coords.iter().enumerate() {
            if coords[..i].iter().any(|other| other.dim == coord.dim) {
                return Err(CollocError::InvalidCoordinates {
                    message: format!("Dimension {} appears more than once", coord.dim),
                });
            }
        }
        Ok(Self { coords })
    }

    /// Coordinates in schema order
    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    /// Number of coordinates
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Whether the schema has no coordinates
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Position of a dimension kind within the schema
    pub fn position(&self, dim: Dim) -> Option<usize> {
        self.coords.iter().position(|c| c.dim == dim)
    }

    /// Coordinate description for a dimension kind
    pub fn coord(&self, dim: Dim) -> Option<&Coord> {
        self.coords.iter().find(|c| c.dim == dim)
    }

    /// Whether the schema contains a dimension kind
    pub fn contains(&self, dim: Dim) -> bool {
        self.position(dim).is_some()
    }

    /// Dimension kinds in schema order
    pub fn dims(&self) -> impl Iterator<Item = Dim> + '_ {
        self.coords.iter().map(|c| c.dim)
    }
}

impl TryFrom<Vec<Coord>> for Schema {
    type Error = CollocError;

    fn try_from(coords: Vec<Coord>) -> Result<Self> {
        Schema::new(coords)
    }
}

impl From<Schema> for Vec<Coord> {
    fn from(schema: Schema) -> Self {
        schema.coords
    }
}

/// A single sample
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    coords: Box<[f64]>,
    value: f64,
    valid: bool,
}

impl Point {
    /// Create a point with a value and validity flag
    pub fn new(coords: impl Into<Box<[f64]>>, value: f64, valid: bool) -> Self {
        Self {
            coords: coords.into(),
            value,
            valid,
        }
    }

    /// Create a point that carries a location but no value
    pub fn coordinates_only(coords: impl Into<Box<[f64]>>) -> Self {
        Self::new(coords, f64::NAN, true)
    }

    /// Coordinates in schema order
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Coordinate at a schema position
    pub fn coord(&self, position: usize) -> f64 {
        self.coords[position]
    }

    /// Number of coordinates
    pub fn dimensionality(&self) -> usize {
        self.coords.len()
    }

    /// The raw value (NaN when undefined)
    pub fn value(&self) -> f64 {
        self.value
    }

    /// The validity flag
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the value may take part in an aggregation
    pub fn is_usable(&self) -> bool {
        self.valid && self.value.is_finite()
    }

    /// Same value and validity at another location
    pub(crate) fn relocated(&self, coords: Vec<f64>) -> Self {
        Self::new(coords, self.value, self.valid)
    }
}
