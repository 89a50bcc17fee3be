//! Test data generation utilities.
//!
//! This module provides builders for gridded and ungridded datasets with
//! known data patterns.

use colloc::{Coord, DimCoord, GriddedData, Schema, UngriddedData, VariableMeta};

pub const TIME_UNITS: &str = "days since 2000-01-01";

/// Points along the latitude axis only
pub fn latitude_line(name: &str, lats: &[f64], values: &[f64]) -> UngriddedData {
    UngriddedData::new(
        VariableMeta::new(name),
        Schema::new(vec![Coord::latitude()]).unwrap(),
        vec![lats.to_vec()],
        values.to_vec(),
    )
    .unwrap()
    .mask_non_finite()
}

/// Points with latitude and longitude
pub fn surface_points(name: &str, points: &[(f64, f64)], values: &[f64]) -> UngriddedData {
    UngriddedData::new(
        VariableMeta::new(name),
        Schema::new(vec![Coord::latitude(), Coord::longitude()]).unwrap(),
        vec![
            points.iter().map(|p| p.0).collect(),
            points.iter().map(|p| p.1).collect(),
        ],
        values.to_vec(),
    )
    .unwrap()
    .mask_non_finite()
}

/// Points with latitude, longitude and time
pub fn track(name: &str, points: &[(f64, f64, f64)], values: &[f64]) -> UngriddedData {
    UngriddedData::new(
        VariableMeta::new(name).with_filenames(vec![format!("{}.csv", name)]),
        Schema::new(vec![Coord::latitude(), Coord::longitude(), Coord::time(TIME_UNITS)]).unwrap(),
        vec![
            points.iter().map(|p| p.0).collect(),
            points.iter().map(|p| p.1).collect(),
            points.iter().map(|p| p.2).collect(),
        ],
        values.to_vec(),
    )
    .unwrap()
    .mask_non_finite()
}

/// A latitude/longitude grid filled by `f(lat, lon)`
pub fn lat_lon_grid(name: &str, lats: &[f64], lons: &[f64], f: impl Fn(f64, f64) -> f64) -> GriddedData {
    let values = lats
        .iter()
        .flat_map(|&lat| lons.iter().map(move |&lon| (lat, lon)))
        .map(|(lat, lon)| f(lat, lon))
        .collect();
    GriddedData::from_vec(
        VariableMeta::new(name)
            .with_units("1")
            .with_filenames(vec![format!("{}.nc", name)]),
        vec![
            DimCoord::new(Coord::latitude(), lats.to_vec()),
            DimCoord::new(Coord::longitude(), lons.to_vec()),
        ],
        values,
    )
    .unwrap()
    .mask_non_finite()
}

/// A one-dimensional latitude grid
pub fn latitude_grid(name: &str, lats: &[f64], values: &[f64]) -> GriddedData {
    GriddedData::from_vec(
        VariableMeta::new(name),
        vec![DimCoord::new(Coord::latitude(), lats.to_vec())],
        values.to_vec(),
    )
    .unwrap()
    .mask_non_finite()
}

/// Evenly spaced values from `start`, `n` of them
pub fn axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Deterministic pseudo-random points within a latitude/longitude box
pub fn scatter(n: usize, seed: u64, lat: (f64, f64), lon: (f64, f64)) -> Vec<(f64, f64)> {
    let mut state = seed.max(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..n)
        .map(|_| {
            let a = lat.0 + (lat.1 - lat.0) * next();
            let b = lon.0 + (lon.1 - lon.0) * next();
            (a, b)
        })
        .collect()
}
