//! Geographic utility functions.
//!
//! Great-circle separations, longitude wrapping around the dateline and the
//! bounds used to turn a horizontal separation into per-axis search windows.

/// Mean radius of the Earth in kilometres
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0;

/// Normalize a longitude value to the range [-180, 180)
pub fn normalize_longitude(lon: f64) -> f64 {
    let mut normalized = (lon + 180.0).rem_euclid(360.0) - 180.0;

    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= 180.0 {
        normalized -= 360.0;
    }

    normalized
}

/// Signed difference `b - a` of two longitudes, wrapped into (-180, 180]
pub fn signed_longitude_difference(a: f64, b: f64) -> f64 {
    let diff = normalize_longitude(b - a);
    if diff == -180.0 {
        180.0
    } else {
        diff
    }
}

/// Absolute angular difference of two longitudes in [0, 180]
pub fn longitude_difference(a: f64, b: f64) -> f64 {
    signed_longitude_difference(a, b).abs()
}

/// Great-circle separation of two positions in degrees of arc (haversine)
pub fn great_circle_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = phi2 - phi1;
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);

    (2.0 * a.sqrt().min(1.0).asin()).to_degrees()
}

/// Convert a surface distance in kilometres to degrees of arc
pub fn km_to_degrees(km: f64) -> f64 {
    (km / EARTH_MEAN_RADIUS_KM).to_degrees()
}

/// Convert degrees of arc to a surface distance in kilometres
pub fn degrees_to_km(degrees: f64) -> f64 {
    degrees.to_radians() * EARTH_MEAN_RADIUS_KM
}

/// Largest longitude offset reachable within `radius` degrees of arc from `lat`.
///
/// Returns `None` when the cap touches a pole, in which case every longitude
/// is reachable.
pub fn longitude_half_width(lat: f64, radius: f64) -> Option<f64> {
    if radius >= 180.0 || lat.abs() + radius >= 90.0 {
        return None;
    }

    let ratio = radius.to_radians().sin() / lat.to_radians().cos();
    if ratio >= 1.0 {
        None
    } else {
        Some(ratio.asin().to_degrees())
    }
}

/// Split a longitude interval into intervals inside [-180, 180]
pub fn wrap_longitude_interval(lo: f64, hi: f64) -> Vec<(f64, f64)> {
    if hi - lo >= 360.0 {
        return vec![(-180.0, 180.0)];
    }

    let start = normalize_longitude(lo);
    let end = start + (hi - lo);

    if end <= 180.0 {
        vec![(start, end)]
    } else {
        vec![(start, 180.0), (-180.0, end - 360.0)]
    }
}

/// Lower bound of the great-circle separation between a position and any
/// position inside a latitude/longitude box, in degrees of arc
pub fn min_great_circle_to_box(
    lat: f64,
    lon: f64,
    lat_range: (f64, f64),
    lon_range: (f64, f64),
) -> f64 {
    let dlon = if lon >= lon_range.0 && lon <= lon_range.1 {
        0.0
    } else {
        longitude_difference(lon, lon_range.0).min(longitude_difference(lon, lon_range.1))
    };

    // cos(d) = a sin(t) + b cos(t) over t in the latitude range; a smaller
    // longitude offset can only bring the box closer.
    let phi = lat.to_radians();
    let a = phi.sin();
    let b = phi.cos() * dlon.to_radians().cos();

    let lo = lat_range.0.to_radians();
    let hi = lat_range.1.to_radians();
    let peak = a.atan2(b);

    let best_cos = if peak >= lo && peak <= hi {
        (a * a + b * b).sqrt()
    } else {
        (a * lo.sin() + b * lo.cos()).max(a * hi.sin() + b * hi.cos())
    };

    best_cos.clamp(-1.0, 1.0).acos().to_degrees()
}
