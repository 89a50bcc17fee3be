//! Conversion of coordinate units to the canonical units used for comparison.
//!
//! Latitude and longitude are compared in degrees, altitude in metres, air
//! pressure in hectopascal and time in fractional days since the Unix epoch.
//! Time units follow the CF convention `<unit> since <reference>`.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{CollocError, Result};
use crate::point::Dim;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Linear map from a native unit to the canonical unit: `value * scale + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConversion {
    scale: f64,
    offset: f64,
}

impl UnitConversion {
    /// The identity conversion
    pub const IDENTITY: UnitConversion = UnitConversion {
        scale: 1.0,
        offset: 0.0,
    };

    fn scaled(scale: f64) -> Self {
        Self { scale, offset: 0.0 }
    }

    /// Convert a native value to canonical units
    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }

    /// Convert a canonical value back to native units
    pub fn invert(&self, value: f64) -> f64 {
        (value - self.offset) / self.scale
    }
}

/// Find the conversion of `units` to the canonical unit of `dim`
pub fn canonical_conversion(dim: Dim, units: &str) -> Result<UnitConversion> {
    let normalized = units.trim();
    let lower = normalized.to_lowercase();

    let conversion = match dim {
        Dim::Latitude | Dim::Longitude => match lower.as_str() {
            "degrees_north" | "degree_north" | "degrees_n" | "degree_n" | "degrees_east"
            | "degree_east" | "degrees_e" | "degree_e" | "degrees" | "degree" | "deg" => {
                Some(UnitConversion::IDENTITY)
            }
            "radians" | "radian" | "rad" => Some(UnitConversion::scaled(180.0 / std::f64::consts::PI)),
            _ => None,
        },
        Dim::Altitude => match lower.as_str() {
            "m" | "meter" | "meters" | "metre" | "metres" => Some(UnitConversion::IDENTITY),
            "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => {
                Some(UnitConversion::scaled(1000.0))
            }
            "ft" | "feet" => Some(UnitConversion::scaled(0.3048)),
            _ => None,
        },
        Dim::AirPressure => match lower.as_str() {
            "hpa" | "mbar" | "millibar" | "millibars" | "mb" => Some(UnitConversion::IDENTITY),
            "pa" => Some(UnitConversion::scaled(0.01)),
            "kpa" => Some(UnitConversion::scaled(10.0)),
            _ => None,
        },
        Dim::Time => Some(parse_time_units(normalized)?),
    };

    conversion.ok_or_else(|| {
        CollocError::config(format!("Unsupported units '{}' for dimension {}", units, dim))
    })
}

/// Parse CF time units such as `hours since 2000-01-01 00:00:00`
pub fn parse_time_units(units: &str) -> Result<UnitConversion> {
    let lower = units.to_lowercase();
    let (unit, reference) = match lower.split_once(" since ") {
        Some((unit, reference)) => (unit.trim().to_string(), Some(reference.trim().to_string())),
        None => (lower.trim().to_string(), None),
    };

    let seconds_per_unit = match unit.as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600.0,
        "d" | "day" | "days" => SECONDS_PER_DAY,
        _ => {
            return Err(CollocError::config(format!(
                "Unsupported time units '{}'",
                units
            )))
        }
    };

    let offset = match reference {
        Some(reference) => {
            let epoch = parse_reference_time(&reference).ok_or_else(|| {
                CollocError::config(format!(
                    "Could not parse reference time '{}' in units '{}'",
                    reference, units
                ))
            })?;
            epoch.and_utc().timestamp_millis() as f64 / (SECONDS_PER_DAY * 1000.0)
        }
        None => 0.0,
    };

    Ok(UnitConversion {
        scale: seconds_per_unit / SECONDS_PER_DAY,
        offset,
    })
}

/// Parse the reference part of a CF time unit
fn parse_reference_time(reference: &str) -> Option<NaiveDateTime> {
    let trimmed = reference
        .trim_end_matches(" utc")
        .trim_end_matches('z')
        .trim();

    const DATETIME_FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dt%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dt%H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Express a chrono time delta in canonical days
pub fn delta_to_days(delta: chrono::TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / (SECONDS_PER_DAY * 1000.0)
}
