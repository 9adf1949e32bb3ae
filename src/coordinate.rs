//! Coordinate parsing for composite `lon|lat` fields.
//!
//! Source tables come from spreadsheets with mixed locales, so both `9,70`
//! and `9.70` are accepted as decimal numbers.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A longitude/latitude pair in degrees.
///
/// Note the ordering: the matrix service expects `[lon, lat]`, unlike the
/// `(lat, lng)` tuples common in other routing APIs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

impl Coord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// The `[lon, lat]` array used in matrix request payloads.
    pub fn as_pair(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// Parse a single decimal number, accepting a comma as decimal separator.
pub fn parse_decimal(value: &str) -> Result<f64, Error> {
    let normalized = value.trim().replace(',', ".");
    let parsed: f64 = normalized
        .parse()
        .map_err(|err: std::num::ParseFloatError| Error::MalformedCoordinate {
            input: value.to_string(),
            reason: err.to_string(),
        })?;

    if !parsed.is_finite() {
        return Err(Error::MalformedCoordinate {
            input: value.to_string(),
            reason: "value is not finite".to_string(),
        });
    }

    Ok(parsed)
}

/// Parse a `"<lon>|<lat>"` field into a [`Coord`].
///
/// Fails unless the field holds exactly one `|` with a number on each side.
pub fn parse_lon_lat(value: &str) -> Result<Coord, Error> {
    let mut parts = value.split('|');
    let (Some(lon), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::MalformedCoordinate {
            input: value.to_string(),
            reason: "expected exactly one '|' separator".to_string(),
        });
    };

    let lon = parse_decimal(lon).map_err(|err| rewrap(value, err))?;
    let lat = parse_decimal(lat).map_err(|err| rewrap(value, err))?;
    Ok(Coord::new(lon, lat))
}

/// Report failures against the whole composite field, not just one half.
fn rewrap(field: &str, err: Error) -> Error {
    match err {
        Error::MalformedCoordinate { reason, .. } => Error::MalformedCoordinate {
            input: field.to_string(),
            reason,
        },
        other => other,
    }
}
