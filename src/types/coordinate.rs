//! Validated geographic inputs and the input-validation error family.
//!
//! Every caller-supplied value that reaches an upstream provider is checked
//! here first; nothing in this crate issues a network call for an input that
//! failed validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Year bounds accepted for PVGIS range queries.
pub const MIN_YEAR: i32 = 1990;
pub const MAX_YEAR: i32 = 2100;

/// Minimum trimmed length for a free-text geocoding query.
pub const MIN_QUERY_LEN: usize = 2;

/// Maximum number of geocoding candidates that may be requested.
pub const MAX_GEOCODE_LIMIT: usize = 10;

/// Malformed or out-of-range caller input, rejected before any network call.
///
/// Always recoverable by the caller correcting the input.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("latitude {0} out of range [-90, 90]")]
    Latitude(f64),

    #[error("longitude {0} out of range [-180, 180]")]
    Longitude(f64),

    #[error("year {0} out of range [{MIN_YEAR}, {MAX_YEAR}]")]
    Year(i32),

    #[error("end year {end} precedes start year {start}")]
    YearOrder { start: i32, end: i32 },

    #[error("'{0}' is not a YYYY-MM-DD date")]
    Date(String),

    #[error("end date {end} precedes start date {start}")]
    DateOrder { start: NaiveDate, end: NaiveDate },

    #[error("geocoding query must be at least {MIN_QUERY_LEN} characters after trimming")]
    QueryTooShort,

    #[error("geocoding limit {0} exceeds maximum of {MAX_GEOCODE_LIMIT}")]
    LimitTooLarge(usize),
}

/// A WGS-84 coordinate, immutable once resolved.
///
/// Construction validates the bounds; a `Coordinate` that exists is always
/// inside them.
///
/// # Examples
///
/// ```
/// use heliodata::Coordinate;
///
/// let hangzhou = Coordinate::new(30.27, 120.15).unwrap();
/// assert_eq!(hangzhou.lat, 30.27);
/// assert!(Coordinate::new(91.0, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Creates a validated coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Latitude`] or [`ValidationError::Longitude`]
    /// when the value falls outside WGS-84 bounds.
    pub fn new(lat: f64, lon: f64) -> Result<Self, ValidationError> {
        if !(-90.0..=90.0).contains(&lat) || !lat.is_finite() {
            return Err(ValidationError::Latitude(lat));
        }
        if !(-180.0..=180.0).contains(&lon) || !lon.is_finite() {
            return Err(ValidationError::Longitude(lon));
        }
        Ok(Self { lat, lon })
    }
}

/// Validates an inclusive year range for PVGIS queries.
pub fn validate_year_range(start: i32, end: i32) -> Result<(), ValidationError> {
    for year in [start, end] {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(ValidationError::Year(year));
        }
    }
    if end < start {
        return Err(ValidationError::YearOrder { start, end });
    }
    Ok(())
}

/// Parses a `YYYY-MM-DD` pair and checks `end >= start`.
pub fn validate_date_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    let parse = |s: &str| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ValidationError::Date(s.to_string()))
    };
    let start = parse(start)?;
    let end = parse(end)?;
    if end < start {
        return Err(ValidationError::DateOrder { start, end });
    }
    Ok((start, end))
}
