//! Decodes each provider's native timestamp encoding into one canonical
//! `DateTime<Utc>`.
//!
//! PVGIS writes fixed-width `YYYYMMDD:HHMM` stamps that are UTC by
//! convention; CAMS writes an observation-period interval `START/END` whose
//! `START` may or may not carry an offset. Both converge here; no other
//! module may reason about provider-native timestamp strings.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeFormatError {
    #[error("'{0}' does not match the YYYYMMDD:HHMM pattern")]
    CompactPattern(String),

    #[error("observation period '{0}' has no start timestamp")]
    MissingStart(String),

    #[error("cannot parse observation period start '{0}'")]
    PeriodStart(String),
}

/// Parses a PVGIS `YYYYMMDD:HHMM` stamp. The pattern must match exactly;
/// the instant is UTC by provider convention.
///
/// chrono's numeric specifiers tolerate short fields, so the fixed-width
/// shape is checked up front: 13 bytes, a colon at offset 8, digits
/// everywhere else.
pub fn parse_compact_utc(value: &str) -> Result<DateTime<Utc>, TimeFormatError> {
    let bytes = value.as_bytes();
    let shaped = bytes.len() == 13
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b':'
        && bytes[9..].iter().all(u8::is_ascii_digit);
    if !shaped {
        return Err(TimeFormatError::CompactPattern(value.to_string()));
    }
    NaiveDateTime::parse_from_str(value, "%Y%m%d:%H%M")
        .map(|naive| naive.and_utc())
        .map_err(|_| TimeFormatError::CompactPattern(value.to_string()))
}

/// Parses a CAMS observation period `START/END`, keeping only `START` as the
/// point timestamp. An explicit offset on `START` is honored; an absent
/// offset means UTC.
pub fn parse_observation_period(value: &str) -> Result<DateTime<Utc>, TimeFormatError> {
    let start = value
        .split('/')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TimeFormatError::MissingStart(value.to_string()))?;

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(start) {
        return Ok(with_offset.with_timezone(&Utc));
    }
    // No offset marker: a bare ISO datetime, fractional seconds optional.
    NaiveDateTime::parse_from_str(start, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| TimeFormatError::PeriodStart(start.to_string()))
}
