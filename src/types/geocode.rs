//! Geocoding result shapes.

use serde::{Deserialize, Serialize};

/// One coordinate candidate for a free-text query.
///
/// Candidates are meaningful only as an ordered list: the provider's ranking
/// is preserved verbatim and the first entry is its best match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeCandidate {
    pub lat: f64,
    pub lon: f64,
    /// Human-readable label, e.g. "Hangzhou, Zhejiang, China".
    pub display_name: String,
    /// Which geocoding provider produced the candidate.
    pub provider: String,
    /// Provider ranking score, when it reports one. Higher is better.
    pub confidence: Option<f64>,
}

/// The full result of one geocoding call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeResult {
    /// The exact upstream URL issued.
    pub request_url: String,
    /// Candidates in provider ranking order. Empty means "no match" and is
    /// valid output, not an error.
    pub candidates: Vec<GeocodeCandidate>,
    /// The country restriction applied, if any.
    pub country_codes: Option<Vec<String>>,
}
