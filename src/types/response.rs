//! The canonical record shapes every provider is normalized into.
//!
//! Both adapters emit the same [`IrradianceResponse`]; downstream code never
//! sees a provider-native payload. Points always carry a UTC instant, the
//! three standard horizontal quantities where the provider supplies (or the
//! pipeline can unambiguously derive) them, and every remaining provider
//! column verbatim under `extras` so no information is silently dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which upstream produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Pvgis,
    Cams,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Pvgis => write!(f, "pvgis"),
            Source::Cams => write!(f, "cams"),
        }
    }
}

/// Whether a response is a typical-year table or a dated series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Tmy,
    Series,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::Tmy => write!(f, "tmy"),
            QueryType::Series => write!(f, "series"),
        }
    }
}

/// The physical quantity a series carries.
///
/// Serializes externally tagged, so a response holds exactly one of
/// `{"irradiance": "W/m2"}` (instantaneous power flux) or
/// `{"irradiation": "Wh/m2"}` (energy integral), never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IrradianceUnit {
    /// Power flux, e.g. `W/m2`.
    Irradiance(String),
    /// Energy integral, e.g. `Wh/m2` or `kWh/m2`.
    Irradiation(String),
}

impl IrradianceUnit {
    pub fn flux_wm2() -> Self {
        IrradianceUnit::Irradiance("W/m2".to_string())
    }

    pub fn energy_whm2() -> Self {
        IrradianceUnit::Irradiation("Wh/m2".to_string())
    }
}

/// One sample of the canonical series.
///
/// `time` is always UTC regardless of provider. `ghi`/`dni`/`dhi` are `None`
/// when the provider neither supplies nor lets us unambiguously derive them;
/// the raw provider fields live on under `extras` (numbers stay numbers,
/// non-numeric strings pass through unchanged).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrradiancePoint {
    pub time: DateTime<Utc>,
    pub ghi: Option<f64>,
    pub dni: Option<f64>,
    pub dhi: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl IrradiancePoint {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time,
            ghi: None,
            dni: None,
            dhi: None,
            extras: BTreeMap::new(),
        }
    }

    /// Reads a numeric extra, if present and numeric.
    pub fn extra_number(&self, key: &str) -> Option<f64> {
        self.extras.get(key).and_then(serde_json::Value::as_f64)
    }
}

/// Full provenance for a response, enough to replay or audit the fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrradianceMetadata {
    pub source: Source,
    pub query_type: QueryType,
    pub lat: f64,
    pub lon: f64,
    /// Always `"UTC"`; kept explicit so exported files are self-describing.
    pub time_ref: String,
    pub unit: IrradianceUnit,
    /// Upstream-reported product name, when the payload carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// The request parameters as issued, for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_inputs: Option<serde_json::Value>,
    /// `true` when the response was served from the fingerprint cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    /// The exact upstream URL issued, credentials redacted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
}

/// The canonical unit returned by every adapter: provenance plus an ordered,
/// time-ascending sequence of points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrradianceResponse {
    pub metadata: IrradianceMetadata,
    pub data: Vec<IrradiancePoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_serializes_exactly_one_field() {
        let flux = serde_json::to_value(IrradianceUnit::flux_wm2()).unwrap();
        assert_eq!(flux, serde_json::json!({"irradiance": "W/m2"}));

        let energy = serde_json::to_value(IrradianceUnit::energy_whm2()).unwrap();
        assert_eq!(energy, serde_json::json!({"irradiation": "Wh/m2"}));
    }

    #[test]
    fn source_and_query_type_tags() {
        assert_eq!(serde_json::to_value(Source::Pvgis).unwrap(), "pvgis");
        assert_eq!(serde_json::to_value(QueryType::Tmy).unwrap(), "tmy");
        assert_eq!(Source::Cams.to_string(), "cams");
    }
}
