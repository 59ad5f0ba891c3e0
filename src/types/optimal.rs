//! The optimal-orientation summary derived from a one-year PVGIS run.

use serde::{Deserialize, Serialize};

/// Annual plane-of-array totals for the provider-selected optimal mounting,
/// recomputed per (coordinate, year) on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimalSummary {
    pub lat: f64,
    pub lon: f64,
    pub start_year: i32,
    pub end_year: i32,
    /// Provider-selected tilt in degrees, when echoed back.
    pub optimal_tilt_deg: Option<f64>,
    /// Provider-selected azimuth in degrees, when echoed back.
    pub optimal_azimuth_deg: Option<f64>,
    /// Annual plane-of-array energy index, kWh/m² (flux sum ÷ 1000).
    pub annual_poa_kwh_m2: f64,
    /// Raw sum of hourly plane-of-array flux values, W/m².
    pub annual_poa_wm2_sum: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
}
