//! Adapter for the PVGIS JSON API.
//!
//! Three coordinate-addressed operations share one payload style: a
//! `tmy` typical-year table, a `seriescalc` multi-year hourly series, and a
//! one-year `seriescalc` run with optimal angles. PVGIS rows carry dynamic
//! column sets, so rows are walked as `serde_json::Value` maps and unclaimed
//! columns are preserved verbatim under `extras`.

use crate::providers::error::ProviderError;
use crate::time::parse_compact_utc;
use crate::transport::{FetchOptions, Transport, TransportError};
use crate::types::coordinate::Coordinate;
use crate::types::optimal::OptimalSummary;
use crate::types::response::{
    IrradianceMetadata, IrradiancePoint, IrradianceResponse, IrradianceUnit, QueryType, Source,
};
use log::info;
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

/// TMY columns carrying the three canonical horizontal quantities.
const TMY_GHI: &str = "G(h)";
const TMY_DNI: &str = "Gb(n)";
const TMY_DHI: &str = "Gd(h)";

/// Plane-of-array component columns returned by `seriescalc` with
/// `components=1`: beam, diffuse and ground-reflected.
const POA_BEAM: &str = "Gb(i)";
const POA_DIFFUSE: &str = "Gd(i)";
const POA_REFLECTED: &str = "Gr(i)";

/// Years plausible in a coverage-window error message.
const MESSAGE_YEAR_MIN: i32 = 1900;
const MESSAGE_YEAR_MAX: i32 = 2100;

pub struct PvgisClient<'a, T> {
    transport: &'a T,
    base_url: &'a str,
    options: FetchOptions,
}

impl<'a, T: Transport> PvgisClient<'a, T> {
    pub fn new(transport: &'a T, base_url: &'a str, options: FetchOptions) -> Self {
        Self {
            transport,
            base_url,
            options,
        }
    }

    /// Fetches the typical-meteorological-year hourly table (8760 rows).
    ///
    /// `ghi`/`dni`/`dhi` are read directly from the `G(h)`/`Gb(n)`/`Gd(h)`
    /// columns; every other column is preserved under `extras`.
    pub async fn tmy(&self, coord: Coordinate) -> Result<IrradianceResponse, ProviderError> {
        let url = self.endpoint(
            "tmy",
            &[
                ("lat", coord.lat.to_string()),
                ("lon", coord.lon.to_string()),
                ("outputformat", "json".to_string()),
            ],
        )?;
        info!("fetching PVGIS TMY for ({}, {})", coord.lat, coord.lon);
        let payload = self.transport.fetch_json(url.as_str(), &self.options).await?;
        let rows = output_rows(&payload, "tmy_hourly")?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let mut point = IrradiancePoint::new(parse_compact_utc(row_time(row)?)?);
            point.ghi = field_number(row, TMY_GHI);
            point.dni = field_number(row, TMY_DNI);
            point.dhi = field_number(row, TMY_DHI);
            point.extras = collect_extras(row, &[TMY_GHI, TMY_DNI, TMY_DHI]);
            data.push(point);
        }

        Ok(IrradianceResponse {
            metadata: IrradianceMetadata {
                source: Source::Pvgis,
                query_type: QueryType::Tmy,
                lat: coord.lat,
                lon: coord.lon,
                time_ref: "UTC".to_string(),
                unit: IrradianceUnit::flux_wm2(),
                provider: None,
                raw_inputs: Some(serde_json::json!({
                    "lat": coord.lat,
                    "lon": coord.lon,
                })),
                cached: Some(false),
                request_url: Some(url.into()),
            },
            data,
        })
    }

    /// Fetches the multi-year hourly series with plane-of-array components.
    ///
    /// PVGIS does not return horizontal quantities in this mode, so canonical
    /// `ghi` is *derived* as `Gb(i) + Gd(i) + Gr(i)` (a missing component
    /// counts as zero) whenever at least one component is present, and `None`
    /// when all three are absent. `dni`/`dhi` stay `None`. At the default
    /// zero tilt the component sum equals horizontal GHI; at any other tilt
    /// it is the provider's own plane-of-array approximation and is passed
    /// through as-is rather than corrected. The components themselves are
    /// kept under `extras`.
    pub async fn series(
        &self,
        coord: Coordinate,
        start_year: i32,
        end_year: i32,
    ) -> Result<IrradianceResponse, ProviderError> {
        let url = self.endpoint(
            "seriescalc",
            &[
                ("lat", coord.lat.to_string()),
                ("lon", coord.lon.to_string()),
                ("startyear", start_year.to_string()),
                ("endyear", end_year.to_string()),
                ("components", "1".to_string()),
                ("outputformat", "json".to_string()),
            ],
        )?;
        info!(
            "fetching PVGIS series for ({}, {}) over {start_year}-{end_year}",
            coord.lat, coord.lon
        );
        let payload = self
            .transport
            .fetch_json(url.as_str(), &self.options)
            .await
            .map_err(reinterpret_year_window)?;
        let rows = output_rows(&payload, "hourly")?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let mut point = IrradiancePoint::new(parse_compact_utc(row_time(row)?)?);
            point.ghi = component_sum(row);
            point.extras = collect_extras(row, &[]);
            data.push(point);
        }

        Ok(IrradianceResponse {
            metadata: IrradianceMetadata {
                source: Source::Pvgis,
                query_type: QueryType::Series,
                lat: coord.lat,
                lon: coord.lon,
                time_ref: "UTC".to_string(),
                unit: IrradianceUnit::flux_wm2(),
                provider: None,
                raw_inputs: Some(serde_json::json!({
                    "lat": coord.lat,
                    "lon": coord.lon,
                    "startYear": start_year,
                    "endYear": end_year,
                })),
                cached: Some(false),
                request_url: Some(url.into()),
            },
            data,
        })
    }

    /// Runs one year with `optimalangles=1` and reduces it to an annual
    /// plane-of-array summary plus the provider-selected mounting angles.
    pub async fn optimal(
        &self,
        coord: Coordinate,
        year: i32,
    ) -> Result<OptimalSummary, ProviderError> {
        let url = self.endpoint(
            "seriescalc",
            &[
                ("lat", coord.lat.to_string()),
                ("lon", coord.lon.to_string()),
                ("startyear", year.to_string()),
                ("endyear", year.to_string()),
                ("components", "1".to_string()),
                ("optimalangles", "1".to_string()),
                ("outputformat", "json".to_string()),
            ],
        )?;
        info!(
            "fetching PVGIS optimal-orientation run for ({}, {}) in {year}",
            coord.lat, coord.lon
        );
        let payload = self
            .transport
            .fetch_json(url.as_str(), &self.options)
            .await
            .map_err(reinterpret_year_window)?;
        let rows = output_rows(&payload, "hourly")?;

        let flux_sum: f64 = rows
            .iter()
            .filter_map(|row| component_sum(row))
            .sum();

        Ok(OptimalSummary {
            lat: coord.lat,
            lon: coord.lon,
            start_year: year,
            end_year: year,
            optimal_tilt_deg: echoed_angle(&payload, "slope"),
            optimal_azimuth_deg: echoed_angle(&payload, "azimuth"),
            // Flux-sum over hourly samples, read as an energy index.
            annual_poa_kwh_m2: flux_sum / 1000.0,
            annual_poa_wm2_sum: flux_sum,
            request_url: Some(url.into()),
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, ProviderError> {
        Url::parse_with_params(&format!("{}/{path}", self.base_url), params).map_err(|source| {
            ProviderError::Url {
                provider: "pvgis",
                source,
            }
        })
    }
}

/// Sum of the three plane-of-array components; `None` only when all three
/// are absent; an all-zero row still yields `Some(0.0)`.
fn component_sum(row: &Value) -> Option<f64> {
    let beam = field_number(row, POA_BEAM);
    let diffuse = field_number(row, POA_DIFFUSE);
    let reflected = field_number(row, POA_REFLECTED);
    if beam.is_none() && diffuse.is_none() && reflected.is_none() {
        return None;
    }
    Some(beam.unwrap_or(0.0) + diffuse.unwrap_or(0.0) + reflected.unwrap_or(0.0))
}

fn output_rows<'v>(payload: &'v Value, table: &str) -> Result<&'v Vec<Value>, ProviderError> {
    payload
        .get("outputs")
        .and_then(|outputs| outputs.get(table))
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::PayloadShape {
            provider: "pvgis",
            section: format!("outputs.{table}"),
        })
}

/// TMY rows stamp their time column `time(UTC)`; series rows plain `time`.
fn row_time(row: &Value) -> Result<&str, ProviderError> {
    row.get("time(UTC)")
        .or_else(|| row.get("time"))
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::PayloadShape {
            provider: "pvgis",
            section: "row time".to_string(),
        })
}

fn field_number(row: &Value, key: &str) -> Option<f64> {
    row.get(key).and_then(Value::as_f64)
}

/// Every column except the timestamp and the explicitly claimed ones,
/// preserved verbatim.
fn collect_extras(row: &Value, claimed: &[&str]) -> BTreeMap<String, Value> {
    let Some(object) = row.as_object() else {
        return BTreeMap::new();
    };
    object
        .iter()
        .filter(|(key, _)| {
            key.as_str() != "time" && key.as_str() != "time(UTC)" && !claimed.contains(&key.as_str())
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Reads the provider-selected angle out of the request's input echo.
fn echoed_angle(payload: &Value, angle: &str) -> Option<f64> {
    payload
        .get("inputs")?
        .get("mounting_system")?
        .get("fixed")?
        .get(angle)?
        .get("value")?
        .as_f64()
}

/// Turns an upstream rejection whose message names the coordinate's valid
/// year window into a structured [`ProviderError::YearRange`]; anything else
/// passes through as a transport error.
fn reinterpret_year_window(err: TransportError) -> ProviderError {
    if let TransportError::HttpStatus { body, .. } = &err {
        // PVGIS error bodies are usually {"message": "..."}, sometimes bare text.
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("message")?.as_str().map(str::to_string))
            .unwrap_or_else(|| body.clone());
        if let Some((min, max)) = extract_year_range(&message) {
            return ProviderError::YearRange { min, max, message };
        }
    }
    ProviderError::Transport(err)
}

/// Text-mines a prose message for a valid-year window.
///
/// Deliberately tolerant: the message must mention "year" and contain at
/// least two four-digit tokens in a plausible range; the window is their
/// min/max. This breaks silently if the upstream ever rewords its messages;
/// a structured error code from the provider would be strictly better, but
/// none is offered today.
fn extract_year_range(message: &str) -> Option<(i32, i32)> {
    if !message.to_ascii_lowercase().contains("year") {
        return None;
    }
    let mut years = Vec::new();
    let mut digits = String::new();
    for ch in message.chars().chain(std::iter::once(' ')) {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else {
            if digits.len() == 4 {
                if let Ok(year) = digits.parse::<i32>() {
                    if (MESSAGE_YEAR_MIN..=MESSAGE_YEAR_MAX).contains(&year) {
                        years.push(year);
                    }
                }
            }
            digits.clear();
        }
    }
    if years.len() < 2 {
        return None;
    }
    let min = *years.iter().min()?;
    let max = *years.iter().max()?;
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use chrono::{TimeZone, Utc};

    const BASE: &str = "https://re.jrc.ec.europa.eu/api/v5_2";

    fn coord() -> Coordinate {
        Coordinate::new(30.27, 120.15).unwrap()
    }

    fn tmy_payload() -> String {
        serde_json::json!({
            "inputs": {},
            "outputs": {
                "tmy_hourly": [
                    {"time(UTC)": "20090101:0000", "T2m": -1.2, "G(h)": 0.0,
                     "Gb(n)": 0.0, "Gd(h)": 0.0, "WS10m": 2.0},
                    {"time(UTC)": "20090101:1200", "T2m": 4.5, "G(h)": 420.0,
                     "Gb(n)": 610.0, "Gd(h)": 130.0, "WS10m": 3.1},
                ]
            }
        })
        .to_string()
    }

    fn series_payload() -> String {
        serde_json::json!({
            "inputs": {},
            "outputs": {
                "hourly": [
                    {"time": "20200101:0010", "Gb(i)": 100.0, "Gd(i)": 50.0,
                     "Gr(i)": 5.0, "H_sun": 12.3},
                    {"time": "20200101:0110", "Gd(i)": 30.0},
                    {"time": "20200101:0210", "H_sun": 0.0},
                ]
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn tmy_reads_canonical_columns_directly() {
        let mock = MockTransport::new();
        mock.push_text(tmy_payload());
        let client = PvgisClient::new(&mock, BASE, FetchOptions::default());

        let response = client.tmy(coord()).await.unwrap();
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.metadata.source, Source::Pvgis);
        assert_eq!(response.metadata.query_type, QueryType::Tmy);
        assert_eq!(response.metadata.unit, IrradianceUnit::flux_wm2());

        let noon = &response.data[1];
        assert_eq!(noon.time, Utc.with_ymd_and_hms(2009, 1, 1, 12, 0, 0).unwrap());
        assert_eq!(noon.ghi, Some(420.0));
        assert_eq!(noon.dni, Some(610.0));
        assert_eq!(noon.dhi, Some(130.0));
        // Unclaimed columns survive, claimed ones are not duplicated.
        assert_eq!(noon.extra_number("T2m"), Some(4.5));
        assert!(!noon.extras.contains_key(TMY_GHI));
    }

    #[tokio::test]
    async fn series_derives_ghi_as_component_sum() {
        let mock = MockTransport::new();
        mock.push_text(series_payload());
        let client = PvgisClient::new(&mock, BASE, FetchOptions::default());

        let response = client.series(coord(), 2020, 2020).await.unwrap();
        assert_eq!(response.data[0].ghi, Some(155.0));
        // A single present component still sums (missing default to zero).
        assert_eq!(response.data[1].ghi, Some(30.0));
        // All three absent: null, not zero.
        assert_eq!(response.data[2].ghi, None);
        // This mode never supplies the horizontal quantities.
        assert!(response.data.iter().all(|p| p.dni.is_none() && p.dhi.is_none()));
        // Components are preserved for downstream fallback aggregation.
        assert_eq!(response.data[0].extra_number("Gb(i)"), Some(100.0));
        // Ascending UTC times.
        assert!(response.data.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[tokio::test]
    async fn series_requests_components_and_years() {
        let mock = MockTransport::new();
        mock.push_text(series_payload());
        let client = PvgisClient::new(&mock, BASE, FetchOptions::default());
        client.series(coord(), 2018, 2020).await.unwrap();

        let url = &mock.requests()[0];
        assert!(url.starts_with(&format!("{BASE}/seriescalc?")));
        assert!(url.contains("startyear=2018"));
        assert!(url.contains("endyear=2020"));
        assert!(url.contains("components=1"));
    }

    #[tokio::test]
    async fn optimal_sums_components_and_reads_echoed_angles() {
        let payload = serde_json::json!({
            "inputs": {
                "mounting_system": {
                    "fixed": {
                        "slope": {"value": 33.0, "optimal": true},
                        "azimuth": {"value": -2.0, "optimal": true}
                    }
                }
            },
            "outputs": {
                "hourly": [
                    {"time": "20200101:0010", "Gb(i)": 500.0, "Gd(i)": 100.0, "Gr(i)": 10.0},
                    {"time": "20200101:0110", "Gb(i)": 200.0, "Gd(i)": 100.0, "Gr(i)": 90.0},
                ]
            }
        })
        .to_string();
        let mock = MockTransport::new();
        mock.push_text(payload);
        let client = PvgisClient::new(&mock, BASE, FetchOptions::default());

        let summary = client.optimal(coord(), 2020).await.unwrap();
        assert_eq!(summary.annual_poa_wm2_sum, 1000.0);
        assert_eq!(summary.annual_poa_kwh_m2, 1.0);
        assert_eq!(summary.optimal_tilt_deg, Some(33.0));
        assert_eq!(summary.optimal_azimuth_deg, Some(-2.0));
        assert_eq!(summary.start_year, 2020);
        assert_eq!(summary.end_year, 2020);
        assert!(mock.requests()[0].contains("optimalangles=1"));
    }

    #[tokio::test]
    async fn optimal_angles_null_when_not_echoed() {
        let payload = serde_json::json!({
            "inputs": {},
            "outputs": {"hourly": []}
        })
        .to_string();
        let mock = MockTransport::new();
        mock.push_text(payload);
        let client = PvgisClient::new(&mock, BASE, FetchOptions::default());

        let summary = client.optimal(coord(), 2020).await.unwrap();
        assert_eq!(summary.optimal_tilt_deg, None);
        assert_eq!(summary.optimal_azimuth_deg, None);
        assert_eq!(summary.annual_poa_wm2_sum, 0.0);
    }

    #[tokio::test]
    async fn coverage_rejection_surfaces_structured_year_range() {
        let mock = MockTransport::new();
        mock.push_error(TransportError::HttpStatus {
            url: format!("{BASE}/seriescalc"),
            status: reqwest::StatusCode::BAD_REQUEST,
            body: serde_json::json!({
                "message": "startyear must be between 2005 and 2023 for this location"
            })
            .to_string(),
        });
        let client = PvgisClient::new(&mock, BASE, FetchOptions::default());

        match client.series(coord(), 1995, 1996).await {
            Err(ProviderError::YearRange { min, max, message }) => {
                assert_eq!((min, max), (2005, 2023));
                assert!(min <= max);
                assert!(message.contains("between"));
            }
            other => panic!("expected YearRange, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unrelated_rejection_stays_a_transport_error() {
        let mock = MockTransport::new();
        mock.push_error(TransportError::HttpStatus {
            url: format!("{BASE}/seriescalc"),
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: "upstream exploded".to_string(),
        });
        let client = PvgisClient::new(&mock, BASE, FetchOptions::default());
        assert!(matches!(
            client.series(coord(), 2020, 2020).await,
            Err(ProviderError::Transport(TransportError::HttpStatus { .. }))
        ));
    }

    #[test]
    fn year_extraction_needs_year_wording_and_two_tokens() {
        assert_eq!(
            extract_year_range("valid year range is 2005-2023"),
            Some((2005, 2023))
        );
        assert_eq!(extract_year_range("value must be between 2005 and 2023"), None);
        assert_eq!(extract_year_range("bad year 2020"), None);
        assert_eq!(extract_year_range("code 9999 year 8888"), None);
    }

    #[tokio::test]
    async fn missing_outputs_section_is_a_shape_error() {
        let mock = MockTransport::new();
        mock.push_text(r#"{"outputs": {}}"#);
        let client = PvgisClient::new(&mock, BASE, FetchOptions::default());
        assert!(matches!(
            client.tmy(coord()).await,
            Err(ProviderError::PayloadShape { .. })
        ));
    }
}
