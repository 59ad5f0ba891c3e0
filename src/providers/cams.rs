//! Adapter for the CAMS radiation service behind the SoDa WPS endpoint.
//!
//! CAMS answers with a line-oriented CSV dialect: `#`-prefixed lines carry
//! `key: value` metadata until a marker line starting with
//! `Observation period;` announces the semicolon-delimited column header,
//! after which every non-comment line is a data record. The account email is
//! server-side configuration and is redacted from the recorded request URL.

use crate::providers::error::ProviderError;
use crate::time::parse_observation_period;
use crate::transport::{FetchOptions, Transport};
use crate::types::coordinate::Coordinate;
use crate::types::response::{
    IrradianceMetadata, IrradiancePoint, IrradianceResponse, IrradianceUnit, QueryType, Source,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Header cell introducing the column header line.
const HEADER_MARKER: &str = "Observation period;";

/// Canonical quantity columns. CAMS names direct normal irradiance `BNI`.
const COL_GHI: &str = "GHI";
const COL_DNI: &str = "BNI";
const COL_DHI: &str = "DHI";

/// Supported aggregation periods, from 1-minute to monthly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CamsTimeStep {
    OneMinute,
    FifteenMinutes,
    Hourly,
    Daily,
    Monthly,
}

impl CamsTimeStep {
    /// WPS `summarization` code.
    pub fn summarization(&self) -> &'static str {
        match self {
            CamsTimeStep::OneMinute => "PT01M",
            CamsTimeStep::FifteenMinutes => "PT15M",
            CamsTimeStep::Hourly => "PT01H",
            CamsTimeStep::Daily => "P01D",
            CamsTimeStep::Monthly => "M01",
        }
    }

    /// Step length in hours at `at`, used to turn energy integrals into mean
    /// flux. Month lengths vary, so the monthly step consults the timestamp.
    fn step_hours(&self, at: DateTime<Utc>) -> f64 {
        match self {
            CamsTimeStep::OneMinute => 1.0 / 60.0,
            CamsTimeStep::FifteenMinutes => 0.25,
            CamsTimeStep::Hourly => 1.0,
            CamsTimeStep::Daily => 24.0,
            CamsTimeStep::Monthly => f64::from(days_in_month(at.year(), at.month())) * 24.0,
        }
    }
}

impl fmt::Display for CamsTimeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summarization())
    }
}

/// Radiation model: actual-atmosphere all-sky or cloud-free clear-sky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CamsModel {
    AllSky,
    ClearSky,
}

impl CamsModel {
    /// WPS process identifier.
    pub fn identifier(&self) -> &'static str {
        match self {
            CamsModel::AllSky => "get_cams_radiation",
            CamsModel::ClearSky => "get_mcclear",
        }
    }
}

impl fmt::Display for CamsModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

pub struct CamsClient<'a, T> {
    transport: &'a T,
    base_url: &'a str,
    email: &'a str,
    options: FetchOptions,
}

impl<'a, T: Transport> CamsClient<'a, T> {
    pub fn new(transport: &'a T, base_url: &'a str, email: &'a str, options: FetchOptions) -> Self {
        Self {
            transport,
            base_url,
            email,
            options,
        }
    }

    /// Fetches a series for a closed date range.
    ///
    /// CAMS always delivers energy integrals per summarization period. With
    /// `integrated` the Wh/m² values pass through and the response reports an
    /// irradiation unit; without it each canonical value is divided by the
    /// step length in hours, yielding mean W/m² flux. Extras keep the raw
    /// provider values either way.
    pub async fn series(
        &self,
        coord: Coordinate,
        start: NaiveDate,
        end: NaiveDate,
        time_step: CamsTimeStep,
        model: CamsModel,
        integrated: bool,
    ) -> Result<IrradianceResponse, ProviderError> {
        let url = self.wps_url(coord, start, end, time_step, model, self.email)?;
        let redacted = self.wps_url(coord, start, end, time_step, model, "***")?;
        info!(
            "fetching CAMS {} series for ({}, {}) from {start} to {end}",
            model, coord.lat, coord.lon
        );

        let body = self.transport.fetch_text(url.as_str(), &self.options).await?;
        let (file_metadata, mut data) = parse_cams_csv(&body)?;

        if !integrated {
            for point in &mut data {
                let hours = time_step.step_hours(point.time);
                point.ghi = point.ghi.map(|v| v / hours);
                point.dni = point.dni.map(|v| v / hours);
                point.dhi = point.dhi.map(|v| v / hours);
            }
        }

        Ok(IrradianceResponse {
            metadata: IrradianceMetadata {
                source: Source::Cams,
                query_type: QueryType::Series,
                lat: coord.lat,
                lon: coord.lon,
                time_ref: "UTC".to_string(),
                unit: if integrated {
                    IrradianceUnit::energy_whm2()
                } else {
                    IrradianceUnit::flux_wm2()
                },
                provider: file_metadata.get("Title").cloned(),
                raw_inputs: Some(serde_json::json!({
                    "lat": coord.lat,
                    "lon": coord.lon,
                    "start": start.to_string(),
                    "end": end.to_string(),
                    "timeStep": time_step.summarization(),
                    "model": model.identifier(),
                    "integrated": integrated,
                })),
                cached: Some(false),
                request_url: Some(redacted.into()),
            },
            data,
        })
    }

    fn wps_url(
        &self,
        coord: Coordinate,
        start: NaiveDate,
        end: NaiveDate,
        time_step: CamsTimeStep,
        model: CamsModel,
        username: &str,
    ) -> Result<Url, ProviderError> {
        // SoDa expects the account email with '@' double-encoded.
        let data_inputs = format!(
            "latitude={};longitude={};altitude=-999;date_begin={};date_end={};time_ref=UT;summarization={};username={}",
            coord.lat,
            coord.lon,
            start,
            end,
            time_step.summarization(),
            username.replace('@', "%2540"),
        );
        Url::parse_with_params(
            self.base_url,
            &[
                ("Service", "WPS"),
                ("Request", "Execute"),
                ("Identifier", model.identifier()),
                ("DataInputs", data_inputs.as_str()),
                ("RawDataOutput", "irradiation"),
            ],
        )
        .map_err(|source| ProviderError::Url {
            provider: "cams",
            source,
        })
    }
}

/// Parses the commented-header CSV dialect into file metadata and points.
///
/// Rows whose field count differs from the header's are skipped, not fatal:
/// a truncated trailing record must not abort the whole parse. A payload
/// with no header marker at all is a format error.
fn parse_cams_csv(
    text: &str,
) -> Result<(BTreeMap<String, String>, Vec<IrradiancePoint>), ProviderError> {
    let mut metadata = BTreeMap::new();
    let mut columns: Option<Vec<String>> = None;
    let mut data = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix('#') {
            let comment = comment.trim();
            if comment.starts_with(HEADER_MARKER) {
                columns = Some(comment.split(';').map(|c| c.trim().to_string()).collect());
            } else if columns.is_none() {
                if let Some((key, value)) = comment.split_once(':') {
                    metadata.insert(key.trim().to_string(), value.trim().to_string());
                }
            }
            continue;
        }

        let Some(columns) = columns.as_ref() else {
            // Data before any header marker means we cannot name the fields.
            return Err(ProviderError::CsvFormat {
                reason: "data record before the 'Observation period' header".to_string(),
            });
        };
        let fields: Vec<&str> = trimmed.split(';').map(str::trim).collect();
        if fields.len() != columns.len() {
            debug!(
                "skipping record with {} fields, header has {}",
                fields.len(),
                columns.len()
            );
            continue;
        }

        let mut point = IrradiancePoint::new(parse_observation_period(fields[0])?);
        for (column, field) in columns.iter().zip(fields.iter().copied()).skip(1) {
            let numeric = field.parse::<f64>().ok();
            match column.as_str() {
                COL_GHI => point.ghi = numeric,
                COL_DNI => point.dni = numeric,
                COL_DHI => point.dhi = numeric,
                _ => {
                    point.extras.insert(column.clone(), coerce_field(field));
                }
            }
        }
        data.push(point);
    }

    if columns.is_none() {
        return Err(ProviderError::CsvFormat {
            reason: "no 'Observation period' header marker found".to_string(),
        });
    }
    Ok((metadata, data))
}

/// Numeric-looking strings become numbers, empty cells null, anything else
/// passes through unchanged.
fn coerce_field(field: &str) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    match field.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        Some(number) => Value::Number(number),
        None => Value::String(field.to_string()),
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (next, NaiveDate::from_ymd_opt(year, month, 1)) {
        (Some(next), Some(first)) => next.signed_duration_since(first).num_days() as u32,
        _ => 30,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use chrono::TimeZone;

    const BASE: &str = "https://api.soda-solardata.com/service/wps";

    const SAMPLE: &str = "\
# Title: CAMS Radiation Service v4.6 all-sky irradiation
# latitude: 30.2700
# longitude: 120.1500
# Time reference: Universal time (UT)
# Observation period;TOA;Clear sky GHI;GHI;BHI;DHI;BNI;Reliability
2020-06-01T00:00:00.0/2020-06-01T01:00:00.0;0.0;0.0;0.0;0.0;0.0;0.0;1.0
2020-06-01T04:00:00.0/2020-06-01T05:00:00.0;820.1;640.2;601.5;420.9;180.6;700.3;1.0
";

    fn coord() -> Coordinate {
        Coordinate::new(30.27, 120.15).unwrap()
    }

    fn client(mock: &MockTransport) -> CamsClient<'_, MockTransport> {
        CamsClient::new(mock, BASE, "user@example.com", FetchOptions::default())
    }

    fn dates() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 6, 2).unwrap(),
        )
    }

    #[tokio::test]
    async fn parses_marker_header_and_named_columns() {
        let mock = MockTransport::new();
        mock.push_text(SAMPLE);
        let (start, end) = dates();
        let response = client(&mock)
            .series(coord(), start, end, CamsTimeStep::Hourly, CamsModel::AllSky, true)
            .await
            .unwrap();

        assert_eq!(response.data.len(), 2);
        let morning = &response.data[1];
        assert_eq!(
            morning.time,
            Utc.with_ymd_and_hms(2020, 6, 1, 4, 0, 0).unwrap()
        );
        assert_eq!(morning.ghi, Some(601.5));
        assert_eq!(morning.dni, Some(700.3));
        assert_eq!(morning.dhi, Some(180.6));
        assert_eq!(morning.extra_number("TOA"), Some(820.1));
        assert_eq!(
            response.metadata.provider.as_deref(),
            Some("CAMS Radiation Service v4.6 all-sky irradiation")
        );
    }

    #[tokio::test]
    async fn unit_follows_the_integrated_flag() {
        let (start, end) = dates();

        let mock = MockTransport::new();
        mock.push_text(SAMPLE);
        let integrated = client(&mock)
            .series(coord(), start, end, CamsTimeStep::Hourly, CamsModel::AllSky, true)
            .await
            .unwrap();
        assert_eq!(integrated.metadata.unit, IrradianceUnit::energy_whm2());
        assert_eq!(integrated.data[1].ghi, Some(601.5));

        let mock = MockTransport::new();
        mock.push_text(SAMPLE);
        let flux = client(&mock)
            .series(coord(), start, end, CamsTimeStep::Hourly, CamsModel::AllSky, false)
            .await
            .unwrap();
        assert_eq!(flux.metadata.unit, IrradianceUnit::flux_wm2());
        // Hourly step: Wh/m2 over one hour equals mean W/m2.
        assert_eq!(flux.data[1].ghi, Some(601.5));
    }

    #[tokio::test]
    async fn daily_step_divides_by_day_length() {
        let csv = "\
# Observation period;GHI
2020-06-01T00:00:00.0/2020-06-02T00:00:00.0;2400.0
";
        let mock = MockTransport::new();
        mock.push_text(csv);
        let (start, end) = dates();
        let flux = client(&mock)
            .series(coord(), start, end, CamsTimeStep::Daily, CamsModel::AllSky, false)
            .await
            .unwrap();
        assert_eq!(flux.data[0].ghi, Some(100.0));
    }

    #[test]
    fn malformed_trailing_row_is_skipped_not_fatal() {
        let csv = format!("{SAMPLE}2020-06-01T05:00:00.0/2020-06-01T06:00:00.0;only;three\n");
        let (_, data) = parse_cams_csv(&csv).unwrap();
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn missing_marker_is_a_format_error() {
        let csv = "# Title: something\n# latitude: 1.0\n";
        assert!(matches!(
            parse_cams_csv(csv),
            Err(ProviderError::CsvFormat { .. })
        ));
    }

    #[test]
    fn non_numeric_cells_pass_through_as_strings() {
        let csv = "\
# Observation period;GHI;Flag
2020-06-01T00:00:00.0/2020-06-01T01:00:00.0;12.5;interpolated
";
        let (_, data) = parse_cams_csv(csv).unwrap();
        assert_eq!(data[0].ghi, Some(12.5));
        assert_eq!(
            data[0].extras.get("Flag"),
            Some(&Value::String("interpolated".to_string()))
        );
    }

    #[tokio::test]
    async fn recorded_url_redacts_the_account_email() {
        let mock = MockTransport::new();
        mock.push_text(SAMPLE);
        let (start, end) = dates();
        let response = client(&mock)
            .series(coord(), start, end, CamsTimeStep::Hourly, CamsModel::AllSky, true)
            .await
            .unwrap();

        let recorded = response.metadata.request_url.unwrap();
        assert!(!recorded.contains("example.com"));
        assert!(recorded.contains("***"));
        // The wire request still carried the real account.
        assert!(mock.requests()[0].contains("user"));
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2020, 2), 29);
        assert_eq!(days_in_month(2021, 2), 28);
        assert_eq!(days_in_month(2021, 12), 31);
    }
}
