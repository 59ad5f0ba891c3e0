//! Timezone-aware derived views over a canonical series.
//!
//! Both views take an explicit display zone, UTC or a fixed +08:00 offset,
//! and never consult the ambient host timezone. Bucketing uses explicit
//! offset arithmetic on the always-UTC canonical instants.

use crate::types::response::{IrradiancePoint, IrradianceResponse};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use std::fmt;

/// Plane-of-array component extras consulted when `ghi` is absent.
const POA_KEYS: [&str; 3] = ["Gb(i)", "Gd(i)", "Gr(i)"];

/// Last-resort global plane-of-array column.
const GLOBAL_POA_KEY: &str = "G(i)";

/// The display timezone for aggregation, chosen by the caller per
/// computation and never mixed within one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayZone {
    Utc,
    /// Fixed +08:00, the export target's wall clock.
    UtcPlus8,
}

impl DisplayZone {
    fn offset_seconds(&self) -> i32 {
        match self {
            DisplayZone::Utc => 0,
            DisplayZone::UtcPlus8 => 8 * 3600,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        // Both constants are within the valid UTC offset range.
        FixedOffset::east_opt(self.offset_seconds()).unwrap()
    }
}

/// Which field family an aggregate was computed from, so a caller can label
/// the result ("computed from GHI" vs "computed from components").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueBasis {
    /// Canonical `ghi`.
    Ghi,
    /// Sum of the plane-of-array component extras.
    PoaComponents,
    /// The global plane-of-array extra column.
    GlobalPoa,
}

impl fmt::Display for ValueBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueBasis::Ghi => write!(f, "ghi"),
            ValueBasis::PoaComponents => write!(f, "components"),
            ValueBasis::GlobalPoa => write!(f, "G(i)"),
        }
    }
}

/// Twelve wall-clock-month sums divided by 1000: a rough kWh/m² index.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyIndex {
    /// January..December in the chosen display zone.
    pub months: [f64; 12],
    /// `None` when no point carried any usable field.
    pub basis: Option<ValueBasis>,
}

/// One sample of a single-day curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    /// Minutes since local midnight in the chosen display zone.
    pub minutes: u32,
    pub value: f64,
}

/// A single day's values, ascending by minute. Empty when no point falls in
/// the day; that is valid output, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct DayCurve {
    pub points: Vec<CurvePoint>,
    pub basis: Option<ValueBasis>,
}

/// Picks the field family once for the whole series: `ghi` when any point
/// has it, else the component triple, else the global plane-of-array column.
/// A per-point choice would make the reported basis meaningless.
fn select_basis(data: &[IrradiancePoint]) -> Option<ValueBasis> {
    if data.iter().any(|p| p.ghi.is_some()) {
        return Some(ValueBasis::Ghi);
    }
    if data
        .iter()
        .any(|p| POA_KEYS.iter().any(|k| p.extra_number(k).is_some()))
    {
        return Some(ValueBasis::PoaComponents);
    }
    if data.iter().any(|p| p.extra_number(GLOBAL_POA_KEY).is_some()) {
        return Some(ValueBasis::GlobalPoa);
    }
    None
}

fn point_value(point: &IrradiancePoint, basis: ValueBasis) -> Option<f64> {
    match basis {
        ValueBasis::Ghi => point.ghi,
        ValueBasis::PoaComponents => {
            let present: Vec<f64> = POA_KEYS.iter().filter_map(|k| point.extra_number(k)).collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum())
            }
        }
        ValueBasis::GlobalPoa => point.extra_number(GLOBAL_POA_KEY),
    }
}

/// Sums the series per calendar month of the chosen zone's wall clock and
/// divides by 1000, yielding a rough kWh/m² monthly index.
pub fn monthly_index(response: &IrradianceResponse, zone: DisplayZone) -> MonthlyIndex {
    let basis = select_basis(&response.data);
    let mut months = [0.0f64; 12];
    if let Some(basis) = basis {
        let offset = zone.offset();
        for point in &response.data {
            if let Some(value) = point_value(point, basis) {
                let local = point.time.with_timezone(&offset);
                months[local.month0() as usize] += value;
            }
        }
        for month in &mut months {
            *month /= 1000.0;
        }
    }
    MonthlyIndex { months, basis }
}

/// Extracts the points of one calendar day (in the chosen zone) and projects
/// each onto minutes since that day's local midnight.
pub fn day_curve(response: &IrradianceResponse, day: NaiveDate, zone: DisplayZone) -> DayCurve {
    let basis = select_basis(&response.data);
    let Some(basis) = basis else {
        return DayCurve {
            points: Vec::new(),
            basis: None,
        };
    };

    // Local midnight expressed as a UTC instant, via explicit offset math.
    let start_utc: DateTime<Utc> = day.and_time(NaiveTime::MIN).and_utc()
        - Duration::seconds(i64::from(zone.offset_seconds()));
    let end_utc = start_utc + Duration::days(1);

    let points = response
        .data
        .iter()
        .filter(|p| p.time >= start_utc && p.time < end_utc)
        .filter_map(|p| {
            let value = point_value(p, basis)?;
            let minutes = (p.time - start_utc).num_minutes() as u32;
            Some(CurvePoint { minutes, value })
        })
        .collect();

    DayCurve {
        points,
        basis: Some(basis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::response::{
        IrradianceMetadata, IrradianceUnit, QueryType, Source,
    };
    use chrono::TimeZone;

    fn response(data: Vec<IrradiancePoint>) -> IrradianceResponse {
        IrradianceResponse {
            metadata: IrradianceMetadata {
                source: Source::Pvgis,
                query_type: QueryType::Series,
                lat: 30.27,
                lon: 120.15,
                time_ref: "UTC".to_string(),
                unit: IrradianceUnit::flux_wm2(),
                provider: None,
                raw_inputs: None,
                cached: None,
                request_url: None,
            },
            data,
        }
    }

    fn ghi_point(time: DateTime<Utc>, ghi: f64) -> IrradiancePoint {
        IrradiancePoint {
            ghi: Some(ghi),
            ..IrradiancePoint::new(time)
        }
    }

    #[test]
    fn monthly_buckets_follow_the_display_zone() {
        // 20:00 UTC on Jan 31 is already Feb 1 in +08:00.
        let r = response(vec![ghi_point(
            Utc.with_ymd_and_hms(2020, 1, 31, 20, 0, 0).unwrap(),
            1000.0,
        )]);

        let utc = monthly_index(&r, DisplayZone::Utc);
        assert_eq!(utc.months[0], 1.0);
        assert_eq!(utc.months[1], 0.0);

        let cn = monthly_index(&r, DisplayZone::UtcPlus8);
        assert_eq!(cn.months[0], 0.0);
        assert_eq!(cn.months[1], 1.0);
        assert_eq!(cn.basis, Some(ValueBasis::Ghi));
    }

    #[test]
    fn falls_back_to_components_then_global_poa() {
        let t = Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap();

        let mut with_components = IrradiancePoint::new(t);
        with_components
            .extras
            .insert("Gb(i)".to_string(), serde_json::json!(300.0));
        with_components
            .extras
            .insert("Gd(i)".to_string(), serde_json::json!(200.0));
        let r = response(vec![with_components]);
        let index = monthly_index(&r, DisplayZone::Utc);
        assert_eq!(index.basis, Some(ValueBasis::PoaComponents));
        assert_eq!(index.months[5], 0.5);

        let mut with_global = IrradiancePoint::new(t);
        with_global
            .extras
            .insert("G(i)".to_string(), serde_json::json!(250.0));
        let r = response(vec![with_global]);
        let index = monthly_index(&r, DisplayZone::Utc);
        assert_eq!(index.basis, Some(ValueBasis::GlobalPoa));
        assert_eq!(index.months[5], 0.25);

        let r = response(vec![IrradiancePoint::new(t)]);
        let index = monthly_index(&r, DisplayZone::Utc);
        assert_eq!(index.basis, None);
        assert!(index.months.iter().all(|m| *m == 0.0));
    }

    #[test]
    fn day_curve_projects_to_local_minutes() {
        let r = response(vec![
            ghi_point(Utc.with_ymd_and_hms(2020, 6, 1, 0, 30, 0).unwrap(), 120.0),
            ghi_point(Utc.with_ymd_and_hms(2020, 6, 1, 4, 0, 0).unwrap(), 480.0),
            // 16:30 UTC is already June 2 in +08:00: outside the day.
            ghi_point(Utc.with_ymd_and_hms(2020, 6, 1, 16, 30, 0).unwrap(), 50.0),
        ]);

        let day = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
        let curve = day_curve(&r, day, DisplayZone::UtcPlus8);
        assert_eq!(curve.basis, Some(ValueBasis::Ghi));
        assert_eq!(
            curve.points,
            vec![
                CurvePoint { minutes: 510, value: 120.0 },
                CurvePoint { minutes: 720, value: 480.0 },
            ]
        );
        // Minutes ascend because the canonical series ascends.
        assert!(curve.points.windows(2).all(|w| w[0].minutes < w[1].minutes));
    }

    #[test]
    fn day_with_no_points_yields_empty_curve() {
        let r = response(vec![ghi_point(
            Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap(),
            100.0,
        )]);
        let far_away = NaiveDate::from_ymd_opt(1999, 1, 1).unwrap();
        let curve = day_curve(&r, far_away, DisplayZone::Utc);
        assert!(curve.points.is_empty());
        assert_eq!(curve.basis, Some(ValueBasis::Ghi));
    }
}
