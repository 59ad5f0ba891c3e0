//! CSV export of a canonical response, and its inverse.
//!
//! The export encodes a fixed data contract: one leading `#` comment row
//! carrying the serialized metadata object, then a header row
//! `time_cn,time_utc,ghi,dni,dhi,<extras…>` where `time_cn` is the +08:00
//! rendering of the UTC instant. Values containing a comma, quote or newline
//! are quoted with internal quotes doubled. [`read_csv`] reverses the
//! encoding so export → import → aggregate reproduces direct aggregation.

use crate::aggregate::DisplayZone;
use crate::types::response::{IrradianceMetadata, IrradiancePoint, IrradianceResponse};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

const FIXED_COLUMNS: [&str; 5] = ["time_cn", "time_utc", "ghi", "dni", "dhi"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("payload has no leading '#' metadata row")]
    MissingMetadata,

    #[error("cannot decode the metadata row")]
    Metadata(#[source] serde_json::Error),

    #[error("payload has no header row")]
    MissingHeader,

    #[error("header does not begin with time_cn,time_utc,ghi,dni,dhi")]
    HeaderShape,

    #[error("cannot parse timestamp '{0}'")]
    Time(String),
}

/// Serializes a response to the CSV contract. Extras columns are the union
/// of all points' extras keys, in sorted order.
pub fn write_csv(response: &IrradianceResponse) -> String {
    let extra_columns: BTreeSet<&str> = response
        .data
        .iter()
        .flat_map(|p| p.extras.keys().map(String::as_str))
        .collect();

    let mut out = String::new();
    out.push_str("# ");
    // Metadata is plain data; serialization cannot fail.
    out.push_str(&serde_json::to_string(&response.metadata).unwrap_or_default());
    out.push('\n');

    let header: Vec<&str> = FIXED_COLUMNS
        .iter()
        .copied()
        .chain(extra_columns.iter().copied())
        .collect();
    push_record(&mut out, header.iter().map(|c| c.to_string()));

    let cn_offset = DisplayZone::UtcPlus8.offset();
    for point in &response.data {
        let mut fields = vec![
            point
                .time
                .with_timezone(&cn_offset)
                .to_rfc3339_opts(SecondsFormat::Secs, false),
            point.time.to_rfc3339_opts(SecondsFormat::Secs, true),
            number_cell(point.ghi),
            number_cell(point.dni),
            number_cell(point.dhi),
        ];
        for column in &extra_columns {
            fields.push(match point.extras.get(*column) {
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            });
        }
        push_record(&mut out, fields.into_iter());
    }
    out
}

/// Parses a file produced by [`write_csv`] back into a canonical response.
///
/// The UTC column is authoritative for timestamps; `time_cn` is display-only
/// and ignored. Empty cells import as absent.
pub fn read_csv(text: &str) -> Result<IrradianceResponse, ExportError> {
    let (first_line, rest) = text.split_once('\n').ok_or(ExportError::MissingMetadata)?;
    let metadata_json = first_line
        .trim()
        .strip_prefix('#')
        .ok_or(ExportError::MissingMetadata)?
        .trim();
    let metadata: IrradianceMetadata =
        serde_json::from_str(metadata_json).map_err(ExportError::Metadata)?;

    let mut records = parse_records(rest).into_iter();
    let header = records.next().ok_or(ExportError::MissingHeader)?;
    if header.len() < FIXED_COLUMNS.len()
        || header[..FIXED_COLUMNS.len()] != FIXED_COLUMNS.map(String::from)
    {
        return Err(ExportError::HeaderShape);
    }
    let extra_columns = &header[FIXED_COLUMNS.len()..];

    let mut data = Vec::new();
    for record in records {
        if record.len() != header.len() {
            debug!(
                "skipping record with {} fields, header has {}",
                record.len(),
                header.len()
            );
            continue;
        }
        let time: DateTime<Utc> = record[1]
            .parse()
            .map_err(|_| ExportError::Time(record[1].clone()))?;
        let mut point = IrradiancePoint::new(time);
        point.ghi = record[2].parse().ok();
        point.dni = record[3].parse().ok();
        point.dhi = record[4].parse().ok();
        for (column, cell) in extra_columns.iter().zip(&record[FIXED_COLUMNS.len()..]) {
            if cell.is_empty() {
                continue;
            }
            let value = match cell.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                Some(number) => Value::Number(number),
                None => Value::String(cell.clone()),
            };
            point.extras.insert(column.clone(), value);
        }
        data.push(point);
    }

    Ok(IrradianceResponse { metadata, data })
}

fn number_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn push_record(out: &mut String, fields: impl Iterator<Item = String>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(&escape(&field));
    }
    out.push('\n');
}

/// Quotes a field when it contains a comma, quote or newline; internal
/// quotes are doubled.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Quote-aware record reader: quoted fields may contain commas, doubled
/// quotes and embedded newlines.
fn parse_records(input: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if record.len() > 1 || !record[0].is_empty() {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{monthly_index, DisplayZone};
    use crate::types::response::{IrradianceUnit, QueryType, Source};
    use chrono::TimeZone;

    fn sample() -> IrradianceResponse {
        let mut p1 = IrradiancePoint::new(Utc.with_ymd_and_hms(2020, 1, 31, 20, 0, 0).unwrap());
        p1.ghi = Some(350.5);
        p1.dni = Some(600.0);
        p1.extras
            .insert("T2m".to_string(), serde_json::json!(21.5));
        p1.extras.insert(
            "note".to_string(),
            serde_json::json!("cloudy, then \"clear\""),
        );

        let mut p2 = IrradiancePoint::new(Utc.with_ymd_and_hms(2020, 6, 1, 4, 0, 0).unwrap());
        p2.ghi = Some(820.25);

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
                cached: Some(false),
                request_url: Some("https://example.invalid/q".to_string()),
            },
            data: vec![p1, p2],
        }
    }

    #[test]
    fn layout_matches_the_contract() {
        let csv = write_csv(&sample());
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("# {"));
        assert_eq!(lines.next().unwrap(), "time_cn,time_utc,ghi,dni,dhi,T2m,note");
        let first = lines.next().unwrap();
        assert!(first.starts_with("2020-02-01T04:00:00+08:00,2020-01-31T20:00:00Z,350.5,600,"));
    }

    #[test]
    fn fields_with_commas_and_quotes_are_escaped() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");

        let csv = write_csv(&sample());
        assert!(csv.contains("\"cloudy, then \"\"clear\"\"\""));
    }

    #[test]
    fn import_reverses_export() {
        let original = sample();
        let imported = read_csv(&write_csv(&original)).unwrap();

        assert_eq!(imported.metadata, original.metadata);
        assert_eq!(imported.data.len(), 2);
        assert_eq!(imported.data[0].time, original.data[0].time);
        assert_eq!(imported.data[0].ghi, Some(350.5));
        assert_eq!(imported.data[0].dhi, None);
        assert_eq!(
            imported.data[0].extras.get("note"),
            Some(&serde_json::json!("cloudy, then \"clear\""))
        );
    }

    #[test]
    fn round_trip_preserves_the_monthly_index() {
        let original = sample();
        let direct = monthly_index(&original, DisplayZone::UtcPlus8);
        let re_imported = read_csv(&write_csv(&original)).unwrap();
        let indirect = monthly_index(&re_imported, DisplayZone::UtcPlus8);
        assert_eq!(direct, indirect);
    }

    #[test]
    fn missing_metadata_or_header_is_rejected() {
        assert!(matches!(
            read_csv("time_cn,time_utc\n"),
            Err(ExportError::MissingMetadata)
        ));
        assert!(matches!(
            read_csv("# {\"not\": \"metadata\"}\n"),
            Err(ExportError::Metadata(_))
        ));
    }
}
