//! Free-text geocoding against a Nominatim-style provider.
//!
//! The provider is consumed as a black-box candidate-list service: its
//! ranking order is preserved verbatim and an empty candidate list is valid
//! output meaning "no match"; the caller decides how to react.

use crate::transport::{FetchOptions, Transport, TransportError};
use crate::types::coordinate::{ValidationError, MAX_GEOCODE_LIMIT, MIN_QUERY_LEN};
use crate::types::geocode::{GeocodeCandidate, GeocodeResult};
use log::info;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid geocoder URL: {0}")]
    Url(#[source] url::ParseError),

    #[error("geocoder payload is not a candidate list: {detail}")]
    Payload { detail: String },
}

/// One Nominatim result row; coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct NominatimRow {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    importance: Option<f64>,
}

pub struct GeocodingClient<'a, T> {
    transport: &'a T,
    base_url: &'a str,
    language: &'a str,
    contact: &'a str,
    options: FetchOptions,
}

impl<'a, T: Transport> GeocodingClient<'a, T> {
    pub fn new(
        transport: &'a T,
        base_url: &'a str,
        language: &'a str,
        contact: &'a str,
        options: FetchOptions,
    ) -> Self {
        Self {
            transport,
            base_url,
            language,
            contact,
            options,
        }
    }

    /// Resolves a free-text query to ranked coordinate candidates.
    ///
    /// Queries shorter than two characters after trimming are rejected before
    /// any network call; garbage input should not cost an upstream request.
    pub async fn geocode(
        &self,
        query: &str,
        limit: usize,
        country_codes: Option<&[String]>,
    ) -> Result<GeocodeResult, GeocodeError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Err(ValidationError::QueryTooShort.into());
        }
        if limit > MAX_GEOCODE_LIMIT {
            return Err(ValidationError::LimitTooLarge(limit).into());
        }

        let mut params = vec![
            ("q", query.to_string()),
            ("format", "jsonv2".to_string()),
            ("limit", limit.to_string()),
            ("accept-language", self.language.to_string()),
        ];
        if let Some(codes) = country_codes.filter(|codes| !codes.is_empty()) {
            params.push(("countrycodes", codes.join(",").to_lowercase()));
        }
        let url = Url::parse_with_params(&format!("{}/search", self.base_url), &params)
            .map_err(GeocodeError::Url)?;

        let mut options = self.options.clone();
        options
            .headers
            .push(("User-Agent".to_string(), self.contact.to_string()));

        info!("geocoding '{query}' (limit {limit})");
        let payload = self.transport.fetch_json(url.as_str(), &options).await?;
        let rows: Vec<NominatimRow> =
            serde_json::from_value(payload).map_err(|e| GeocodeError::Payload {
                detail: e.to_string(),
            })?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let lat = row.lat.parse::<f64>().map_err(|_| GeocodeError::Payload {
                detail: format!("non-numeric latitude '{}'", row.lat),
            })?;
            let lon = row.lon.parse::<f64>().map_err(|_| GeocodeError::Payload {
                detail: format!("non-numeric longitude '{}'", row.lon),
            })?;
            candidates.push(GeocodeCandidate {
                lat,
                lon,
                display_name: row.display_name,
                provider: "nominatim".to_string(),
                confidence: row.importance,
            });
        }

        Ok(GeocodeResult {
            request_url: url.into(),
            candidates,
            country_codes: country_codes.map(<[String]>::to_vec),
        })
    }
}
