//! The main entry point for fetching normalized solar-irradiance data.
//!
//! A [`Heliodata`] client resolves free-text locations through a geocoder,
//! fetches series from either upstream provider, and serves repeated queries
//! out of an in-memory fingerprint cache. Whatever the provider, the result
//! is the same canonical [`IrradianceResponse`].

use crate::cache::FingerprintCache;
use crate::config::HeliodataConfig;
use crate::error::HeliodataError;
use crate::geocoding::GeocodingClient;
use crate::providers::cams::{CamsClient, CamsModel, CamsTimeStep};
use crate::providers::error::ProviderError;
use crate::providers::pvgis::PvgisClient;
use crate::transport::{FetchOptions, HttpTransport, Transport};
use crate::types::coordinate::{validate_date_range, validate_year_range, Coordinate};
use crate::types::geocode::GeocodeResult;
use crate::types::optimal::OptimalSummary;
use crate::types::response::IrradianceResponse;
use bon::bon;

/// Year used for [`Heliodata::optimal`] when the caller does not pick one.
const DEFAULT_OPTIMAL_YEAR: i32 = 2020;

/// Candidate count used for [`Heliodata::geocode`] when the caller does not
/// pick one.
const DEFAULT_GEOCODE_LIMIT: usize = 5;

/// A series request discriminated by its `source` tag.
///
/// The two providers take incompatible parameters, so the call boundary
/// dispatches over a closed set of variants rather than a shared base shape.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesRequest {
    Pvgis {
        lat: f64,
        lon: f64,
        start_year: i32,
        end_year: i32,
    },
    Cams {
        lat: f64,
        lon: f64,
        /// `YYYY-MM-DD`, inclusive.
        start: String,
        /// `YYYY-MM-DD`, inclusive.
        end: String,
        time_step: Option<CamsTimeStep>,
        model: Option<CamsModel>,
        integrated: Option<bool>,
    },
}

/// The client. Holds the transport, the configuration and the fingerprint
/// caches; cheap to share behind a reference.
///
/// # Examples
///
/// ```no_run
/// # use heliodata::{Heliodata, HeliodataError};
/// # #[tokio::main]
/// # async fn main() -> Result<(), HeliodataError> {
/// let client = Heliodata::new();
/// let tmy = client.tmy().lat(30.27).lon(120.15).call().await?;
/// assert_eq!(tmy.data.len(), 8760);
/// # Ok(())
/// # }
/// ```
pub struct Heliodata<T: Transport = HttpTransport> {
    transport: T,
    config: HeliodataConfig,
    series_cache: FingerprintCache<IrradianceResponse>,
    geocode_cache: FingerprintCache<GeocodeResult>,
}

impl Heliodata<HttpTransport> {
    /// Creates a client with default configuration and a real HTTP transport.
    pub fn new() -> Self {
        Self::with_config(HeliodataConfig::default())
    }

    /// Creates a client with the given configuration and a real HTTP
    /// transport.
    pub fn with_config(config: HeliodataConfig) -> Self {
        Self::with_transport(HttpTransport::new(), config)
    }
}

impl Default for Heliodata<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

#[bon]
impl<T: Transport> Heliodata<T> {
    /// Creates a client over any [`Transport`], real or canned.
    pub fn with_transport(transport: T, config: HeliodataConfig) -> Self {
        Self {
            transport,
            config,
            series_cache: FingerprintCache::new(),
            geocode_cache: FingerprintCache::new(),
        }
    }

    /// Resolves a free-text address to ranked coordinate candidates.
    ///
    /// The query must be at least two characters after trimming; an empty
    /// candidate list is valid output meaning "no match". Results are served
    /// from the fingerprint cache within its TTL.
    ///
    /// # Arguments
    ///
    /// * `.query(&str)`: **Required.** The free-text address.
    /// * `.limit(usize)`: Optional, at most 10. Defaults to 5.
    /// * `.country_codes(Vec<String>)`: Optional 2-letter country filter.
    ///
    /// # Errors
    ///
    /// [`HeliodataError::Geocode`]: a too-short query or oversized limit
    /// arrives as [`GeocodeError::Validation`](crate::GeocodeError::Validation)
    /// (rejected before any network call); transport and payload failures
    /// carry their own variants.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use heliodata::{Heliodata, HeliodataError};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), HeliodataError> {
    /// let client = Heliodata::new();
    /// let result = client
    ///     .geocode()
    ///     .query("West Lake, Hangzhou")
    ///     .limit(3)
    ///     .call()
    ///     .await?;
    /// if let Some(best) = result.candidates.first() {
    ///     println!("{} -> ({}, {})", best.display_name, best.lat, best.lon);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn geocode(
        &self,
        query: &str,
        limit: Option<usize>,
        country_codes: Option<Vec<String>>,
    ) -> Result<GeocodeResult, HeliodataError> {
        let limit = limit.unwrap_or(DEFAULT_GEOCODE_LIMIT);
        let key = format!(
            "geocode:q={}:limit={limit}:cc={}",
            query.trim(),
            country_codes.as_deref().unwrap_or(&[]).join(",")
        );
        if let Some(hit) = self.geocode_cache.get(&key).await {
            return Ok(hit);
        }

        let geocoder = GeocodingClient::new(
            &self.transport,
            &self.config.geocoder_base_url,
            &self.config.geocoder_language,
            &self.config.geocoder_contact,
            self.fetch_options(),
        );
        let result = geocoder
            .geocode(query, limit, country_codes.as_deref())
            .await?;
        self.geocode_cache
            .set(&key, result.clone(), self.config.cache_ttl)
            .await;
        Ok(result)
    }

    /// Fetches the PVGIS typical-meteorological-year hourly table.
    ///
    /// Always PVGIS; there is no source switch for TMY data. The 8760 points
    /// carry instantaneous flux (W/m²) with `ghi`/`dni`/`dhi` read straight
    /// from the provider's horizontal columns.
    ///
    /// # Arguments
    ///
    /// * `.lat(f64)` / `.lon(f64)`: **Required.** WGS-84 coordinate.
    ///
    /// # Errors
    ///
    /// [`HeliodataError::Validation`] for out-of-range coordinates (before
    /// any network call); [`HeliodataError::Provider`] for upstream or parse
    /// failures.
    #[builder]
    pub async fn tmy(&self, lat: f64, lon: f64) -> Result<IrradianceResponse, HeliodataError> {
        let coord = Coordinate::new(lat, lon)?;
        let key = format!("pvgis:tmy:lat={}:lon={}", coord.lat, coord.lon);
        if let Some(hit) = self.cached_series(&key).await {
            return Ok(hit);
        }

        let response = self.pvgis().tmy(coord).await?;
        self.series_cache
            .set(&key, response.clone(), self.config.cache_ttl)
            .await;
        Ok(response)
    }

    /// Fetches the PVGIS multi-year hourly series with plane-of-array
    /// components.
    ///
    /// Canonical `ghi` is the component sum (see
    /// [`PvgisClient::series`](crate::providers::pvgis::PvgisClient::series)
    /// for the zero-tilt approximation this carries); `dni`/`dhi` are null in
    /// this mode.
    ///
    /// # Arguments
    ///
    /// * `.lat(f64)` / `.lon(f64)`: **Required.**
    /// * `.start_year(i32)` / `.end_year(i32)`: **Required.** Within
    ///   `[1990, 2100]`, `end_year >= start_year`.
    ///
    /// # Errors
    ///
    /// [`HeliodataError::Validation`] for bad inputs;
    /// [`ProviderError::YearRange`] (wrapped) when the upstream names a valid
    /// year window for this coordinate, carrying structured `min`/`max` so
    /// the caller can retry with corrected bounds.
    #[builder]
    pub async fn pvgis_series(
        &self,
        lat: f64,
        lon: f64,
        start_year: i32,
        end_year: i32,
    ) -> Result<IrradianceResponse, HeliodataError> {
        let coord = Coordinate::new(lat, lon)?;
        validate_year_range(start_year, end_year)?;
        let key = format!(
            "pvgis:series:lat={}:lon={}:start={start_year}:end={end_year}",
            coord.lat, coord.lon
        );
        if let Some(hit) = self.cached_series(&key).await {
            return Ok(hit);
        }

        let response = self.pvgis().series(coord, start_year, end_year).await?;
        self.series_cache
            .set(&key, response.clone(), self.config.cache_ttl)
            .await;
        Ok(response)
    }

    /// Fetches a CAMS radiation series for a closed date range.
    ///
    /// Requires `cams_email` in the configuration; the credential is never
    /// accepted from an untrusted caller and is redacted from the recorded
    /// request URL.
    ///
    /// # Arguments
    ///
    /// * `.lat(f64)` / `.lon(f64)`: **Required.**
    /// * `.start(&str)` / `.end(&str)`: **Required.** `YYYY-MM-DD`,
    ///   `end >= start`.
    /// * `.time_step(CamsTimeStep)`: Optional. Defaults to hourly.
    /// * `.model(CamsModel)`: Optional. All-sky (default) or clear-sky.
    /// * `.integrated(bool)`: Optional. `true` keeps the provider's Wh/m²
    ///   energy integrals; `false` (default) reports mean W/m² flux.
    ///
    /// # Errors
    ///
    /// [`HeliodataError::Validation`] for bad inputs;
    /// [`ProviderError::Configuration`] (wrapped) when the account email is
    /// missing; this fails fast and never falls back to another provider.
    /// [`ProviderError::CsvFormat`] when the payload has no header marker.
    #[builder]
    pub async fn cams_series(
        &self,
        lat: f64,
        lon: f64,
        start: &str,
        end: &str,
        time_step: Option<CamsTimeStep>,
        model: Option<CamsModel>,
        integrated: Option<bool>,
    ) -> Result<IrradianceResponse, HeliodataError> {
        let coord = Coordinate::new(lat, lon)?;
        let (start, end) = validate_date_range(start, end)?;
        let time_step = time_step.unwrap_or(CamsTimeStep::Hourly);
        let model = model.unwrap_or(CamsModel::AllSky);
        let integrated = integrated.unwrap_or(false);

        let email = self.config.cams_email.as_deref().ok_or_else(|| {
            ProviderError::Configuration {
                provider: "cams",
                detail: "account email is required; set HeliodataConfig::cams_email".to_string(),
            }
        })?;

        let key = format!(
            "cams:series:lat={}:lon={}:start={start}:end={end}:step={time_step}:model={model}:integrated={integrated}",
            coord.lat, coord.lon
        );
        if let Some(hit) = self.cached_series(&key).await {
            return Ok(hit);
        }

        let cams = CamsClient::new(
            &self.transport,
            &self.config.cams_base_url,
            email,
            self.fetch_options(),
        );
        let response = cams
            .series(coord, start, end, time_step, model, integrated)
            .await?;
        self.series_cache
            .set(&key, response.clone(), self.config.cache_ttl)
            .await;
        Ok(response)
    }

    /// Fetches the PVGIS optimal-orientation summary for one year.
    ///
    /// Recomputed per (coordinate, year) on demand; not cached.
    ///
    /// # Arguments
    ///
    /// * `.lat(f64)` / `.lon(f64)`: **Required.**
    /// * `.year(i32)`: Optional. Defaults to 2020.
    #[builder]
    pub async fn optimal(
        &self,
        lat: f64,
        lon: f64,
        year: Option<i32>,
    ) -> Result<OptimalSummary, HeliodataError> {
        let coord = Coordinate::new(lat, lon)?;
        let year = year.unwrap_or(DEFAULT_OPTIMAL_YEAR);
        validate_year_range(year, year)?;
        Ok(self.pvgis().optimal(coord, year).await?)
    }

    /// Fetches a series from whichever provider the request's `source` tag
    /// names, the discriminated-union boundary of the wire contract.
    pub async fn series(
        &self,
        request: SeriesRequest,
    ) -> Result<IrradianceResponse, HeliodataError> {
        match request {
            SeriesRequest::Pvgis {
                lat,
                lon,
                start_year,
                end_year,
            } => {
                self.pvgis_series()
                    .lat(lat)
                    .lon(lon)
                    .start_year(start_year)
                    .end_year(end_year)
                    .call()
                    .await
            }
            SeriesRequest::Cams {
                lat,
                lon,
                start,
                end,
                time_step,
                model,
                integrated,
            } => {
                self.cams_series()
                    .lat(lat)
                    .lon(lon)
                    .start(&start)
                    .end(&end)
                    .maybe_time_step(time_step)
                    .maybe_model(model)
                    .maybe_integrated(integrated)
                    .call()
                    .await
            }
        }
    }

    fn pvgis(&self) -> PvgisClient<'_, T> {
        PvgisClient::new(
            &self.transport,
            &self.config.pvgis_base_url,
            self.fetch_options(),
        )
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: self.config.timeout,
            retries: self.config.retries,
            headers: Vec::new(),
        }
    }

    async fn cached_series(&self, key: &str) -> Option<IrradianceResponse> {
        let mut hit = self.series_cache.get(key).await?;
        hit.metadata.cached = Some(true);
        Some(hit)
    }
}
