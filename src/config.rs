//! Process-wide configuration for the client.
//!
//! Everything external lives here: provider base URLs, the geocoder's
//! request language and identifying contact string, and the CAMS account
//! email. The email is server-side configuration only; it is never accepted
//! from an untrusted caller, and it is read-only after construction.

use bon::Builder;
use std::time::Duration;

/// Knobs for a [`crate::Heliodata`] client.
///
/// # Examples
///
/// ```
/// use heliodata::HeliodataConfig;
///
/// let config = HeliodataConfig::builder()
///     .cams_email("ops@example.com".to_string())
///     .build();
/// assert_eq!(config.retries, 1);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct HeliodataConfig {
    /// PVGIS API root.
    #[builder(default = "https://re.jrc.ec.europa.eu/api/v5_2".to_string())]
    pub pvgis_base_url: String,

    /// CAMS/SoDa WPS endpoint.
    #[builder(default = "https://api.soda-solardata.com/service/wps".to_string())]
    pub cams_base_url: String,

    /// Nominatim-style geocoder root.
    #[builder(default = "https://nominatim.openstreetmap.org".to_string())]
    pub geocoder_base_url: String,

    /// `accept-language` value sent to the geocoder.
    #[builder(default = "en".to_string())]
    pub geocoder_language: String,

    /// Identifying contact string sent as the geocoder User-Agent; public
    /// Nominatim instances require one.
    #[builder(default = "heliodata/0.1 (https://github.com/ruurdbijlsma/heliodata)".to_string())]
    pub geocoder_contact: String,

    /// CAMS account email; required for any CAMS fetch.
    pub cams_email: Option<String>,

    /// Fingerprint-cache entry lifetime.
    #[builder(default = Duration::from_secs(3600))]
    pub cache_ttl: Duration,

    /// Per-attempt transport timeout.
    #[builder(default = Duration::from_secs(30))]
    pub timeout: Duration,

    /// Additional transport attempts after the first failure.
    #[builder(default = 1)]
    pub retries: u32,
}

impl Default for HeliodataConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
