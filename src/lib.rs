//! Multi-source solar-irradiance acquisition for Rust.
//!
//! `heliodata` fetches hourly irradiance series from PVGIS and the CAMS
//! radiation service, geocodes free-text locations, and normalizes every
//! provider payload into one canonical shape: UTC timestamps, `ghi`/`dni`/
//! `dhi` in explicit units, and all remaining provider columns preserved
//! under `extras`. On top of the canonical series it offers timezone-aware
//! monthly and single-day aggregation and a round-trippable CSV export.
//!
//! ```no_run
//! use heliodata::{day_curve, monthly_index, DisplayZone, Heliodata, HeliodataError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), HeliodataError> {
//!     let client = Heliodata::new();
//!
//!     // Resolve a place name, then fetch its typical year.
//!     let place = client.geocode().query("West Lake, Hangzhou").call().await?;
//!     let best = &place.candidates[0];
//!     let tmy = client.tmy().lat(best.lat).lon(best.lon).call().await?;
//!
//!     let index = monthly_index(&tmy, DisplayZone::UtcPlus8);
//!     println!("June index: {:.1} kWh/m2", index.months[5]);
//!     Ok(())
//! }
//! ```

mod aggregate;
mod cache;
mod config;
mod error;
mod export;
mod geocoding;
mod heliodata;
mod providers;
mod time;
mod transport;
mod types;

pub use aggregate::{
    day_curve, monthly_index, CurvePoint, DayCurve, DisplayZone, MonthlyIndex, ValueBasis,
};
pub use cache::FingerprintCache;
pub use config::HeliodataConfig;
pub use error::HeliodataError;
pub use export::{read_csv, write_csv, ExportError};
pub use geocoding::GeocodeError;
pub use heliodata::{Heliodata, SeriesRequest};
pub use providers::cams::{CamsModel, CamsTimeStep};
pub use providers::error::ProviderError;
pub use time::TimeFormatError;
pub use transport::{FetchOptions, HttpTransport, Transport, TransportError};
pub use types::coordinate::{Coordinate, ValidationError};
pub use types::geocode::{GeocodeCandidate, GeocodeResult};
pub use types::optimal::OptimalSummary;
pub use types::response::{
    IrradianceMetadata, IrradiancePoint, IrradianceResponse, IrradianceUnit, QueryType, Source,
};
