use crate::time::TimeFormatError;
use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Time(#[from] TimeFormatError),

    #[error("invalid {provider} URL: {source}")]
    Url {
        provider: &'static str,
        #[source]
        source: url::ParseError,
    },

    /// The provider returned a payload whose shape this pipeline cannot use.
    /// Not retried; a shape mismatch will not fix itself.
    #[error("{provider} payload is missing expected section '{section}'")]
    PayloadShape {
        provider: &'static str,
        section: String,
    },

    /// The CSV payload never announced its column header.
    #[error("CSV payload is malformed: {reason}")]
    CsvFormat { reason: String },

    /// The upstream rejected the requested years and its message named the
    /// coordinate's valid window. `min <= max` always holds.
    #[error("requested years outside provider coverage [{min}, {max}]: {message}")]
    YearRange {
        min: i32,
        max: i32,
        message: String,
    },

    /// A required account credential is absent. Fails fast; never silently
    /// falls back to another provider.
    #[error("missing credential for {provider}: {detail}")]
    Configuration {
        provider: &'static str,
        detail: String,
    },
}
