use crate::geocoding::GeocodeError;
use crate::providers::error::ProviderError;
use crate::types::coordinate::ValidationError;
use thiserror::Error;

/// Everything a [`crate::Heliodata`] operation can fail with.
///
/// The structure distinguishes "fix input" ([`ValidationError`]), "retry
/// later" (the transport variants inside the wrapped errors) and "fix
/// configuration" ([`ProviderError::Configuration`]) without string matching.
#[derive(Debug, Error)]
pub enum HeliodataError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),
}
