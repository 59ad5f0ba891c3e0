pub mod coordinate;
pub mod geocode;
pub mod optimal;
pub mod response;
