pub mod cams;
pub mod error;
pub mod pvgis;
