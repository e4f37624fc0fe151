pub mod background;
pub mod capture;
pub mod catalog;
pub mod color;
pub mod config;
pub mod error;
pub mod error_codes;
pub mod export;
#[cfg(feature = "remote")]
pub mod hosting;
pub mod images;
pub mod layout;
pub mod profile;
pub mod raster;
pub mod session;
pub mod share;
pub mod text;
pub mod theme;
