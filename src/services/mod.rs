//! Service layer separating image I/O from the segmentation pipeline

pub mod io;

pub use io::{ImageIOService, InputLimits};
