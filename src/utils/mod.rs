//! Shared utilities

pub mod ids;
pub mod preprocessing;
pub mod validation;

pub use ids::{extract_timestamp_from_request_id, generate_request_id};
pub use preprocessing::{ImagePreprocessor, TensorPreprocessing};
pub use validation::{NumericValidator, TensorValidator};
