//! Consolidated validation utilities
//!
//! Centralized range and shape checks shared by the configuration layer
//! and the engines.

pub mod numeric;
pub mod tensor;

pub use numeric::NumericValidator;
pub use tensor::TensorValidator;
