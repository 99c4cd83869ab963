//! Numeric validation utilities
//!
//! Range validation for the post-processing parameters, area-ratio bounds
//! and stage budgets.

use crate::error::{Result, SegmentationError};

/// Largest accepted morphology kernel side
pub const MAX_KERNEL_SIZE: u32 = 7;

/// Largest accepted median window side
pub const MAX_BLUR_SIZE: u32 = 9;

/// Validator for numeric parameters
pub struct NumericValidator;

impl NumericValidator {
    /// Morphological kernel: odd, 1..=7
    pub fn validate_kernel_size(value: u32) -> Result<u32> {
        if !(1..=MAX_KERNEL_SIZE).contains(&value) || value % 2 == 0 {
            return Err(SegmentationError::config_value_error(
                "morph_kernel",
                value,
                "odd 1-7",
                Some(3),
            ));
        }
        Ok(value)
    }

    /// Median blur window: 0 (disabled) or odd up to 9
    pub fn validate_blur_size(value: u32) -> Result<u32> {
        if value > MAX_BLUR_SIZE || (value != 0 && value % 2 == 0) {
            return Err(SegmentationError::config_value_error(
                "median_blur",
                value,
                "0 or odd 1-9",
                Some(5),
            ));
        }
        Ok(value)
    }

    /// Validate ratio value (0.0 to 1.0)
    pub fn validate_ratio(value: f64, name: &str) -> Result<f64> {
        if !value.is_finite() {
            return Err(SegmentationError::invalid_config(format!(
                "{} must be finite, got {}",
                name, value
            )));
        }

        if !(0.0..=1.0).contains(&value) {
            return Err(SegmentationError::invalid_config(format!(
                "{} must be between 0.0 and 1.0, got {}",
                name, value
            )));
        }

        Ok(value)
    }

    /// Area-ratio acceptance bounds: 0 <= min < max <= 1
    pub fn validate_ratio_bounds(min: f64, max: f64) -> Result<(f64, f64)> {
        let min = Self::validate_ratio(min, "min_mask_area_ratio")?;
        let max = Self::validate_ratio(max, "max_mask_area_ratio")?;
        if min >= max {
            return Err(SegmentationError::invalid_config(format!(
                "min_mask_area_ratio ({}) must be below max_mask_area_ratio ({})",
                min, max
            )));
        }
        Ok((min, max))
    }

    /// Validate numeric range (inclusive)
    pub fn validate_range<T>(value: T, min: T, max: T, name: &str) -> Result<T>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            return Err(SegmentationError::invalid_config(format!(
                "{} must be between {} and {}, got {}",
                name, min, max, value
            )));
        }
        Ok(value)
    }

    /// Validate that a value is positive
    pub fn validate_positive<T>(value: T, name: &str) -> Result<T>
    where
        T: PartialOrd + std::fmt::Display + Copy + Default,
    {
        if value <= T::default() {
            return Err(SegmentationError::invalid_config(format!(
                "{} must be positive, got {}",
                name, value
            )));
        }
        Ok(value)
    }

    /// Validate thread count
    pub fn validate_thread_count(value: usize) -> Result<usize> {
        const MAX_THREADS: usize = 256;

        if value > MAX_THREADS {
            return Err(SegmentationError::invalid_config(format!(
                "Thread count {} exceeds maximum allowed ({})",
                value, MAX_THREADS
            )));
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_kernel_size() {
        for k in [1, 3, 5, 7] {
            assert_eq!(NumericValidator::validate_kernel_size(k).unwrap(), k);
        }
        for k in [0, 2, 4, 6, 8, 9] {
            assert!(NumericValidator::validate_kernel_size(k).is_err());
        }
    }

    #[test]
    fn test_validate_blur_size() {
        for b in [0, 1, 3, 5, 7, 9] {
            assert_eq!(NumericValidator::validate_blur_size(b).unwrap(), b);
        }
        for b in [2, 4, 8, 10, 11] {
            assert!(NumericValidator::validate_blur_size(b).is_err());
        }
    }

    #[test]
    fn test_validate_ratio_bounds() {
        assert!(NumericValidator::validate_ratio_bounds(0.03, 0.98).is_ok());
        assert!(NumericValidator::validate_ratio_bounds(0.0, 1.0).is_ok());
        assert!(NumericValidator::validate_ratio_bounds(0.5, 0.5).is_err());
        assert!(NumericValidator::validate_ratio_bounds(-0.1, 0.5).is_err());
        assert!(NumericValidator::validate_ratio_bounds(0.1, 1.5).is_err());
        assert!(NumericValidator::validate_ratio_bounds(f64::NAN, 0.5).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(NumericValidator::validate_range(768, 256, 4096, "max_edge").is_ok());
        assert!(NumericValidator::validate_range(256, 256, 4096, "max_edge").is_ok());
        assert!(NumericValidator::validate_range(255, 256, 4096, "max_edge").is_err());
        assert!(NumericValidator::validate_range(2.3, 0.8, 2.2, "gamma").is_err());
    }

    #[test]
    fn test_validate_positive() {
        assert!(NumericValidator::validate_positive(1u64, "timeout").is_ok());
        assert!(NumericValidator::validate_positive(0u64, "timeout").is_err());
    }

    #[test]
    fn test_validate_thread_count() {
        assert!(NumericValidator::validate_thread_count(0).is_ok());
        assert!(NumericValidator::validate_thread_count(257).is_err());
    }
}
