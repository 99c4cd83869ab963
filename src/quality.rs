//! Mask quality checks based on foreground area ratio

use crate::types::SegmentationMask;

/// Lowest accepted foreground fraction by default
pub const MIN_MASK_AREA_RATIO: f64 = 0.03;

/// Highest accepted foreground fraction by default
pub const MAX_MASK_AREA_RATIO: f64 = 0.98;

/// Fraction of nonzero samples; 0 for a zero-area mask
#[must_use]
pub fn area_ratio(mask: &SegmentationMask) -> f64 {
    let area = mask.area();
    if area == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = mask.count_nonzero() as f64 / area as f64;
    ratio
}

/// Area-ratio gate with configurable bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityValidator {
    min_ratio: f64,
    max_ratio: f64,
}

impl Default for QualityValidator {
    fn default() -> Self {
        Self::new(MIN_MASK_AREA_RATIO, MAX_MASK_AREA_RATIO)
    }
}

impl QualityValidator {
    /// Bounds are expected to be validated by the configuration layer
    #[must_use]
    pub fn new(min_ratio: f64, max_ratio: f64) -> Self {
        Self {
            min_ratio,
            max_ratio,
        }
    }

    #[must_use]
    pub fn min_ratio(&self) -> f64 {
        self.min_ratio
    }

    #[must_use]
    pub fn max_ratio(&self) -> f64 {
        self.max_ratio
    }

    #[must_use]
    pub fn area_ratio(&self, mask: &SegmentationMask) -> f64 {
        area_ratio(mask)
    }

    /// Inclusive bounds check on a precomputed ratio
    #[must_use]
    pub fn accepts(&self, ratio: f64) -> bool {
        (self.min_ratio..=self.max_ratio).contains(&ratio)
    }

    #[must_use]
    pub fn is_valid(&self, mask: &SegmentationMask) -> bool {
        self.accepts(area_ratio(mask))
    }
}

/// `is_valid` with the default bounds
#[must_use]
pub fn is_valid(mask: &SegmentationMask) -> bool {
    QualityValidator::default().is_valid(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_ratio_square() {
        let mut mask = SegmentationMask::zeros(100, 100);
        mask.fill_rect(25, 25, 50, 50, 255);
        assert!((area_ratio(&mask) - 0.25).abs() < f64::EPSILON);
        assert!(is_valid(&mask));
    }

    #[test]
    fn test_area_ratio_zero_area() {
        let mask = SegmentationMask::zeros(0, 0);
        assert_eq!(area_ratio(&mask), 0.0);
        assert!(!is_valid(&mask));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let validator = QualityValidator::default();
        assert!(validator.accepts(0.03));
        assert!(validator.accepts(0.98));
        assert!(!validator.accepts(0.029_999));
        assert!(!validator.accepts(0.980_001));
    }

    #[test]
    fn test_full_and_empty_masks_rejected() {
        let empty = SegmentationMask::zeros(10, 10);
        let mut full = SegmentationMask::zeros(10, 10);
        full.fill_rect(0, 0, 10, 10, 255);
        assert!(!is_valid(&empty));
        assert!(!is_valid(&full));
        assert_eq!(area_ratio(&full), 1.0);
    }

    #[test]
    fn test_custom_bounds() {
        let mut mask = SegmentationMask::zeros(10, 10);
        mask.fill_rect(0, 0, 1, 1, 255);
        assert!(!is_valid(&mask));
        assert!(QualityValidator::new(0.0, 0.5).is_valid(&mask));
    }

    #[test]
    fn test_ratio_stays_bounded_for_oversized_buffer() {
        let mask = SegmentationMask::new(vec![255; 200], (10, 10));
        assert_eq!(area_ratio(&mask), 1.0);
        let short = SegmentationMask::new(vec![255; 50], (10, 10));
        assert!((area_ratio(&short) - 0.5).abs() < f64::EPSILON);
    }
}
