//! Error types for garment segmentation operations

use thiserror::Error;

/// Result type alias for segmentation operations
pub type Result<T> = std::result::Result<T, SegmentationError>;

/// Error taxonomy for the segmentation pipeline
#[derive(Error, Debug)]
pub enum SegmentationError {
    /// Engine dependency or model weights missing at construction time
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Runtime error or malformed output during an engine call
    #[error("Engine failure: {0}")]
    EngineFailure(String),

    /// A stage exceeded its wall-clock budget
    #[error("Stage '{stage}' timed out after {budget_ms}ms")]
    Timeout { stage: String, budget_ms: u64 },

    /// Both engines produced masks outside the accepted area ratio range
    #[error("Mask quality below threshold (ratio: {ratio:.3}, accepted: {min:.2}-{max:.2})")]
    QualityBelowThreshold { ratio: f64, min: f64, max: f64 },

    /// Bounding box extraction found no foreground pixels
    #[error("Mask is empty - cannot compute bounding box")]
    EmptyMask,

    /// Compositor inputs differ in size
    #[error("Dimension mismatch: image is {}x{}, mask is {}x{}", image.0, image.1, mask.0, mask.1)]
    DimensionMismatch { image: (u32, u32), mask: (u32, u32) },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input image rejected before segmentation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The request was cancelled at a stage boundary
    #[error("Request cancelled before stage '{stage}'")]
    Cancelled { stage: String },

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable failure keys used for metrics and log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    EngineUnavailable,
    EngineFailure,
    Timeout,
    QualityBelowThreshold,
    EmptyMask,
    DimensionMismatch,
    InvalidConfig,
    InvalidInput,
    Cancelled,
    Io,
    Image,
    Internal,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EngineUnavailable => "engine_unavailable",
            Self::EngineFailure => "engine_failure",
            Self::Timeout => "timeout",
            Self::QualityBelowThreshold => "quality_below_threshold",
            Self::EmptyMask => "empty_mask",
            Self::DimensionMismatch => "dimension_mismatch",
            Self::InvalidConfig => "invalid_config",
            Self::InvalidInput => "invalid_input",
            Self::Cancelled => "cancelled",
            Self::Io => "io",
            Self::Image => "image",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SegmentationError {
    /// Create a new engine unavailable error
    pub fn engine_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::EngineUnavailable(msg.into())
    }

    /// Create a new engine failure error
    pub fn engine_failure<S: Into<String>>(msg: S) -> Self {
        Self::EngineFailure(msg.into())
    }

    /// Create a new timeout error for a stage
    pub fn timeout<S: Into<String>>(stage: S, budget_ms: u64) -> Self {
        Self::Timeout {
            stage: stage.into(),
            budget_ms,
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new cancellation error
    pub fn cancelled<S: Into<String>>(stage: S) -> Self {
        Self::Cancelled {
            stage: stage.into(),
        }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create engine failure with the engine name and operation
    pub fn engine_error_with_context(engine: &str, operation: &str, error: &str) -> Self {
        Self::EngineFailure(format!("{} failed in '{}' engine: {}", operation, engine, error))
    }

    /// Failure key for metrics and structured logs
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::EngineUnavailable(_) => FailureKind::EngineUnavailable,
            Self::EngineFailure(_) => FailureKind::EngineFailure,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::QualityBelowThreshold { .. } => FailureKind::QualityBelowThreshold,
            Self::EmptyMask => FailureKind::EmptyMask,
            Self::DimensionMismatch { .. } => FailureKind::DimensionMismatch,
            Self::InvalidConfig(_) => FailureKind::InvalidConfig,
            Self::InvalidInput(_) => FailureKind::InvalidInput,
            Self::Cancelled { .. } => FailureKind::Cancelled,
            Self::Io(_) => FailureKind::Io,
            Self::Image(_) => FailureKind::Image,
            Self::Internal(_) => FailureKind::Internal,
        }
    }

    /// True when the failure means no usable foreground was found, as opposed
    /// to an internal engine or I/O problem.
    #[must_use]
    pub fn is_no_foreground(&self) -> bool {
        matches!(self, Self::QualityBelowThreshold { .. } | Self::EmptyMask)
    }

    /// Caller-facing message without engine internals
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::QualityBelowThreshold { ratio, .. } => format!(
                "Segmentation failed: mask unusable (ratio: {:.3}). Try simpler background, better lighting.",
                ratio
            ),
            Self::EmptyMask => "No garment foreground found in the image".to_string(),
            Self::InvalidConfig(msg) | Self::InvalidInput(msg) => msg.clone(),
            Self::DimensionMismatch { .. } => "Image and mask dimensions must match".to_string(),
            Self::Cancelled { .. } => "Request cancelled".to_string(),
            Self::Timeout { .. } => "Segmentation timed out".to_string(),
            Self::EngineUnavailable(_)
            | Self::EngineFailure(_)
            | Self::Io(_)
            | Self::Image(_)
            | Self::Internal(_) => "Internal segmentation error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SegmentationError::engine_unavailable("model weights missing");
        assert!(matches!(err, SegmentationError::EngineUnavailable(_)));

        let err = SegmentationError::timeout("primary", 1200);
        assert!(matches!(err, SegmentationError::Timeout { budget_ms: 1200, .. }));
    }

    #[test]
    fn test_error_display() {
        let err = SegmentationError::invalid_config("kernel must be odd");
        assert_eq!(err.to_string(), "Invalid configuration: kernel must be odd");

        let err = SegmentationError::DimensionMismatch {
            image: (100, 100),
            mask: (50, 50),
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: image is 100x100, mask is 50x50"
        );
    }

    #[test]
    fn test_config_value_error_context() {
        let err = SegmentationError::config_value_error("morph_kernel", 4, "odd 1-7", Some(3));
        let error_string = err.to_string();
        assert!(error_string.contains("morph_kernel"));
        assert!(error_string.contains('4'));
        assert!(error_string.contains("odd 1-7"));
        assert!(error_string.contains("Recommended: 3"));
    }

    #[test]
    fn test_failure_kinds_are_stable_keys() {
        assert_eq!(SegmentationError::EmptyMask.kind().as_str(), "empty_mask");
        assert_eq!(
            SegmentationError::timeout("fallback", 10).kind().as_str(),
            "timeout"
        );
        assert_eq!(
            SegmentationError::QualityBelowThreshold {
                ratio: 0.01,
                min: 0.03,
                max: 0.98
            }
            .kind()
            .to_string(),
            "quality_below_threshold"
        );
    }

    #[test]
    fn test_no_foreground_is_distinguishable_from_engine_errors() {
        assert!(SegmentationError::EmptyMask.is_no_foreground());
        assert!(SegmentationError::QualityBelowThreshold {
            ratio: 0.99,
            min: 0.03,
            max: 0.98
        }
        .is_no_foreground());
        assert!(!SegmentationError::engine_failure("bad shape").is_no_foreground());

        let internal = SegmentationError::engine_failure("onnxruntime: node 42 exploded");
        assert!(!internal.user_message().contains("node 42"));
    }
}
