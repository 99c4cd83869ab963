//! Configuration types for garment segmentation operations

use crate::{
    error::{Result, SegmentationError},
    utils::validation::NumericValidator,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr};

/// Default upper bound on the longer image edge before segmentation
pub const DEFAULT_MAX_EDGE: u32 = 768;

/// Default per-engine wall-clock budget
pub const DEFAULT_ENGINE_TIMEOUT_MS: u64 = 1200;

/// Default maximum accepted upload size (10 MiB)
pub const DEFAULT_MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Which engine a request should start with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePreference {
    /// Primary first, fallback on any anomaly
    #[default]
    Auto,
    /// Same orchestration as `Auto`, requested explicitly
    Primary,
    /// Skip the primary engine entirely
    Fallback,
}

impl EnginePreference {
    /// True when the primary engine must not be invoked
    #[must_use]
    pub fn skips_primary(self) -> bool {
        matches!(self, Self::Fallback)
    }
}

impl std::fmt::Display for EnginePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Primary => write!(f, "u2netp"),
            Self::Fallback => write!(f, "grabcut"),
        }
    }
}

impl FromStr for EnginePreference {
    type Err = SegmentationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "u2netp" | "primary" => Ok(Self::Primary),
            "grabcut" | "fallback" => Ok(Self::Fallback),
            other => Err(SegmentationError::invalid_config(format!(
                "Unknown engine '{}'. Expected one of: auto, u2netp, grabcut",
                other
            ))),
        }
    }
}

/// Inference runtime used by the primary engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend
    #[default]
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

impl FromStr for BackendType {
    type Err = SegmentationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            other => Err(SegmentationError::invalid_config(format!(
                "Unknown backend '{}'. Expected one of: onnx, tract",
                other
            ))),
        }
    }
}

/// Default location of the primary model weights: `<home>/.u2net/u2netp.onnx`
#[must_use]
pub fn default_model_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".u2net").join("u2netp.onnx"))
}

/// Configuration for garment segmentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Engine preference for requests that do not override it
    pub engine: EnginePreference,

    /// Inference runtime for the primary engine
    pub backend_type: BackendType,

    /// Primary model weights (None = default location)
    pub model_path: Option<PathBuf>,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Morphological kernel side (odd, 1-7)
    pub morph_kernel: u32,

    /// Median blur window (0 disables, otherwise odd up to 9)
    pub median_blur: u32,

    /// Lower bound on an accepted mask area ratio
    pub min_mask_area_ratio: f64,

    /// Upper bound on an accepted mask area ratio
    pub max_mask_area_ratio: f64,

    /// Wall-clock budget for one primary engine call
    pub primary_timeout_ms: u64,

    /// Wall-clock budget for one fallback engine call
    pub fallback_timeout_ms: u64,

    /// Never invoke the primary engine
    pub force_fallback: bool,

    /// Erode the final mask before color sampling
    pub erode_before_color: bool,

    /// Longer edge limit applied before segmentation (256-4096)
    pub max_edge: u32,

    /// Gamma applied before segmentation (0.8-2.2)
    pub gamma: f32,

    /// Smallest accepted input width or height when decoding bytes
    pub min_edge: u32,

    /// Largest accepted encoded input size in bytes
    pub max_file_bytes: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            engine: EnginePreference::default(),
            backend_type: BackendType::default(),
            model_path: None,
            intra_threads: 0,
            morph_kernel: 3,
            median_blur: 5,
            min_mask_area_ratio: 0.03,
            max_mask_area_ratio: 0.98,
            primary_timeout_ms: DEFAULT_ENGINE_TIMEOUT_MS,
            fallback_timeout_ms: DEFAULT_ENGINE_TIMEOUT_MS,
            force_fallback: false,
            erode_before_color: false,
            max_edge: DEFAULT_MAX_EDGE,
            gamma: 1.2,
            min_edge: 256,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

impl SegmentationConfig {
    /// Create a new configuration builder for fluent API construction
    ///
    /// # Examples
    ///
    /// ```rust
    /// use garment_cutout::{EnginePreference, SegmentationConfig};
    ///
    /// let config = SegmentationConfig::builder()
    ///     .engine(EnginePreference::Fallback)
    ///     .morph_kernel(5)
    ///     .median_blur(0)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.morph_kernel, 5);
    /// ```
    #[must_use]
    pub fn builder() -> SegmentationConfigBuilder {
        SegmentationConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Validation Rules
    ///
    /// - Morphological kernel: odd, 1-7
    /// - Median blur: 0 or odd, up to 9
    /// - Area ratio bounds: 0 <= min < max <= 1
    /// - Engine timeouts: positive
    /// - Max edge: 256-4096
    /// - Gamma: 0.8-2.2
    ///
    /// # Errors
    /// Returns `SegmentationError::InvalidConfig` naming the parameter, the
    /// offending value and its valid range.
    ///
    /// ```rust
    /// use garment_cutout::SegmentationConfig;
    ///
    /// let mut config = SegmentationConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.morph_kernel = 4;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        NumericValidator::validate_kernel_size(self.morph_kernel)?;
        NumericValidator::validate_blur_size(self.median_blur)?;
        NumericValidator::validate_ratio_bounds(self.min_mask_area_ratio, self.max_mask_area_ratio)?;
        NumericValidator::validate_positive(self.primary_timeout_ms, "primary_timeout_ms")?;
        NumericValidator::validate_positive(self.fallback_timeout_ms, "fallback_timeout_ms")?;
        NumericValidator::validate_thread_count(self.intra_threads)?;

        if !(256..=4096).contains(&self.max_edge) {
            return Err(SegmentationError::config_value_error(
                "max_edge",
                self.max_edge,
                "256-4096",
                Some(DEFAULT_MAX_EDGE),
            ));
        }

        if !self.gamma.is_finite() || !(0.8..=2.2).contains(&self.gamma) {
            return Err(SegmentationError::config_value_error(
                "gamma",
                self.gamma,
                "0.8-2.2",
                Some(1.2),
            ));
        }

        NumericValidator::validate_positive(self.max_file_bytes, "max_file_bytes")?;

        Ok(())
    }

    /// Effective engine preference (the force flag wins)
    #[must_use]
    pub fn effective_engine(&self) -> EnginePreference {
        if self.force_fallback {
            EnginePreference::Fallback
        } else {
            self.engine
        }
    }

    /// Model path to load, resolving the default location when unset
    #[must_use]
    pub fn resolved_model_path(&self) -> Option<PathBuf> {
        self.model_path.clone().or_else(default_model_path)
    }
}

/// Builder for `SegmentationConfig`
#[derive(Debug, Default)]
pub struct SegmentationConfigBuilder {
    config: SegmentationConfig,
}

impl SegmentationConfigBuilder {
    #[must_use]
    pub fn engine(mut self, engine: EnginePreference) -> Self {
        self.config.engine = engine;
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    /// Set the primary model weights path
    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.model_path = Some(path.into());
        self
    }

    /// Set number of intra-op threads
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn morph_kernel(mut self, kernel: u32) -> Self {
        self.config.morph_kernel = kernel;
        self
    }

    #[must_use]
    pub fn median_blur(mut self, blur: u32) -> Self {
        self.config.median_blur = blur;
        self
    }

    /// Set accepted mask area ratio bounds
    #[must_use]
    pub fn mask_area_ratio_bounds(mut self, min: f64, max: f64) -> Self {
        self.config.min_mask_area_ratio = min;
        self.config.max_mask_area_ratio = max;
        self
    }

    #[must_use]
    pub fn primary_timeout_ms(mut self, ms: u64) -> Self {
        self.config.primary_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn fallback_timeout_ms(mut self, ms: u64) -> Self {
        self.config.fallback_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn force_fallback(mut self, force: bool) -> Self {
        self.config.force_fallback = force;
        self
    }

    #[must_use]
    pub fn erode_before_color(mut self, erode: bool) -> Self {
        self.config.erode_before_color = erode;
        self
    }

    #[must_use]
    pub fn max_edge(mut self, max_edge: u32) -> Self {
        self.config.max_edge = max_edge;
        self
    }

    #[must_use]
    pub fn gamma(mut self, gamma: f32) -> Self {
        self.config.gamma = gamma;
        self
    }

    /// Set input limits used when decoding encoded bytes
    #[must_use]
    pub fn input_limits(mut self, min_edge: u32, max_file_bytes: usize) -> Self {
        self.config.min_edge = min_edge;
        self.config.max_file_bytes = max_file_bytes;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Any parameter outside its valid range.
    pub fn build(self) -> Result<SegmentationConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}
