//! Model-based primary engine (U²-Net family)

use crate::{
    backends::SegmentationEngine,
    error::{Result, SegmentationError},
    inference::{BackendConfig, InferenceBackend},
    types::{BgrImage, EngineKind, SegmentationMask},
    utils::{
        preprocessing::{ImagePreprocessor, TensorPreprocessing},
        validation::TensorValidator,
    },
};
use image::{imageops::FilterType, GrayImage};
use ndarray::Array4;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Alpha values above this are foreground
pub const ALPHA_THRESHOLD: u8 = 10;

/// Primary engine: runs the model and thresholds its alpha output
pub struct PrimaryEngine {
    backend: Mutex<Box<dyn InferenceBackend>>,
    preprocessing: TensorPreprocessing,
}

impl std::fmt::Debug for PrimaryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryEngine")
            .field("preprocessing", &self.preprocessing)
            .finish_non_exhaustive()
    }
}

impl PrimaryEngine {
    pub const NAME: &'static str = "u2netp";

    /// Initialize `backend` with `config` and wrap it
    ///
    /// # Errors
    /// `EngineUnavailable` when the backend cannot load the model.
    pub fn new(mut backend: Box<dyn InferenceBackend>, config: &BackendConfig) -> Result<Self> {
        let load_time = backend.initialize(config)?;
        info!(
            engine = Self::NAME,
            backend = backend.name(),
            load_ms = load_time.map(|d| d.as_millis() as u64),
            "Primary engine ready"
        );
        Ok(Self::with_backend(
            backend,
            TensorPreprocessing {
                input_size: config.input_size,
                ..TensorPreprocessing::default()
            },
        ))
    }

    /// Wrap an already initialized backend
    #[must_use]
    pub fn with_backend(backend: Box<dyn InferenceBackend>, preprocessing: TensorPreprocessing) -> Self {
        Self {
            backend: Mutex::new(backend),
            preprocessing,
        }
    }

    /// Turn a raw `[1, 1, H, W]` model output into a binary mask of the given size
    ///
    /// The output is min-max normalized (a constant output becomes all zero),
    /// scaled to 8 bits, resized to the target size when needed and
    /// thresholded at `alpha > 10`.
    ///
    /// # Errors
    /// `EngineFailure` when the output is not a single-channel, single-batch map.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn decode_alpha(output: &Array4<f32>, width: u32, height: u32) -> Result<SegmentationMask> {
        TensorValidator::validate_single_batch_single_channel(output)?;
        let (_, _, out_h, out_w) = output.dim();

        let (min, max) = output
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if !min.is_finite() || !max.is_finite() {
            return Err(SegmentationError::engine_failure(
                "Model output contains non-finite values",
            ));
        }
        let range = max - min;

        let alpha: Vec<u8> = output
            .iter()
            .map(|&v| {
                if range > 0.0 {
                    (((v - min) / range) * 255.0).clamp(0.0, 255.0) as u8
                } else {
                    0
                }
            })
            .collect();

        let alpha_image = GrayImage::from_raw(out_w as u32, out_h as u32, alpha)
            .ok_or_else(|| SegmentationError::internal("Alpha buffer length mismatch"))?;

        let alpha_image = if alpha_image.dimensions() == (width, height) {
            alpha_image
        } else {
            image::imageops::resize(&alpha_image, width, height, FilterType::Lanczos3)
        };

        let data = alpha_image
            .into_raw()
            .into_iter()
            .map(|a| if a > ALPHA_THRESHOLD { 255 } else { 0 })
            .collect();
        Ok(SegmentationMask::new(data, (width, height)))
    }
}

impl SegmentationEngine for PrimaryEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Primary
    }

    fn segment(&self, image: &BgrImage) -> Result<SegmentationMask> {
        let tensor = ImagePreprocessor::prepare_tensor(image, &self.preprocessing)?;

        let output = {
            let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
            backend.infer(&tensor).map_err(|e| match e {
                SegmentationError::EngineFailure(_) => e,
                other => SegmentationError::engine_error_with_context(
                    Self::NAME,
                    "inference",
                    &other.to_string(),
                ),
            })?
        };

        let mask = Self::decode_alpha(&output, image.width(), image.height())?;
        debug!(
            engine = Self::NAME,
            foreground = mask.count_nonzero(),
            "Primary mask decoded"
        );
        Ok(mask)
    }
}
