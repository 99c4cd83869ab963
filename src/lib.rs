#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Garment Cutout
//!
//! Garment segmentation for product photos: a model-based primary engine
//! (u2netp over ONNX Runtime or Tract), a deterministic rectangle-initialized
//! fallback, an area-ratio quality gate, binary mask cleanup and an RGBA
//! cutout compositor.
//!
//! ## Features
//!
//! - **Two engines**: u2netp primary with a classical fallback on any anomaly
//!   (missing model, runtime error, timeout, implausible mask)
//! - **Bounded latency**: per-engine wall-clock budgets
//! - **Mask cleanup**: opening, closing, median smoothing, hole filling and a
//!   tight bounding box
//! - **Observability**: `tracing` events with request ids and an injected
//!   metrics registry with counters and timing percentiles
//! - **CLI**: optional command-line tool (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use garment_cutout::{GarmentCutoutProcessor, RequestOptions, SegmentationConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = SegmentationConfig::builder()
//!     .model_path("/models/u2netp.onnx")
//!     .build()?;
//! let processor = GarmentCutoutProcessor::new(config)?;
//!
//! let bytes = tokio::fs::read("shirt.jpg").await?;
//! let result = processor.process_bytes(&bytes, RequestOptions::new()).await?;
//! result.save_png("shirt_cutout.png")?;
//! println!("engine: {}, bbox: {:?}", result.metadata.engine_name, result.metadata.bbox_xywh);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime inference for the primary engine
//! - `tract` (default): pure Rust inference for the primary engine
//! - `cli` (default): command-line interface and log subscriber setup
//! - `tracing-json`: JSON log lines for the CLI
//!
//! Without `onnx` and `tract` the primary engine is unavailable and every
//! request is served by the fallback engine.

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod orchestrator;
pub mod postprocess;
pub mod processor;
pub mod quality;
pub mod registry;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use backends::{DefaultFallback, PrimaryEngine, RectRefineEngine, SegmentationEngine};

#[cfg(feature = "opencv")]
pub use backends::GrabCutEngine;
#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;
#[cfg(feature = "tract")]
pub use backends::TractBackend;
pub use compositor::cutout_rgba;
pub use config::{BackendType, EnginePreference, SegmentationConfig, SegmentationConfigBuilder};
pub use error::{FailureKind, Result, SegmentationError};
pub use inference::{BackendConfig, InferenceBackend};
pub use metrics::{MetricsRegistry, MetricsSink, MetricsSnapshot, NoOpMetrics, SampleStats};
pub use orchestrator::{OrchestrationPolicy, Orchestrator, RequestContext};
pub use postprocess::{clean_mask, color_sampling_mask, fill_holes, tight_bbox};
pub use processor::{GarmentCutoutProcessor, RequestOptions};
pub use quality::{area_ratio, is_valid, QualityValidator};
pub use registry::{DefaultEngineFactory, EngineFactory, EngineRegistry, LazyEngine};
pub use services::{ImageIOService, InputLimits};
pub use types::{
    BgrImage, BoundingBox, CutoutMetadata, CutoutResult, EngineKind, SegmentationMask,
    SegmentationResult, StageTimings,
};
pub use utils::{
    extract_timestamp_from_request_id, generate_request_id, ImagePreprocessor, NumericValidator,
    TensorValidator,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Segment a garment from encoded JPEG or PNG bytes
///
/// One-shot convenience API: builds a processor for this call only, so the
/// primary model is loaded every time. Services should keep a
/// [`GarmentCutoutProcessor`] alive instead.
///
/// # Examples
///
/// ```rust,no_run
/// use garment_cutout::{segment_garment_from_bytes, EnginePreference, SegmentationConfig};
///
/// # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let config = SegmentationConfig::builder()
///     .engine(EnginePreference::Fallback)
///     .build()?;
/// let result = segment_garment_from_bytes(&upload, &config).await?;
/// let png = garment_cutout::ImageIOService::encode_png(&result.cutout)?;
/// # let _ = png;
/// # Ok(())
/// # }
/// ```
pub async fn segment_garment_from_bytes(
    image_bytes: &[u8],
    config: &SegmentationConfig,
) -> Result<CutoutResult> {
    let processor = GarmentCutoutProcessor::new(config.clone())?;
    processor
        .process_bytes(image_bytes, RequestOptions::new())
        .await
}

/// Segment a garment from a decoded `DynamicImage`
///
/// Same one-shot semantics as [`segment_garment_from_bytes`], without the
/// input size limits.
pub async fn segment_garment_from_image(
    image: &image::DynamicImage,
    config: &SegmentationConfig,
) -> Result<CutoutResult> {
    let processor = GarmentCutoutProcessor::new(config.clone())?;
    processor.process_image(image, RequestOptions::new()).await
}
