//! Full cutout pipeline
//!
//! `GarmentCutoutProcessor` owns the engine registry, the orchestrator and
//! the metrics registry. One processor is meant to be shared by all requests
//! of a process; every request owns its own image, mask and result.

use crate::{
    compositor::cutout_rgba,
    config::{EnginePreference, SegmentationConfig},
    error::{Result, SegmentationError},
    metrics::{MetricsRegistry, MetricsSink, MetricsSnapshot},
    orchestrator::{OrchestrationPolicy, Orchestrator, RequestContext},
    postprocess::{clean_mask, color_sampling_mask, fill_holes, tight_bbox},
    quality,
    registry::{DefaultEngineFactory, EngineFactory, EngineRegistry},
    services::{ImageIOService, InputLimits},
    types::{BgrImage, CutoutMetadata, CutoutResult, StageTimings},
    utils::{preprocessing::ImagePreprocessor, validation::NumericValidator},
};
use image::DynamicImage;
use std::{path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

// Use instant crate for cross-platform time compatibility
use instant::Instant;

/// Per-request overrides
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Engine preference (config default when `None`)
    pub engine: Option<EnginePreference>,
    /// Morphological kernel override
    pub morph_kernel: Option<u32>,
    /// Median blur override
    pub median_blur: Option<u32>,
    /// Caller-supplied request id (generated when `None`)
    pub request_id: Option<String>,
    /// Token checked at stage boundaries
    pub cancellation: Option<CancellationToken>,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn engine(mut self, engine: EnginePreference) -> Self {
        self.engine = Some(engine);
        self
    }

    #[must_use]
    pub fn morph_kernel(mut self, kernel: u32) -> Self {
        self.morph_kernel = Some(kernel);
        self
    }

    #[must_use]
    pub fn median_blur(mut self, blur: u32) -> Self {
        self.median_blur = Some(blur);
        self
    }

    #[must_use]
    pub fn request_id<S: Into<String>>(mut self, request_id: S) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Request parameters after applying overrides to the configuration
#[derive(Debug, Clone, Copy)]
struct EffectiveParams {
    kernel: u32,
    blur: u32,
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn check(token: &CancellationToken, stage: &str) -> Result<()> {
    if token.is_cancelled() {
        return Err(SegmentationError::cancelled(stage));
    }
    Ok(())
}

/// Output of the post-processing stage
struct Postprocessed {
    mask: crate::types::SegmentationMask,
    color_mask: crate::types::SegmentationMask,
    bbox: crate::types::BoundingBox,
    cutout: image::RgbaImage,
}

/// Garment segmentation and cutout processor
pub struct GarmentCutoutProcessor {
    config: SegmentationConfig,
    orchestrator: Orchestrator,
    metrics: Arc<MetricsRegistry>,
}

impl std::fmt::Debug for GarmentCutoutProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GarmentCutoutProcessor")
            .field("config", &self.config)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl GarmentCutoutProcessor {
    /// Create a processor with the default engine factory
    ///
    /// Engines are constructed lazily on first use.
    ///
    /// # Errors
    /// `InvalidConfig` when the configuration does not validate.
    pub fn new(config: SegmentationConfig) -> Result<Self> {
        Self::with_factory(config, Arc::new(DefaultEngineFactory::new()))
    }

    /// Create a processor with a custom engine factory
    ///
    /// # Errors
    /// `InvalidConfig` when the configuration does not validate.
    pub fn with_factory(config: SegmentationConfig, factory: Arc<dyn EngineFactory>) -> Result<Self> {
        config.validate()?;
        let engines = Arc::new(EngineRegistry::new(config.clone(), factory));
        Self::with_parts(config, engines, Arc::new(MetricsRegistry::new()))
    }

    /// Create a processor over explicit engines and metrics registry
    ///
    /// # Errors
    /// `InvalidConfig` when the configuration does not validate.
    pub fn with_parts(
        config: SegmentationConfig,
        engines: Arc<EngineRegistry>,
        metrics: Arc<MetricsRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let sink: Arc<dyn MetricsSink> = metrics.clone();
        let orchestrator =
            Orchestrator::new(engines, sink, OrchestrationPolicy::from_config(&config));
        info!(
            engine = %config.effective_engine(),
            backend = %config.backend_type,
            morph_kernel = config.morph_kernel,
            median_blur = config.median_blur,
            "Garment cutout processor created"
        );
        Ok(Self {
            config,
            orchestrator,
            metrics,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Shared metrics registry
    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    #[must_use]
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Decode untrusted JPEG or PNG bytes and run the pipeline
    ///
    /// # Errors
    /// `InvalidInput` for rejected input, otherwise as [`Self::process_bgr`].
    pub async fn process_bytes(&self, bytes: &[u8], options: RequestOptions) -> Result<CutoutResult> {
        let limits = InputLimits::from_config(&self.config);
        let image = ImageIOService::decode_bytes(bytes, &limits).map_err(|e| {
            self.metrics.increment_request_count();
            self.record_failure(e, options.request_id.as_deref().unwrap_or("-"))
        })?;
        self.process_bgr(image, options).await
    }

    /// Load an image file and run the pipeline
    ///
    /// # Errors
    /// I/O and decoding errors, otherwise as [`Self::process_bgr`].
    pub async fn process_file<P: AsRef<Path>>(
        &self,
        path: P,
        options: RequestOptions,
    ) -> Result<CutoutResult> {
        let path = path.as_ref().to_path_buf();
        let image = tokio::task::spawn_blocking(move || ImageIOService::load_image(path))
            .await
            .map_err(|e| SegmentationError::internal(format!("Image loading task failed: {e}")))??;
        self.process_image(&image, options).await
    }

    /// Run the pipeline on a decoded image
    ///
    /// # Errors
    /// As [`Self::process_bgr`].
    pub async fn process_image(
        &self,
        image: &DynamicImage,
        options: RequestOptions,
    ) -> Result<CutoutResult> {
        self.process_bgr(BgrImage::from_dynamic(image), options).await
    }

    /// Run the pipeline on a BGR image
    ///
    /// Stages: resize and gamma, engine orchestration, mask cleanup, hole
    /// filling, bounding box, optional erosion of the color-sampling mask and
    /// RGBA compositing.
    ///
    /// # Errors
    /// - `InvalidConfig` for invalid per-request overrides
    /// - Orchestration errors (`QualityBelowThreshold`, engine errors, `Timeout`)
    /// - `EmptyMask` when post-processing leaves no foreground
    /// - `Cancelled` when the request is cancelled at a stage boundary
    #[instrument(
        skip_all,
        fields(
            request_id = tracing::field::Empty,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub async fn process_bgr(&self, image: BgrImage, options: RequestOptions) -> Result<CutoutResult> {
        let ctx = RequestContext {
            request_id: options
                .request_id
                .clone()
                .unwrap_or_else(crate::utils::generate_request_id),
            engine: options.engine.map_or_else(
                || self.config.effective_engine(),
                |engine| {
                    if self.config.force_fallback {
                        EnginePreference::Fallback
                    } else {
                        engine
                    }
                },
            ),
            cancellation: options.cancellation.clone().unwrap_or_default(),
        };
        tracing::Span::current().record("request_id", ctx.request_id.as_str());
        self.metrics.increment_request_count();

        let total_start = Instant::now();
        let params = self
            .resolve_params(&options)
            .map_err(|e| self.record_failure(e, &ctx.request_id))?;

        // Preprocess
        ctx.check_cancelled("preprocess")
            .map_err(|e| self.record_failure(e, &ctx.request_id))?;
        let preprocess_start = Instant::now();
        let (max_edge, gamma) = (self.config.max_edge, self.config.gamma);
        let prepared = tokio::task::spawn_blocking(move || {
            let resized = ImagePreprocessor::resize_long_edge(&image, max_edge)?;
            Ok::<_, SegmentationError>(ImagePreprocessor::gamma_correct(&resized, gamma))
        })
        .await
        .map_err(|e| SegmentationError::internal(format!("Preprocessing task failed: {e}")))
        .and_then(|r| r)
        .map_err(|e| self.record_failure(e, &ctx.request_id))?;
        let prepared = Arc::new(prepared);
        let preprocess_ms = elapsed_ms(preprocess_start);
        self.metrics.record_timing("preprocess", preprocess_ms);
        debug!(
            width = prepared.width(),
            height = prepared.height(),
            preprocess_ms,
            "Image preprocessed"
        );

        // Segment (failures are counted by the orchestrator)
        let segment_start = Instant::now();
        let segmentation = self.orchestrator.segment(Arc::clone(&prepared), &ctx).await?;
        let segment_ms = elapsed_ms(segment_start);
        self.metrics.record_timing("segment", segment_ms);

        // Postprocess
        let postprocess_start = Instant::now();
        let erode_first = self.config.erode_before_color;
        let token = ctx.cancellation.clone();
        let image_for_cutout = Arc::clone(&prepared);
        let raw_mask = segmentation.mask.clone();
        let span = tracing::debug_span!("postprocess", request_id = %ctx.request_id);
        let post = tokio::task::spawn_blocking(move || -> Result<Postprocessed> {
            let _entered = span.enter();
            check(&token, "clean_mask")?;
            let cleaned = clean_mask(&raw_mask, params.kernel, params.blur);
            check(&token, "fill_holes")?;
            let mask = fill_holes(&cleaned);
            check(&token, "bbox")?;
            let bbox = tight_bbox(&mask)?;
            let color_mask = color_sampling_mask(&mask, params.kernel, erode_first);
            check(&token, "composite")?;
            let cutout = cutout_rgba(&image_for_cutout, &mask)?;
            Ok(Postprocessed {
                mask,
                color_mask,
                bbox,
                cutout,
            })
        })
        .await
        .map_err(|e| SegmentationError::internal(format!("Postprocessing task failed: {e}")))
        .and_then(|r| r)
        .map_err(|e| self.record_failure(e, &ctx.request_id))?;
        let postprocess_ms = elapsed_ms(postprocess_start);
        self.metrics.record_timing("postprocess", postprocess_ms);

        let total_ms = elapsed_ms(total_start);
        self.metrics.record_timing("total", total_ms);

        let mask_area_ratio = quality::area_ratio(&post.mask);
        let metadata = CutoutMetadata {
            request_id: ctx.request_id.clone(),
            engine_used: segmentation.engine_used,
            engine_name: segmentation.engine_name.clone(),
            fallback_triggered: segmentation.fallback_triggered,
            mask_area_ratio,
            duration_ms: total_ms,
            width: prepared.width(),
            height: prepared.height(),
            bbox_xywh: post.bbox.to_xywh(),
            morph_kernel: params.kernel,
            median_blur: params.blur,
            gamma: self.config.gamma,
            timings: StageTimings {
                preprocess_ms,
                segment_ms,
                postprocess_ms,
                total_ms,
            },
        };

        info!(
            request_id = %ctx.request_id,
            engine = %metadata.engine_name,
            fallback_triggered = metadata.fallback_triggered,
            mask_area_ratio,
            bbox = ?metadata.bbox_xywh,
            total_ms,
            "Cutout complete"
        );

        Ok(CutoutResult {
            cutout: post.cutout,
            mask: post.mask,
            color_mask: post.color_mask,
            bbox: post.bbox,
            metadata,
        })
    }

    fn resolve_params(&self, options: &RequestOptions) -> Result<EffectiveParams> {
        let kernel = options.morph_kernel.unwrap_or(self.config.morph_kernel);
        let blur = options.median_blur.unwrap_or(self.config.median_blur);
        Ok(EffectiveParams {
            kernel: NumericValidator::validate_kernel_size(kernel)?,
            blur: NumericValidator::validate_blur_size(blur)?,
        })
    }

    /// Count and log a terminal failure raised outside the orchestrator
    fn record_failure(&self, e: SegmentationError, request_id: &str) -> SegmentationError {
        self.metrics.increment_failure_count(e.kind().as_str());
        error!(
            request_id,
            kind = e.kind().as_str(),
            error = %e,
            "Cutout pipeline failed"
        );
        e
    }
}
