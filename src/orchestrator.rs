//! Engine orchestration: primary attempt, quality gate, single fallback
//!
//! ```text
//! TryPrimary -> Validate -> Accept
//!                       \-> TryFallback -> ValidateFallback -> Accept | Fail
//! ```
//!
//! Any primary-stage anomaly (unavailable engine, engine failure, timeout or
//! an area ratio outside the accepted range) triggers the fallback exactly
//! once. Fallback problems are terminal.

use crate::{
    config::{EnginePreference, SegmentationConfig},
    error::{Result, SegmentationError},
    metrics::MetricsSink,
    postprocess::rebinarize,
    quality::QualityValidator,
    registry::EngineRegistry,
    types::{BgrImage, EngineKind, SegmentationMask, SegmentationResult},
    utils::generate_request_id,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

// Use instant crate for cross-platform time compatibility
use instant::Instant;

/// Timeout budgets and acceptance bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestrationPolicy {
    pub primary_timeout: Duration,
    pub fallback_timeout: Duration,
    pub quality: QualityValidator,
}

impl Default for OrchestrationPolicy {
    fn default() -> Self {
        Self::from_config(&SegmentationConfig::default())
    }
}

impl OrchestrationPolicy {
    #[must_use]
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self {
            primary_timeout: Duration::from_millis(config.primary_timeout_ms),
            fallback_timeout: Duration::from_millis(config.fallback_timeout_ms),
            quality: QualityValidator::new(config.min_mask_area_ratio, config.max_mask_area_ratio),
        }
    }

    fn budget(&self, kind: EngineKind) -> Duration {
        match kind {
            EngineKind::Primary => self.primary_timeout,
            EngineKind::Fallback => self.fallback_timeout,
        }
    }
}

/// Per-request identity, engine preference and cancellation
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub engine: EnginePreference,
    pub cancellation: CancellationToken,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Fresh request id, automatic engine selection, never cancelled
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: generate_request_id(),
            engine: EnginePreference::Auto,
            cancellation: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_request_id<S: Into<String>>(mut self, request_id: S) -> Self {
        self.request_id = request_id.into();
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: EnginePreference) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Fail with `Cancelled` when the request was cancelled
    ///
    /// # Errors
    /// `SegmentationError::Cancelled` naming the stage about to start.
    pub fn check_cancelled(&self, stage: &str) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(SegmentationError::cancelled(stage));
        }
        Ok(())
    }
}

/// One successful engine call
struct Attempt {
    engine_name: String,
    mask: SegmentationMask,
    ratio: f64,
}

fn stage_name(kind: EngineKind) -> &'static str {
    match kind {
        EngineKind::Primary => "primary",
        EngineKind::Fallback => "fallback",
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Sequences the engines for one request and reports metrics
pub struct Orchestrator {
    registry: Arc<EngineRegistry>,
    metrics: Arc<dyn MetricsSink>,
    policy: OrchestrationPolicy,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        registry: Arc<EngineRegistry>,
        metrics: Arc<dyn MetricsSink>,
        policy: OrchestrationPolicy,
    ) -> Self {
        Self {
            registry,
            metrics,
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &OrchestrationPolicy {
        &self.policy
    }

    /// Segment `image`, falling back once when the primary attempt is unusable
    ///
    /// # Errors
    /// - `QualityBelowThreshold` when the fallback mask is out of range
    /// - `EngineFailure`, `EngineUnavailable` or `Timeout` from the fallback
    /// - `Cancelled` when the request is cancelled at a stage boundary
    #[instrument(skip_all, fields(request_id = %ctx.request_id, engine = %ctx.engine))]
    pub async fn segment(
        &self,
        image: Arc<BgrImage>,
        ctx: &RequestContext,
    ) -> Result<SegmentationResult> {
        let start = Instant::now();
        match self.run(&image, ctx, start).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.metrics.increment_failure_count(e.kind().as_str());
                error!(
                    request_id = %ctx.request_id,
                    kind = e.kind().as_str(),
                    error = %e,
                    "Segmentation failed"
                );
                Err(e)
            },
        }
    }

    async fn run(
        &self,
        image: &Arc<BgrImage>,
        ctx: &RequestContext,
        start: Instant,
    ) -> Result<SegmentationResult> {
        let mut fallback_triggered = false;

        if ctx.engine.skips_primary() {
            info!(request_id = %ctx.request_id, "Primary engine skipped, using fallback directly");
        } else {
            ctx.check_cancelled("primary")?;
            match self.attempt(EngineKind::Primary, image).await {
                Ok(attempt) if self.policy.quality.accepts(attempt.ratio) => {
                    return Ok(self.accept(attempt, EngineKind::Primary, false, start, ctx));
                },
                Ok(attempt) => warn!(
                    request_id = %ctx.request_id,
                    ratio = attempt.ratio,
                    min = self.policy.quality.min_ratio(),
                    max = self.policy.quality.max_ratio(),
                    "Primary mask outside accepted area ratio, falling back"
                ),
                Err(e) => warn!(
                    request_id = %ctx.request_id,
                    kind = e.kind().as_str(),
                    error = %e,
                    "Primary engine attempt failed, falling back"
                ),
            }
            fallback_triggered = true;
            self.metrics.increment_fallback_count();
        }

        ctx.check_cancelled("fallback")?;
        let attempt = self.attempt(EngineKind::Fallback, image).await?;
        if !self.policy.quality.accepts(attempt.ratio) {
            return Err(SegmentationError::QualityBelowThreshold {
                ratio: attempt.ratio,
                min: self.policy.quality.min_ratio(),
                max: self.policy.quality.max_ratio(),
            });
        }
        Ok(self.accept(attempt, EngineKind::Fallback, fallback_triggered, start, ctx))
    }

    fn accept(
        &self,
        attempt: Attempt,
        engine_used: EngineKind,
        fallback_triggered: bool,
        start: Instant,
        ctx: &RequestContext,
    ) -> SegmentationResult {
        self.metrics.increment_engine_count(&attempt.engine_name);
        self.metrics.record_mask_ratio(attempt.ratio);

        let duration_ms = elapsed_ms(start);
        info!(
            request_id = %ctx.request_id,
            engine = %attempt.engine_name,
            engine_used = %engine_used,
            fallback_triggered,
            ratio = attempt.ratio,
            duration_ms,
            "Mask accepted"
        );

        SegmentationResult {
            mask: attempt.mask,
            engine_used,
            engine_name: attempt.engine_name,
            fallback_triggered,
            area_ratio: attempt.ratio,
            duration_ms,
        }
    }

    /// Resolve the engine handle without blocking the async runtime on
    /// first construction
    async fn acquire(&self, kind: EngineKind) -> Result<Arc<dyn crate::backends::SegmentationEngine>> {
        if self.registry.is_constructed(kind) {
            return self.registry.engine(kind);
        }
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || registry.engine(kind))
            .await
            .map_err(|e| SegmentationError::internal(format!("Engine construction task failed: {e}")))?
    }

    /// One engine call on the blocking pool under the stage budget
    #[instrument(skip_all, fields(stage = stage_name(kind)))]
    async fn attempt(&self, kind: EngineKind, image: &Arc<BgrImage>) -> Result<Attempt> {
        let stage = stage_name(kind);
        let budget = self.policy.budget(kind);
        let engine = self.acquire(kind).await?;
        let engine_name = engine.name().to_string();

        let started = Instant::now();
        let worker_image = Arc::clone(image);
        let handle = tokio::task::spawn_blocking(move || engine.segment(&worker_image));
        let outcome = tokio::time::timeout(budget, handle).await;
        let duration_ms = elapsed_ms(started);
        self.metrics.record_timing(stage, duration_ms);

        #[allow(clippy::cast_possible_truncation)]
        let mut mask = match outcome {
            Err(_) => return Err(SegmentationError::timeout(stage, budget.as_millis() as u64)),
            Ok(Err(join_error)) => {
                return Err(SegmentationError::engine_failure(format!(
                    "{engine_name} worker terminated abnormally: {join_error}"
                )))
            },
            Ok(Ok(result)) => result?,
        };

        if !mask.is_well_formed() {
            return Err(SegmentationError::engine_failure(format!(
                "{} returned {} mask samples for {}x{}",
                engine_name,
                mask.data.len(),
                mask.width(),
                mask.height()
            )));
        }
        if mask.dimensions != image.dimensions() {
            return Err(SegmentationError::engine_failure(format!(
                "{} returned a {}x{} mask for a {}x{} image",
                engine_name,
                mask.width(),
                mask.height(),
                image.width(),
                image.height()
            )));
        }
        if !mask.is_binary() {
            debug!(engine = %engine_name, "Engine mask was not binary, rebinarizing");
            rebinarize(&mut mask);
        }

        let ratio = self.policy.quality.area_ratio(&mask);
        debug!(stage, engine = %engine_name, ratio, duration_ms, "Engine attempt finished");
        Ok(Attempt {
            engine_name,
            mask,
            ratio,
        })
    }
}
