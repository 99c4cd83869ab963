//! Conversion of command line arguments into a validated configuration

use crate::cli::main_impl::Cli;
use crate::config::{BackendType, EnginePreference, SegmentationConfig};
use anyhow::{Context, Result};

/// Convert CLI arguments to a `SegmentationConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build a validated configuration from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<SegmentationConfig> {
        let engine: EnginePreference = cli.engine.parse().context("Invalid engine")?;
        let backend_type: BackendType = cli.backend.parse().context("Invalid backend")?;

        let mut builder = SegmentationConfig::builder()
            .engine(engine)
            .backend_type(backend_type)
            .intra_threads(cli.threads)
            .morph_kernel(cli.morph_kernel)
            .median_blur(cli.median_blur)
            .max_edge(cli.max_edge)
            .gamma(cli.gamma)
            .primary_timeout_ms(cli.primary_timeout_ms)
            .fallback_timeout_ms(cli.fallback_timeout_ms)
            .force_fallback(cli.force_fallback)
            .erode_before_color(cli.erode_before_color);

        if let Some(model) = &cli.model {
            builder = builder.model_path(model.clone());
        }

        builder.build().context("Invalid configuration")
    }
}
