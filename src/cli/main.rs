//! Garment cutout CLI
//!
//! Reads one image, runs the full pipeline and writes the RGBA cutout and
//! optionally the binary mask as PNG files.

use super::config::CliConfigBuilder;
use crate::{
    processor::{GarmentCutoutProcessor, RequestOptions},
    tracing_config::{init_cli_tracing, TracingFormat},
    types::CutoutMetadata,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Garment segmentation and cutout tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "garment-cutout")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input JPEG or PNG image
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Cutout PNG path [default: <input stem>_cutout.png]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Also write the binary mask PNG to this path
    #[arg(long, value_name = "PATH")]
    pub mask: Option<PathBuf>,

    /// Engine preference (auto, u2netp, grabcut)
    #[arg(short, long, default_value = "auto")]
    pub engine: String,

    /// Inference backend for the primary engine (onnx, tract)
    #[arg(short, long, default_value = "onnx")]
    pub backend: String,

    /// Primary model weights [default: ~/.u2net/u2netp.onnx]
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Inference threads (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Morphological kernel size (odd, 1-7)
    #[arg(long, default_value_t = 3)]
    pub morph_kernel: u32,

    /// Median blur size (0 or odd, up to 9)
    #[arg(long, default_value_t = 5)]
    pub median_blur: u32,

    /// Maximum long edge before segmentation
    #[arg(long, default_value_t = crate::config::DEFAULT_MAX_EDGE)]
    pub max_edge: u32,

    /// Gamma correction applied before segmentation
    #[arg(long, default_value_t = 1.2)]
    pub gamma: f32,

    /// Primary engine budget in milliseconds
    #[arg(long, default_value_t = crate::config::DEFAULT_ENGINE_TIMEOUT_MS)]
    pub primary_timeout_ms: u64,

    /// Fallback engine budget in milliseconds
    #[arg(long, default_value_t = crate::config::DEFAULT_ENGINE_TIMEOUT_MS)]
    pub fallback_timeout_ms: u64,

    /// Skip the primary engine
    #[arg(long)]
    pub force_fallback: bool,

    /// Erode the colour-sampling mask by one kernel
    #[arg(long)]
    pub erode_before_color: bool,

    /// Print result metadata as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Console)]
    pub log_format: LogFormat,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum LogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<LogFormat> for TracingFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Console => Self::Console,
            LogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            LogFormat::Json => Self::Json,
        }
    }
}

/// Default cutout path next to the input
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "output".into(), |s| s.to_string_lossy().into_owned());
    input.with_file_name(format!("{stem}_cutout.png"))
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.verbose, cli.log_format.into())
        .context("Failed to initialize tracing")?;

    let json = cli.json;
    let metadata = run(cli).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&metadata).context("Failed to serialize metadata")?
        );
    }
    Ok(())
}

/// Run the pipeline for one CLI invocation
///
/// # Errors
/// Configuration, file I/O and segmentation failures, with context.
pub async fn run(cli: Cli) -> Result<CutoutMetadata> {
    let config = CliConfigBuilder::from_cli(&cli)?;
    debug!(?config, "Configuration resolved");

    let processor = GarmentCutoutProcessor::new(config).context("Failed to create processor")?;

    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("Failed to read input file: {}", cli.input.display()))?;

    let result = processor
        .process_bytes(&bytes, RequestOptions::new())
        .await
        .map_err(|e| {
            let message = e.user_message();
            anyhow::Error::new(e).context(message)
        })?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));
    result
        .save_png(&output)
        .with_context(|| format!("Failed to write cutout: {}", output.display()))?;

    if let Some(mask_path) = &cli.mask {
        result
            .save_mask_png(mask_path)
            .with_context(|| format!("Failed to write mask: {}", mask_path.display()))?;
    }

    info!(
        input = %cli.input.display(),
        output = %output.display(),
        engine = %result.metadata.engine_name,
        fallback_triggered = result.metadata.fallback_triggered,
        duration_ms = result.metadata.duration_ms,
        "Cutout written"
    );

    Ok(result.metadata)
}
