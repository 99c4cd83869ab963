//! Pure-Rust rectangle-initialized refinement used as the default fallback
//!
//! Starts from the shared `InitRect`. Each iteration refits quantized color
//! histograms for both classes, relabels the rectangle by data cost and then
//! smooths the labels with contrast-sensitive ICM sweeps. No randomness is
//! involved, so the output is a pure function of the input image.

use crate::{
    backends::{
        fallback::{InitRect, ITERATIONS},
        SegmentationEngine,
    },
    error::{Result, SegmentationError},
    types::{BgrImage, EngineKind, SegmentationMask},
};
use tracing::debug;

const ICM_SWEEPS: usize = 2;
const SMOOTHNESS: f64 = 50.0;
const LEVELS_PER_CHANNEL: usize = 16;
const BINS: usize = LEVELS_PER_CHANNEL * LEVELS_PER_CHANNEL * LEVELS_PER_CHANNEL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Background,
    Foreground,
    ProbableBackground,
    ProbableForeground,
}

impl Label {
    fn is_foreground(self) -> bool {
        matches!(self, Self::Foreground | Self::ProbableForeground)
    }

    fn is_fixed(self) -> bool {
        matches!(self, Self::Background | Self::Foreground)
    }
}

/// Negative log-likelihoods of each histogram bin, Laplace smoothed
struct ColorModel {
    cost: Vec<f64>,
}

impl ColorModel {
    #[allow(clippy::cast_precision_loss)]
    fn fit<'a>(bins: impl Iterator<Item = &'a u16>) -> Self {
        let mut counts = vec![0u32; BINS];
        let mut total = 0u64;
        for &bin in bins {
            counts[bin as usize] += 1;
            total += 1;
        }
        let denom = total as f64 + BINS as f64;
        let cost = counts
            .iter()
            .map(|&c| -((f64::from(c) + 1.0) / denom).ln())
            .collect();
        Self { cost }
    }
}

fn quantize(bgr: &[u8]) -> u16 {
    let level = |v: u8| u16::from(v >> 4);
    (level(bgr[0]) << 8) | (level(bgr[1]) << 4) | level(bgr[2])
}

fn squared_distance(a: &[u8], b: &[u8]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum()
}

/// Contrast-sensitive weights to the right and lower neighbors
struct Edges {
    right: Vec<f64>,
    down: Vec<f64>,
}

impl Edges {
    #[allow(clippy::cast_precision_loss)]
    fn new(image: &BgrImage) -> Self {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let raw = image.as_raw();
        let px = |x: usize, y: usize| &raw[(y * width + x) * 3..(y * width + x) * 3 + 3];

        let mut right = vec![0.0; width * height];
        let mut down = vec![0.0; width * height];
        let mut sum = 0.0;
        let mut pairs = 0usize;
        for y in 0..height {
            for x in 0..width {
                if x + 1 < width {
                    right[y * width + x] = squared_distance(px(x, y), px(x + 1, y));
                    sum += right[y * width + x];
                    pairs += 1;
                }
                if y + 1 < height {
                    down[y * width + x] = squared_distance(px(x, y), px(x, y + 1));
                    sum += down[y * width + x];
                    pairs += 1;
                }
            }
        }

        let beta = if pairs == 0 || sum <= 0.0 {
            0.0
        } else {
            1.0 / (2.0 * sum / pairs as f64)
        };
        for w in right.iter_mut().chain(down.iter_mut()) {
            *w = SMOOTHNESS * (-beta * *w).exp();
        }
        Self { right, down }
    }
}

/// Histogram and ICM fallback engine, used when OpenCV is not compiled in
#[derive(Debug, Clone, Copy, Default)]
pub struct RectRefineEngine;

impl RectRefineEngine {
    pub const NAME: &'static str = "rect-refine";

    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn run(image: &BgrImage) -> Result<SegmentationMask> {
        let (width, height) = image.dimensions();
        let rect = InitRect::for_image(width, height)?;
        let (w, h) = (width as usize, height as usize);
        let (rx, ry) = (rect.x as usize, rect.y as usize);
        let (x_end, y_end) = (rect.x_end() as usize, rect.y_end() as usize);

        let bins: Vec<u16> = image.as_raw().chunks_exact(3).map(quantize).collect();
        let edges = Edges::new(image);

        let mut labels = vec![Label::Background; w * h];
        for y in ry..y_end {
            for x in rx..x_end {
                labels[y * w + x] = Label::ProbableForeground;
            }
        }

        for iteration in 0..ITERATIONS {
            let fg = ColorModel::fit(
                bins.iter()
                    .zip(&labels)
                    .filter(|(_, l)| l.is_foreground())
                    .map(|(b, _)| b),
            );
            let bg = ColorModel::fit(
                bins.iter()
                    .zip(&labels)
                    .filter(|(_, l)| !l.is_foreground())
                    .map(|(b, _)| b),
            );

            for (label, &bin) in labels.iter_mut().zip(&bins) {
                if !label.is_fixed() {
                    *label = if fg.cost[bin as usize] <= bg.cost[bin as usize] {
                        Label::ProbableForeground
                    } else {
                        Label::ProbableBackground
                    };
                }
            }

            for _ in 0..ICM_SWEEPS {
                for y in ry..y_end {
                    for x in rx..x_end {
                        let idx = y * w + x;
                        if labels[idx].is_fixed() {
                            continue;
                        }
                        let mut neighbors: [(usize, f64); 4] = [(usize::MAX, 0.0); 4];
                        if x > 0 {
                            neighbors[0] = (idx - 1, edges.right[idx - 1]);
                        }
                        if x + 1 < w {
                            neighbors[1] = (idx + 1, edges.right[idx]);
                        }
                        if y > 0 {
                            neighbors[2] = (idx - w, edges.down[idx - w]);
                        }
                        if y + 1 < h {
                            neighbors[3] = (idx + w, edges.down[idx]);
                        }

                        let bin = bins[idx] as usize;
                        let mut e_fg = fg.cost[bin];
                        let mut e_bg = bg.cost[bin];
                        for &(n, weight) in neighbors.iter().filter(|(n, _)| *n != usize::MAX) {
                            if labels[n].is_foreground() {
                                e_bg += weight;
                            } else {
                                e_fg += weight;
                            }
                        }
                        labels[idx] = if e_fg <= e_bg {
                            Label::ProbableForeground
                        } else {
                            Label::ProbableBackground
                        };
                    }
                }
            }

            debug!(
                iteration,
                foreground = labels.iter().filter(|l| l.is_foreground()).count(),
                "Fallback refinement iteration"
            );
        }

        let data = labels
            .iter()
            .map(|l| if l.is_foreground() { 255 } else { 0 })
            .collect();
        SegmentationMask::from_raw(width, height, data)
            .ok_or_else(|| SegmentationError::internal("Label buffer length mismatch"))
    }
}

impl SegmentationEngine for RectRefineEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Fallback
    }

    fn segment(&self, image: &BgrImage) -> Result<SegmentationMask> {
        Self::run(image)
    }
}
