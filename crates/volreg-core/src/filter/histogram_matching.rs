//! Histogram matching intensity normalization.
//!
//! Source intensities are mapped through a piecewise-linear curve joining
//! matched quantile landmarks of the source and reference histograms.

use burn::config::Config;
use burn::tensor::backend::Backend;
use tracing::debug;
use crate::error::ImageError;
use crate::image::Image;

/// Histogram matching parameters.
#[derive(Config, Debug, PartialEq)]
pub struct HistogramMatchingConfig {
    /// Number of histogram bins.
    #[config(default = "1024")]
    pub histogram_levels: usize,
    /// Number of quantile landmarks between the lower bound and the maximum.
    #[config(default = "7")]
    pub match_points: usize,
    /// Exclude voxels below the mean (typically background) from the histogram.
    #[config(default = "true")]
    pub threshold_at_mean_intensity: bool,
}

/// Intensity landmarks of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityLandmarks {
    /// Smallest intensity in the image.
    pub min: f64,
    /// `[lower, q_1 .. q_n, max]`.
    pub points: Vec<f64>,
}

impl IntensityLandmarks {
    /// Compute landmarks from raw intensities.
    pub fn from_values(values: &[f32], config: &HistogramMatchingConfig) -> crate::error::Result<Self> {
        if values.is_empty() {
            return Err(ImageError::empty_input("histogram of an empty image"));
        }

        let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
        for &v in values {
            let v = v as f64;
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        let mean = sum / values.len() as f64;
        let lower = if config.threshold_at_mean_intensity { mean } else { min };

        let n = config.match_points;
        let range = max - lower;
        if range <= f64::EPSILON * max.abs().max(1.0) {
            return Ok(Self { min, points: vec![lower; n + 2] });
        }

        let levels = config.histogram_levels;
        let mut counts = vec![0u64; levels];
        let scale = levels as f64 / range;
        for &v in values {
            let v = v as f64;
            if v < lower {
                continue;
            }
            let bin = (((v - lower) * scale) as usize).min(levels - 1);
            counts[bin] += 1;
        }
        let total: u64 = counts.iter().sum();
        let width = range / levels as f64;

        let mut landmarks = Vec::with_capacity(n + 2);
        landmarks.push(lower);
        let mut bin = 0usize;
        let mut before = 0u64;
        for j in 1..=n {
            let target = total as f64 * j as f64 / (n + 1) as f64;
            while bin < levels - 1 && ((before + counts[bin]) as f64) < target {
                before += counts[bin];
                bin += 1;
            }
            let fraction = if counts[bin] == 0 {
                0.0
            } else {
                ((target - before as f64) / counts[bin] as f64).clamp(0.0, 1.0)
            };
            landmarks.push(lower + (bin as f64 + fraction) * width);
        }
        landmarks.push(max);
        Ok(Self { min, points: landmarks })
    }
}

/// Maps source intensities onto a reference intensity distribution.
#[derive(Debug, Clone)]
pub struct HistogramMatchingFilter {
    config: HistogramMatchingConfig,
}

impl HistogramMatchingFilter {
    pub fn new(config: HistogramMatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HistogramMatchingConfig {
        &self.config
    }

    /// Match `source` to `reference`. The result keeps the source geometry.
    pub fn apply<B: Backend, const D: usize>(&self, source: &Image<B, D>, reference: &Image<B, D>) -> crate::error::Result<Image<B, D>> {
        if self.config.histogram_levels == 0 {
            return Err(ImageError::invalid_argument("histogram_levels must be at least 1"));
        }

        let source_values = source.to_vec()?;
        let reference_values = reference.to_vec()?;
        let source_marks = IntensityLandmarks::from_values(&source_values, &self.config)?;
        let reference_marks = IntensityLandmarks::from_values(&reference_values, &self.config)?;
        debug!(source = ?source_marks.points, reference = ?reference_marks.points, "histogram landmarks");

        let mapped: Vec<f32> = source_values
            .iter()
            .map(|&v| map_intensity(v as f64, &source_marks, &reference_marks) as f32)
            .collect();

        Image::from_vec(mapped, &source.geometry(), &source.device())
    }
}

fn segment_slope(src: &[f64], dst: &[f64], j: usize) -> f64 {
    let width = src[j + 1] - src[j];
    if is_degenerate(width, src[j]) {
        0.0
    } else {
        (dst[j + 1] - dst[j]) / width
    }
}

fn is_degenerate(width: f64, at: f64) -> bool {
    width.abs() <= f64::EPSILON * at.abs().max(1.0)
}

/// Piecewise-linear landmark map.
///
/// Below the lower landmark the source minimum maps to the reference
/// minimum. Above the maximum the last segment is extrapolated.
pub(crate) fn map_intensity(value: f64, source: &IntensityLandmarks, reference: &IntensityLandmarks) -> f64 {
    let (src, dst) = (&source.points[..], &reference.points[..]);
    let last = src.len() - 1;
    if value < src[0] {
        let width = src[0] - source.min;
        if is_degenerate(width, src[0]) {
            return dst[0] + (value - src[0]) * segment_slope(src, dst, 0);
        }
        let lower_gradient = (dst[0] - reference.min) / width;
        return reference.min + (value - source.min) * lower_gradient;
    }
    if value >= src[last] {
        return dst[last] + (value - src[last]) * segment_slope(src, dst, last - 1);
    }
    for j in 0..last {
        if value < src[j + 1] {
            return dst[j] + (value - src[j]) * segment_slope(src, dst, j);
        }
    }
    dst[last]
}
