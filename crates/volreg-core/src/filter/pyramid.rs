use burn::tensor::backend::Backend;
use crate::image::Image;
use super::gaussian::GaussianFilter;
use super::downsample::DownsampleFilter;

/// Deepest pyramid a registration accepts. Past this every level of a
/// realistic volume collapses to a single voxel.
pub const MAX_PYRAMID_LEVELS: usize = 16;

/// Shrink factor and smoothing of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSchedule {
    /// Integer shrink factor applied on every axis.
    pub shrink_factor: usize,
    /// Gaussian sigma in voxels of the full-resolution image.
    pub sigma: f64,
}

/// Multi-resolution image pyramid.
///
/// Level 0 is the coarsest. Each level is the input smoothed with a Gaussian
/// of `0.5 * factor` voxels and then subsampled by `factor = 2^(levels - 1 - level)`.
pub struct MultiResolutionPyramid<B: Backend, const D: usize> {
    images: Vec<Image<B, D>>,
    schedule: Vec<LevelSchedule>,
}

impl<B: Backend, const D: usize> MultiResolutionPyramid<B, D> {
    /// Build every level of the pyramid for `input`.
    pub fn new(input: &Image<B, D>, levels: usize) -> Self {
        Self::with_schedule(input, Self::default_schedule(levels))
    }

    /// Build the pyramid from an explicit schedule, coarsest level first.
    pub fn with_schedule(input: &Image<B, D>, schedule: Vec<LevelSchedule>) -> Self {
        let images = schedule
            .iter()
            .map(|entry| Self::build_level(input, entry))
            .collect();
        Self { images, schedule }
    }

    fn build_level(input: &Image<B, D>, entry: &LevelSchedule) -> Image<B, D> {
        let smoothed = if entry.sigma > 1e-6 {
            let sigmas: Vec<f64> = (0..D).map(|axis| entry.sigma * input.spacing()[axis]).collect();
            GaussianFilter::new(sigmas).apply(input)
        } else {
            input.clone()
        };

        if entry.shrink_factor > 1 {
            DownsampleFilter::new(vec![entry.shrink_factor]).apply(&smoothed)
        } else {
            smoothed
        }
    }

    /// Image at `level`, or `None` past the finest level.
    pub fn get_level(&self, level: usize) -> Option<&Image<B, D>> {
        self.images.get(level)
    }

    pub fn schedule(&self) -> &[LevelSchedule] {
        &self.schedule
    }

    /// Number of levels.
    pub fn levels(&self) -> usize {
        self.images.len()
    }

    /// Power-of-two schedule, coarsest first.
    ///
    /// `levels = 3` gives factors `[4, 2, 1]` and sigmas `[2.0, 1.0, 0.5]`.
    pub fn default_schedule(levels: usize) -> Vec<LevelSchedule> {
        (0..levels)
            .map(|level| {
                let shift = u32::try_from(levels - 1 - level).unwrap_or(u32::MAX);
                let shrink_factor = 1usize.checked_shl(shift).unwrap_or(usize::MAX);
                LevelSchedule {
                    shrink_factor,
                    sigma: 0.5 * shrink_factor as f64,
                }
            })
            .collect()
    }
}
