use burn::tensor::backend::Backend;
use tracing::debug;
use crate::error::{ImageError, Result};
use crate::image::Image;

/// Voxel-wise mean of images that share one grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageImageFilter;

impl AverageImageFilter {
    pub fn new() -> Self {
        Self
    }

    /// Average `images`, keeping the geometry of the first.
    ///
    /// Every geometry is checked before any voxel arithmetic runs.
    pub fn apply<B: Backend, const D: usize>(&self, images: &[Image<B, D>]) -> Result<Image<B, D>> {
        let (first, rest) = images
            .split_first()
            .ok_or_else(|| ImageError::empty_input("averaging needs at least one image"))?;

        let reference = first.geometry();
        for (i, image) in rest.iter().enumerate() {
            reference.ensure_matches(&image.geometry()).map_err(|e| {
                ImageError::geometry_mismatch(format!("image {} vs image 0: {}", i + 1, e))
            })?;
        }

        debug!(count = images.len(), shape = ?reference.size(), "averaging images");
        let sum = rest
            .iter()
            .fold(first.data().clone(), |acc, image| acc + image.data().clone());
        Ok(first.with_data(sum.mul_scalar(1.0 / images.len() as f64)))
    }
}
