use burn::tensor::{Tensor, Int};
use burn::tensor::backend::Backend;
use crate::image::Image;

/// Downsample filter.
///
/// Keeps every Nth voxel along each axis, starting at index 0, so the origin
/// is unchanged and the spacing grows by the factor. Factors are given per
/// spatial axis `(x, y, z)`; a single entry applies to every axis.
pub struct DownsampleFilter<B: Backend> {
    factors: Vec<usize>,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> DownsampleFilter<B> {
    pub fn new(factors: Vec<usize>) -> Self {
        Self {
            factors,
            _b: std::marker::PhantomData,
        }
    }

    fn factor(&self, axis: usize) -> usize {
        self.factors.get(axis).or(self.factors.first()).copied().unwrap_or(1)
    }

    /// Apply the filter to an image.
    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        let mut data = image.data().clone();
        let device = data.device();
        let dims = data.dims();
        let mut spacing = *image.spacing();

        for dim in 0..D {
            let axis = D - 1 - dim;
            let factor = self.factor(axis);
            if factor <= 1 {
                continue;
            }

            // 10 voxels at factor 2 keep 0, 2, 4, 6, 8
            let kept: Vec<i32> = (0..dims[dim]).step_by(factor).map(|i| i as i32).collect();
            let indices = Tensor::<B, 1, Int>::from_ints(kept.as_slice(), &device);
            data = data.select(dim, indices);

            spacing[axis] *= factor as f64;
        }

        Image::new(data, *image.origin(), spacing, *image.direction())
    }
}
