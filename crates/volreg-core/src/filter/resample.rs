//! Resample image filter.
//!
//! Resamples an image onto a new grid through a transform and an
//! interpolator.

use std::marker::PhantomData;
use burn::tensor::{Tensor, Shape};
use burn::tensor::backend::Backend;
use crate::image::{Image, ImageGeometry, generate_grid};
use crate::transform::trait_::Transform;
use crate::interpolation::trait_::Interpolator;

/// Resample image filter.
///
/// The transform maps output physical points to input physical points, the
/// inverse direction of the registration (fixed to moving) mapping. Output
/// voxels whose mapped index falls more than half a voxel outside the input
/// grid take the default pixel value.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `T` - The transform type
/// * `I` - The interpolator type
/// * `D` - The dimensionality
pub struct ResampleImageFilter<B, T, I, const D: usize>
where
    B: Backend,
    T: Transform<B, D>,
    I: Interpolator<B>,
{
    geometry: ImageGeometry<D>,
    transform: T,
    interpolator: I,
    default_pixel_value: f64,
    _phantom: PhantomData<B>,
}

impl<B, T, I, const D: usize> ResampleImageFilter<B, T, I, D>
where
    B: Backend,
    T: Transform<B, D>,
    I: Interpolator<B>,
{
    /// Resample onto an explicit output grid.
    pub fn new(geometry: ImageGeometry<D>, transform: T, interpolator: I) -> Self {
        Self {
            geometry,
            transform,
            interpolator,
            default_pixel_value: 0.0,
            _phantom: PhantomData,
        }
    }

    /// Resample onto the grid of a reference image.
    pub fn new_from_reference(reference: &Image<B, D>, transform: T, interpolator: I) -> Self {
        Self::new(reference.geometry(), transform, interpolator)
    }

    /// Set the value used outside the input field of view.
    pub fn with_default_pixel_value(mut self, value: f64) -> Self {
        self.default_pixel_value = value;
        self
    }

    /// Apply filter to an input image.
    pub fn apply(&self, input: &Image<B, D>) -> Image<B, D> {
        let device = input.device();
        let size = self.geometry.size();

        let output_indices = generate_grid::<B, D>(size, &device);
        let output_points = self.geometry.index_to_world_tensor(output_indices);
        let input_points = self.transform.transform_points(output_points);
        let input_indices = input.world_to_index_tensor(input_points);

        let inside = Self::inside_mask(&input.geometry(), &input_indices, &device);
        let sampled = self.interpolator.interpolate(input.data(), input_indices);

        let values = if self.default_pixel_value == 0.0 {
            sampled * inside
        } else {
            let outside = inside.clone().neg().add_scalar(1.0);
            sampled * inside + outside.mul_scalar(self.default_pixel_value)
        };

        Image::new(
            values.reshape(Shape::new(size)),
            *self.geometry.origin(),
            *self.geometry.spacing(),
            *self.geometry.direction(),
        )
    }

    /// 1 where every index coordinate is within `[-0.5, extent - 0.5]`, else 0.
    fn inside_mask(geometry: &ImageGeometry<D>, indices: &Tensor<B, 2>, device: &B::Device) -> Tensor<B, 1> {
        let count = indices.dims()[0];
        let mut mask = Tensor::<B, 1>::ones([count], device);
        for axis in 0..D {
            let upper = geometry.extent(axis) as f64 - 0.5;
            let column = indices.clone().narrow(1, axis, 1).squeeze::<1>(1);
            let above = column.clone().greater_equal_elem(-0.5).float();
            let below = column.lower_equal_elem(upper).float();
            mask = mask * above * below;
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use crate::interpolation::LinearInterpolator;
    use crate::spatial::{Point, Spacing, Direction, Vector};
    use crate::transform::{AffineTransform, IdentityTransform};

    type TestBackend = NdArray<f32>;

    fn ramp(device: &<TestBackend as Backend>::Device) -> Image<TestBackend, 3> {
        // value = x + 2y + 3z on a [4, 5, 6] grid with spacing (1, 1, 2)
        let geometry = ImageGeometry::new(
            [4, 5, 6],
            Point::new([0.0, 0.0, 0.0]),
            Spacing::new([1.0, 1.0, 2.0]),
            Direction::identity(),
        );
        let mut values = Vec::with_capacity(120);
        for z in 0..4 {
            for y in 0..5 {
                for x in 0..6 {
                    values.push((x + 2 * y + 3 * z) as f32);
                }
            }
        }
        Image::from_vec(values, &geometry, device).unwrap()
    }

    #[test]
    fn test_identity_resample_reproduces_input() {
        let device = Default::default();
        let image = ramp(&device);
        let filter = ResampleImageFilter::new_from_reference(&image, IdentityTransform::<3>, LinearInterpolator::new());
        let result = filter.apply(&image);
        assert_eq!(result.geometry(), image.geometry());
        for (a, b) in result.to_vec().unwrap().iter().zip(image.to_vec().unwrap()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_translation_shifts_ramp_and_fills_outside() {
        let device = Default::default();
        let image = ramp(&device);
        // Output x samples input at x + 1; z physical shift of 2 is one voxel.
        let shift = AffineTransform::translation_only(Vector::new([1.0, 0.0, 2.0]));
        let result = ResampleImageFilter::new_from_reference(&image, shift, LinearInterpolator::new())
            .with_default_pixel_value(-7.0)
            .apply(&image)
            .to_vec()
            .unwrap();

        // (x=0, y=1, z=0) reads input (1, 1, 1): 1 + 2 + 3
        assert!((result[6] - 6.0).abs() < 1e-4);
        // x=5 maps to x=6, beyond 5.5
        assert!((result[5] + 7.0).abs() < 1e-6);
        // z=3 maps to z=4, beyond 3.5
        assert!((result[3 * 30] + 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_half_voxel_shift_of_linear_ramp_is_exact() {
        let device = Default::default();
        let image = ramp(&device);
        let shift = AffineTransform::translation_only(Vector::new([0.5, 0.0, 0.0]));
        let result = ResampleImageFilter::new_from_reference(&image, shift, LinearInterpolator::new())
            .apply(&image)
            .to_vec()
            .unwrap();

        // Interior x in 0..5 reads a linear ramp at x + 0.5.
        for x in 0..5 {
            assert!((result[x] - (x as f32 + 0.5)).abs() < 1e-4, "x = {}", x);
        }
    }
}
