use burn::tensor::{Tensor, Shape};
use burn::tensor::backend::Backend;
use burn::tensor::ops::ConvOptions;
use crate::image::Image;
use crate::spatial::Spacing;

/// Default cap on the kernel width (radius * 2 + 1).
pub const DEFAULT_MAX_KERNEL_WIDTH: usize = 32;

/// Gaussian smoothing filter.
///
/// Separable 1D convolutions along each axis. Sigmas are given per spatial
/// axis `(x, y, z)` in physical units and converted to voxels with the
/// spacing of that axis. Borders replicate the edge voxel so constant images
/// stay constant.
pub struct GaussianFilter<B: Backend> {
    sigmas: Vec<f64>,
    max_kernel_width: usize,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> GaussianFilter<B> {
    /// Create a filter with one sigma per spatial axis. A single entry applies
    /// to every axis.
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            max_kernel_width: DEFAULT_MAX_KERNEL_WIDTH,
            _b: std::marker::PhantomData,
        }
    }

    /// Set the maximum kernel width (radius * 2 + 1).
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(1);
        self
    }

    /// Apply the filter to an image.
    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        image.with_data(self.apply_tensor(image.data().clone(), image.spacing()))
    }

    /// Apply the filter to a tensor laid out in tensor order.
    ///
    /// Pass `Spacing::uniform(1.0)` to interpret the sigmas in voxels.
    pub fn apply_tensor<const D: usize>(&self, input: Tensor<B, D>, spacing: &Spacing<D>) -> Tensor<B, D> {
        let mut data = input;
        let device = data.device();

        for dim in 0..D {
            let axis = D - 1 - dim;
            let sigma = self.sigmas.get(axis).or(self.sigmas.first()).copied().unwrap_or(0.0);
            if sigma <= 1e-6 || data.dims()[dim] < 2 {
                continue;
            }

            let voxel_sigma = sigma / spacing[axis];
            let radius = (3.0 * voxel_sigma).ceil() as usize;
            let width = radius.saturating_mul(2).saturating_add(1).min(self.max_kernel_width);
            let radius = (width - 1) / 2;
            if radius == 0 {
                continue;
            }

            let kernel = gaussian_kernel(voxel_sigma, radius);
            let kernel = Tensor::<B, 1>::from_floats(kernel.as_slice(), &device);
            data = convolve_along(data, kernel, dim, radius);
        }
        data
    }
}

/// Normalized sampled Gaussian of the given radius.
pub(crate) fn gaussian_kernel(sigma: f64, radius: usize) -> Vec<f32> {
    let two_sigma2 = 2.0 * sigma * sigma;
    let raw: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma2).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| (v / sum) as f32).collect()
}

fn convolve_along<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    kernel: Tensor<B, 1>,
    dim: usize,
    radius: usize,
) -> Tensor<B, D> {
    let dims = input.dims();

    // Move the target dimension last and fold the rest into the batch.
    let mut permutation = [0isize; D];
    let mut next = 0;
    for i in (0..D).filter(|&i| i != dim) {
        permutation[next] = i as isize;
        next += 1;
    }
    permutation[D - 1] = dim as isize;

    let length = dims[dim];
    let batch: usize = (0..D).filter(|&i| i != dim).map(|i| dims[i]).product();
    let rows = input.permute(permutation).reshape([batch, 1, length]);

    // Replicate the edge voxels so the conv needs no zero padding.
    let first = rows.clone().narrow(2, 0, 1);
    let last = rows.clone().narrow(2, length - 1, 1);
    let mut pieces = vec![first; radius];
    pieces.push(rows);
    pieces.extend(std::iter::repeat(last).take(radius));
    let padded = Tensor::cat(pieces, 2);

    let kernel_size = kernel.dims()[0];
    let kernel = kernel.reshape([1, 1, kernel_size]);
    let options = ConvOptions::new([1], [0], [1], 1);
    let smoothed = burn::tensor::module::conv1d(padded, kernel, None, options);

    let mut permuted_shape = [0usize; D];
    for (slot, &source) in permutation.iter().enumerate() {
        permuted_shape[slot] = dims[source as usize];
    }
    let mut inverse = [0isize; D];
    for (slot, &source) in permutation.iter().enumerate() {
        inverse[source as usize] = slot as isize;
    }

    smoothed.reshape(Shape::new(permuted_shape)).permute(inverse)
}
