//! Linear interpolation implementation.
//!
//! Tensor interpolation covers 1D, 2D and 3D data. Host-side trilinear
//! sampling over `[Z, Y, X]` slices backs the per-sample metric code.

use burn::tensor::{Tensor, Int};
use burn::tensor::backend::Backend;
use serde::{Serialize, Deserialize};
use crate::spatial::Point;
use super::trait_::Interpolator;

/// Linear Interpolator.
///
/// Performs linear interpolation (bilinear for 2D, trilinear for 3D). Indices
/// beyond the grid are clamped to the nearest edge voxel; callers that need a
/// default value outside the grid mask the result themselves.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    /// Create a new linear interpolator.
    pub fn new() -> Self {
        Self
    }

    /// Trilinear sample of host values laid out `[Z, Y, X]`.
    ///
    /// Returns `None` when `index` lies more than half a voxel outside the grid.
    pub fn sample_3d(values: &[f32], size: [usize; 3], index: &Point<3>) -> Option<f64> {
        let extents = [size[2], size[1], size[0]];
        for axis in 0..3 {
            let upper = extents[axis] as f64 - 0.5;
            if !(index[axis] >= -0.5 && index[axis] <= upper) {
                return None;
            }
        }
        Some(Self::sample_3d_clamped(values, size, index))
    }

    /// Trilinear sample with the index clamped into the grid.
    pub fn sample_3d_clamped(values: &[f32], size: [usize; 3], index: &Point<3>) -> f64 {
        let extents = [size[2], size[1], size[0]];
        let mut lower = [0usize; 3];
        let mut upper = [0usize; 3];
        let mut weight = [0.0f64; 3];

        for axis in 0..3 {
            let max = extents[axis].saturating_sub(1) as f64;
            let c = index[axis].clamp(0.0, max);
            let floor = c.floor();
            lower[axis] = floor as usize;
            upper[axis] = (lower[axis] + 1).min(extents[axis].saturating_sub(1));
            weight[axis] = c - floor;
        }

        let at = |x: usize, y: usize, z: usize| values[(z * size[1] + y) * size[2] + x] as f64;

        let mut result = 0.0;
        for corner in 0..8 {
            let pick = [corner & 1 != 0, corner & 2 != 0, corner & 4 != 0];
            let mut w = 1.0;
            let mut idx = [0usize; 3];
            for axis in 0..3 {
                if pick[axis] {
                    w *= weight[axis];
                    idx[axis] = upper[axis];
                } else {
                    w *= 1.0 - weight[axis];
                    idx[axis] = lower[axis];
                }
            }
            if w != 0.0 {
                result += w * at(idx[0], idx[1], idx[2]);
            }
        }
        result
    }

    fn interpolate_3d<B: Backend, const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let dims = data.dims();
        let (nz, ny, nx) = (dims[0], dims[1], dims[2]);

        // indices: [Batch, 3] -> (x, y, z)
        let coords = [
            indices.clone().narrow(1, 0, 1).squeeze::<1>(1),
            indices.clone().narrow(1, 1, 1).squeeze::<1>(1),
            indices.narrow(1, 2, 1).squeeze::<1>(1),
        ];
        let extents = [nx, ny, nz];

        let mut lower: Vec<Tensor<B, 1, Int>> = Vec::with_capacity(3);
        let mut upper: Vec<Tensor<B, 1, Int>> = Vec::with_capacity(3);
        let mut weights: Vec<Tensor<B, 1>> = Vec::with_capacity(3);
        for (coord, extent) in coords.into_iter().zip(extents) {
            let max = (extent - 1) as f64;
            let floor = coord.clone().floor();
            weights.push(coord - floor.clone());
            upper.push((floor.clone() + 1.0).clamp(0.0, max).int());
            lower.push(floor.clamp(0.0, max).int());
        }

        let flat = data.clone().reshape([nz * ny * nx]);
        let stride_y = nx as i32;
        let stride_z = (ny * nx) as i32;

        let gather = |xi: &Tensor<B, 1, Int>, yi: &Tensor<B, 1, Int>, zi: &Tensor<B, 1, Int>| {
            let idx = zi.clone() * stride_z + yi.clone() * stride_y + xi.clone();
            flat.clone().gather(0, idx)
        };

        let v000 = gather(&lower[0], &lower[1], &lower[2]);
        let v100 = gather(&upper[0], &lower[1], &lower[2]);
        let v010 = gather(&lower[0], &upper[1], &lower[2]);
        let v110 = gather(&upper[0], &upper[1], &lower[2]);
        let v001 = gather(&lower[0], &lower[1], &upper[2]);
        let v101 = gather(&upper[0], &lower[1], &upper[2]);
        let v011 = gather(&lower[0], &upper[1], &upper[2]);
        let v111 = gather(&upper[0], &upper[1], &upper[2]);

        let lerp = |a: Tensor<B, 1>, b: Tensor<B, 1>, w: &Tensor<B, 1>| a.clone() + (b - a) * w.clone();

        let c00 = lerp(v000, v100, &weights[0]);
        let c10 = lerp(v010, v110, &weights[0]);
        let c01 = lerp(v001, v101, &weights[0]);
        let c11 = lerp(v011, v111, &weights[0]);

        let c0 = lerp(c00, c10, &weights[1]);
        let c1 = lerp(c01, c11, &weights[1]);

        lerp(c0, c1, &weights[2])
    }

    fn interpolate_2d<B: Backend, const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let dims = data.dims();
        let (ny, nx) = (dims[0], dims[1]);

        let x = indices.clone().narrow(1, 0, 1).squeeze::<1>(1);
        let y = indices.narrow(1, 1, 1).squeeze::<1>(1);

        let x0 = x.clone().floor();
        let y0 = y.clone().floor();
        let wx = x - x0.clone();
        let wy = y - y0.clone();

        let x1_i = (x0.clone() + 1.0).clamp(0.0, (nx - 1) as f64).int();
        let y1_i = (y0.clone() + 1.0).clamp(0.0, (ny - 1) as f64).int();
        let x0_i = x0.clamp(0.0, (nx - 1) as f64).int();
        let y0_i = y0.clamp(0.0, (ny - 1) as f64).int();

        let flat = data.clone().reshape([ny * nx]);
        let stride_y = nx as i32;
        let gather = |xi: &Tensor<B, 1, Int>, yi: &Tensor<B, 1, Int>| {
            flat.clone().gather(0, yi.clone() * stride_y + xi.clone())
        };

        let v00 = gather(&x0_i, &y0_i);
        let v10 = gather(&x1_i, &y0_i);
        let v01 = gather(&x0_i, &y1_i);
        let v11 = gather(&x1_i, &y1_i);

        let c0 = v00.clone() + (v10 - v00) * wx.clone();
        let c1 = v01.clone() + (v11 - v01) * wx;
        c0.clone() + (c1 - c0) * wy
    }

    fn interpolate_1d<B: Backend, const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let n = data.dims()[0];
        let x = indices.squeeze::<1>(1);
        let x0 = x.clone().floor();
        let wx = x - x0.clone();

        let x1_i = (x0.clone() + 1.0).clamp(0.0, (n - 1) as f64).int();
        let x0_i = x0.clamp(0.0, (n - 1) as f64).int();

        let flat = data.clone().reshape([n]);
        let v0 = flat.clone().gather(0, x0_i);
        let v1 = flat.gather(0, x1_i);
        v0.clone() + (v1 - v0) * wx
    }
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        match D {
            3 => self.interpolate_3d(data, indices),
            2 => self.interpolate_2d(data, indices),
            1 => self.interpolate_1d(data, indices),
            _ => panic!("LinearInterpolator supports 1D, 2D and 3D tensors, got {}D", D),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use burn::tensor::{TensorData, Shape};

    type TestBackend = NdArray<f32>;

    // [Z=2, Y=2, X=2] with value = 100 z + 10 y + x
    fn corner_values() -> Vec<f32> {
        vec![0.0, 1.0, 10.0, 11.0, 100.0, 101.0, 110.0, 111.0]
    }

    #[test]
    fn test_linear_interpolator_3d_axes() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(corner_values(), Shape::new([2, 2, 2])),
            &device,
        );

        let indices = Tensor::<TestBackend, 2>::from_floats(
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.5, 0.5, 0.5]],
            &device,
        );
        let result = LinearInterpolator::new()
            .interpolate(&data, indices)
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        assert_eq!(result[0], 0.0);
        assert_eq!(result[1], 1.0);
        assert_eq!(result[2], 10.0);
        assert_eq!(result[3], 100.0);
        assert!((result[4] - 55.5).abs() < 1e-4, "got {}", result[4]);
    }

    #[test]
    fn test_linear_interpolator_clamps_at_edges() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.0f32, 1.0, 2.0, 3.0], Shape::new([2, 2])),
            &device,
        );

        let indices = Tensor::<TestBackend, 2>::from_floats([[-1.0, -1.0], [5.0, 5.0], [0.5, 0.5]], &device);
        let result = LinearInterpolator::new()
            .interpolate(&data, indices)
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        assert_eq!(result[0], 0.0);
        assert_eq!(result[1], 3.0);
        assert!((result[2] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_linear_interpolator_1d() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 1>::from_data(
            TensorData::new(vec![0.0f32, 10.0, 20.0, 30.0], Shape::new([4])),
            &device,
        );

        let indices = Tensor::<TestBackend, 2>::from_floats([[0.5], [2.25]], &device);
        let result = LinearInterpolator::new()
            .interpolate(&data, indices)
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        assert!((result[0] - 5.0).abs() < 1e-5);
        assert!((result[1] - 22.5).abs() < 1e-5);
    }

    #[test]
    fn test_host_sample_matches_tensor() {
        let device = Default::default();
        let values = corner_values();
        let data = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(values.clone(), Shape::new([2, 2, 2])),
            &device,
        );
        let point = Point::new([0.25, 0.75, 0.4]);
        let tensor = LinearInterpolator::new()
            .interpolate(&data, Tensor::<TestBackend, 2>::from_floats([[0.25, 0.75, 0.4]], &device))
            .into_data()
            .to_vec::<f32>()
            .unwrap()[0];

        let host = LinearInterpolator::sample_3d(&values, [2, 2, 2], &point).unwrap();
        assert!((host - tensor as f64).abs() < 1e-4);
        assert!((host - (40.0 + 7.5 + 0.25)).abs() < 1e-9);
    }

    #[test]
    fn test_host_sample_outside_is_none() {
        let values = corner_values();
        assert!(LinearInterpolator::sample_3d(&values, [2, 2, 2], &Point::new([-0.6, 0.0, 0.0])).is_none());
        assert!(LinearInterpolator::sample_3d(&values, [2, 2, 2], &Point::new([0.0, 0.0, 1.6])).is_none());

        let edge = LinearInterpolator::sample_3d(&values, [2, 2, 2], &Point::new([1.5, 0.0, 0.0])).unwrap();
        assert_eq!(edge, 1.0);
        let clamped = LinearInterpolator::sample_3d_clamped(&values, [2, 2, 2], &Point::new([9.0, 9.0, 9.0]));
        assert_eq!(clamped, 111.0);
    }
}
