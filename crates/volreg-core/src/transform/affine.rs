//! Affine transform implementation.

use burn::tensor::{Tensor, TensorData, Shape};
use burn::tensor::backend::Backend;
use nalgebra::SMatrix;
use crate::error::{ImageError, Result};
use crate::spatial::{Point, Vector};
use super::trait_::{Transform, ParametricTransform};

/// Affine Transform (Linear transformation + Translation).
///
/// Represents a general affine transformation with a fixed center:
/// T(x) = A(x - c) + c + t
///
/// where:
/// * A is a D×D matrix (rotation, scale, shear)
/// * t is a D-dimensional translation vector
/// * c is a fixed center of rotation/scaling, not a parameter
///
/// Parameters are the entries of A in row-major order followed by t.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform<const D: usize> {
    matrix: SMatrix<f64, D, D>,
    translation: Vector<D>,
    center: Point<D>,
}

impl<const D: usize> AffineTransform<D> {
    pub fn new(matrix: SMatrix<f64, D, D>, translation: Vector<D>, center: Point<D>) -> Self {
        Self { matrix, translation, center }
    }

    /// Identity about the given center.
    pub fn identity(center: Point<D>) -> Self {
        Self::new(SMatrix::identity(), Vector::zeros(), center)
    }

    /// Pure translation.
    pub fn translation_only(translation: Vector<D>) -> Self {
        Self::new(SMatrix::identity(), translation, Point::origin())
    }

    pub fn matrix(&self) -> &SMatrix<f64, D, D> {
        &self.matrix
    }

    pub fn translation(&self) -> &Vector<D> {
        &self.translation
    }

    pub fn center(&self) -> &Point<D> {
        &self.center
    }

    /// Same mapping expressed about a different center.
    pub fn with_center(&self, center: Point<D>) -> Self {
        // A(x - c) + c + t = A(x - c') + c' + t' with t' = t + (I - A)(c - c')
        let shift = (self.center - center).0;
        let correction = shift - self.matrix * shift;
        Self::new(self.matrix, Vector(self.translation.0 + correction), center)
    }

    /// Inverse mapping about the same center, or `None` when A is singular.
    pub fn inverse(&self) -> Option<Self> {
        let inv = self.matrix.try_inverse()?;
        Some(Self::new(inv, Vector(-(inv * self.translation.0)), self.center))
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for AffineTransform<D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        // Row-vector form: y = (x - c) @ A^T + c + t
        let device = points.device();

        let mut a_t = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                a_t.push(self.matrix[(c, r)] as f32);
            }
        }
        let a_t = Tensor::<B, 2>::from_data(TensorData::new(a_t, Shape::new([D, D])), &device);

        let center: Vec<f32> = (0..D).map(|i| self.center[i] as f32).collect();
        let offset: Vec<f32> = (0..D).map(|i| (self.center[i] + self.translation[i]) as f32).collect();
        let center = Tensor::<B, 1>::from_data(TensorData::new(center, Shape::new([D])), &device).reshape([1, D]);
        let offset = Tensor::<B, 1>::from_data(TensorData::new(offset, Shape::new([D])), &device).reshape([1, D]);

        (points - center).matmul(a_t) + offset
    }
}

impl<const D: usize> ParametricTransform<D> for AffineTransform<D> {
    fn transform_point(&self, point: &Point<D>) -> Point<D> {
        let local = (*point - self.center).0;
        Point(self.center.0 + self.matrix * local + self.translation.0)
    }

    fn number_of_parameters(&self) -> usize {
        D * D + D
    }

    fn parameters(&self) -> Vec<f64> {
        let mut params = Vec::with_capacity(D * D + D);
        for r in 0..D {
            for c in 0..D {
                params.push(self.matrix[(r, c)]);
            }
        }
        params.extend(self.translation.to_array());
        params
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        if parameters.len() != D * D + D {
            return Err(ImageError::invalid_argument(format!(
                "affine transform takes {} parameters, got {}",
                D * D + D,
                parameters.len()
            )));
        }
        if let Some(bad) = parameters.iter().position(|p| !p.is_finite()) {
            return Err(ImageError::invalid_argument(format!(
                "parameter {} is not finite",
                bad
            )));
        }
        for r in 0..D {
            for c in 0..D {
                self.matrix[(r, c)] = parameters[r * D + c];
            }
        }
        for i in 0..D {
            self.translation[i] = parameters[D * D + i];
        }
        Ok(())
    }

    fn jacobian_into(&self, point: &Point<D>, out: &mut [f64]) {
        let p = D * D + D;
        out[..D * p].fill(0.0);
        let local = *point - self.center;
        for i in 0..D {
            let row = &mut out[i * p..(i + 1) * p];
            for j in 0..D {
                row[i * D + j] = local[j];
            }
            row[D * D + i] = 1.0;
        }
    }
}
