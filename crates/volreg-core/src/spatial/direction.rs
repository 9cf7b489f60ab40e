//! Direction cosine matrix describing image axis orientation.

use nalgebra::SMatrix;
use serde::{Serialize, Deserialize};
use super::Vector;

/// Direction matrix. Column `i` is the physical direction of index axis `i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction<const D: usize>(pub SMatrix<f64, D, D>);

impl<const D: usize> Direction<D> {
    /// Identity orientation.
    pub fn identity() -> Self {
        Self(SMatrix::identity())
    }

    /// Check if the matrix is orthonormal.
    pub fn is_orthogonal(&self) -> bool {
        let product = self.0 * self.0.transpose();
        let identity = SMatrix::<f64, D, D>::identity();
        (product - identity).abs().max() < 1e-6
    }

    /// Inverse of the matrix.
    ///
    /// Singular matrices fall back to the transpose, the exact inverse of any
    /// orthonormal direction.
    pub fn inverse(&self) -> Self {
        Self(self.0.try_inverse().unwrap_or_else(|| self.0.transpose()))
    }

    /// Maximum absolute element difference to another direction.
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        (self.0 - other.0).abs().max()
    }

    /// Get the inner nalgebra matrix.
    pub fn inner(&self) -> &SMatrix<f64, D, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<(usize, usize)> for Direction<D> {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

impl<const D: usize> std::ops::IndexMut<(usize, usize)> for Direction<D> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<const D: usize> std::ops::Mul<Vector<D>> for Direction<D> {
    type Output = Vector<D>;

    fn mul(self, vector: Vector<D>) -> Self::Output {
        Vector(self.0 * vector.0)
    }
}
