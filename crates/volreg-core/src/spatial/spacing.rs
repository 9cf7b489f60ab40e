//! Spacing between adjacent voxels along each axis.

use super::Vector;

/// Physical distance between adjacent voxels, ordered `(x, y, z)`.
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    /// Same spacing along every axis.
    pub fn uniform(value: f64) -> Self {
        Self::new([value; D])
    }

    /// Check if every component is equal.
    pub fn is_uniform(&self) -> bool {
        (1..D).all(|i| (self[i] - self[0]).abs() < 1e-9)
    }

    /// Smallest component.
    pub fn min_spacing(&self) -> f64 {
        (0..D).map(|i| self[i]).fold(f64::INFINITY, f64::min)
    }

    /// Check that every component is finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        (0..D).all(|i| self[i].is_finite() && self[i] > 0.0)
    }
}
