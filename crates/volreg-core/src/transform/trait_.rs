//! Transform traits for spatial coordinate transformations.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use crate::error::Result;
use crate::spatial::Point;

/// Transform trait for spatial coordinate transformations.
///
/// Maps points from one physical space to another. Resampling uses it in the
/// output-to-input direction.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `D` - The spatial dimensionality
pub trait Transform<B: Backend, const D: usize> {
    /// Apply transform to a batch of points.
    ///
    /// # Arguments
    /// * `points` - Tensor of shape `[Batch, D]` containing the input points
    ///
    /// # Returns
    /// Tensor of shape `[Batch, D]` containing the transformed points
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// A transform with a flat, host-side parameter vector.
///
/// Optimizers work against this trait: they read and write parameters and
/// need the Jacobian of the mapped point with respect to them.
pub trait ParametricTransform<const D: usize>: Clone {
    /// Map a single physical point.
    fn transform_point(&self, point: &Point<D>) -> Point<D>;

    fn number_of_parameters(&self) -> usize;

    fn parameters(&self) -> Vec<f64>;

    /// Replace every parameter. Fails on a length mismatch or non-finite value.
    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()>;

    /// Write `dT_i / dp_j` at `point` into `out[i * P + j]`, with `P` the
    /// number of parameters.
    fn jacobian_into(&self, point: &Point<D>, out: &mut [f64]);
}
