use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use crate::error::{ImageError, Result};
use crate::spatial::Point;
use super::trait_::{Transform, ParametricTransform};

/// Transform that maps every point onto itself.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IdentityTransform<const D: usize>;

impl<B: Backend, const D: usize> Transform<B, D> for IdentityTransform<D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        points
    }
}

impl<const D: usize> ParametricTransform<D> for IdentityTransform<D> {
    fn transform_point(&self, point: &Point<D>) -> Point<D> {
        *point
    }

    fn number_of_parameters(&self) -> usize {
        0
    }

    fn parameters(&self) -> Vec<f64> {
        Vec::new()
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        if parameters.is_empty() {
            Ok(())
        } else {
            Err(ImageError::invalid_argument(format!(
                "identity transform has no parameters, got {}",
                parameters.len()
            )))
        }
    }

    fn jacobian_into(&self, _point: &Point<D>, _out: &mut [f64]) {}
}
