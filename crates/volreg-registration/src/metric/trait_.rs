//! Metric trait for image similarity measurement.

use serde::{Deserialize, Serialize};
use volreg_core::transform::ParametricTransform;
use crate::error::Result;

/// Metric trait for measuring similarity between a fixed and a moving image.
///
/// Metrics are built once per image pair and then evaluated for many
/// candidate transforms. Lower values indicate better alignment.
///
/// # Type Parameters
/// * `T` - The parametric transform mapping fixed space into moving space
pub trait Metric<T: ParametricTransform<3>> {
    /// Value and analytic derivative with respect to the transform parameters.
    fn evaluate(&self, transform: &T) -> Result<MetricEvaluation>;

    /// Get the name of this metric.
    fn name(&self) -> &'static str;
}

/// Result of one metric evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvaluation {
    pub value: f64,
    /// One entry per transform parameter.
    pub derivative: Vec<f64>,
    /// Samples whose mapped point landed inside the moving image.
    pub valid_samples: usize,
    pub total_samples: usize,
}

impl MetricEvaluation {
    /// Fraction of samples that mapped outside the moving image.
    pub fn excluded_fraction(&self) -> f64 {
        if self.total_samples == 0 {
            return 1.0;
        }
        1.0 - self.valid_samples as f64 / self.total_samples as f64
    }
}

/// Which fixed voxels contribute to the metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingStrategy {
    /// Every voxel.
    Dense,
    /// Every nth voxel in `[Z, Y, X]` scan order.
    Sparse(usize),
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Dense
    }
}

impl SamplingStrategy {
    /// Distance between consecutive samples in scan order.
    pub fn stride(&self) -> usize {
        match self {
            Self::Dense => 1,
            Self::Sparse(n) => *n,
        }
    }
}
