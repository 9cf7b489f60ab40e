//! Optimizer trait and per-level optimizer state.
//!
//! The registration loop owns the state and drives it: evaluate the metric,
//! hand value and gradient to [`Optimizer::advance`], notify observers, and
//! repeat until the state carries a stop condition.

use crate::error::Result;

/// Why an optimizer stopped at a pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// Still iterating.
    Running,
    /// The scaled gradient magnitude fell below the tolerance.
    GradientTolerance,
    /// Relaxation shrank the step below the minimum step length.
    StepTooSmall,
    /// The per-level iteration cap was reached.
    MaximumIterations,
    /// The metric reported degenerate overlap at this level.
    NoOverlap,
    /// The metric failed for another reason at this level.
    Failed,
    /// The run was cancelled while this level was active.
    Cancelled,
}

impl StopCondition {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether the level ended without a usable result.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::NoOverlap | Self::Failed)
    }
}

/// Mutable state of one optimizer run.
///
/// A fresh state is created per level, warm-started from the parameters of
/// the previous level.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerState {
    pub parameters: Vec<f64>,
    pub value: f64,
    pub previous_value: f64,
    pub gradient: Vec<f64>,
    pub previous_gradient: Vec<f64>,
    pub step_length: f64,
    pub iteration: usize,
    pub stop: StopCondition,
}

impl OptimizerState {
    pub fn new(parameters: Vec<f64>, step_length: f64) -> Self {
        let n = parameters.len();
        Self {
            parameters,
            value: f64::INFINITY,
            previous_value: f64::INFINITY,
            gradient: vec![0.0; n],
            previous_gradient: vec![0.0; n],
            step_length,
            iteration: 0,
            stop: StopCondition::Running,
        }
    }
}

/// Optimizer trait for host-side parameter vectors.
///
/// Implementations only update the state; they never evaluate the metric.
pub trait Optimizer {
    /// Create the state for a new level.
    fn initialize(&self, parameters: Vec<f64>, step_length: f64) -> OptimizerState;

    /// Whether the iteration budget for the level is spent.
    fn is_exhausted(&self, state: &OptimizerState) -> bool;

    /// Take one step given the metric value and gradient at the current
    /// parameters. Sets `state.stop` when the level should end.
    fn advance(&self, state: &mut OptimizerState, value: f64, gradient: &[f64]) -> Result<()>;
}
