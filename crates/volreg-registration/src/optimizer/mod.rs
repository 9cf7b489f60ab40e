//! Optimizer module for parametric registration.
//!
//! Provides the regular-step gradient descent used by the multi-resolution
//! affine loop.

pub mod trait_;
pub mod regular_step;

pub use trait_::{Optimizer, OptimizerState, StopCondition};
pub use regular_step::{RegularStepGradientDescent, ReversalCriterion};
