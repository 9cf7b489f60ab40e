//! Metric implementations.
//!
//! Intensity-based similarity between a fixed and a moving image, evaluated
//! against host-side parametric transforms.

pub mod trait_;
pub mod mse;

pub use trait_::{Metric, MetricEvaluation, SamplingStrategy};
pub use mse::MeanSquaresMetric;
