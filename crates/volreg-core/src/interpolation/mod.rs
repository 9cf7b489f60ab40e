//! Interpolation types and operations.
//!
//! This module provides the Interpolator trait and linear interpolation, on
//! tensors for batch resampling and on host slices for per-sample metrics.

pub mod trait_;
pub mod linear;

pub use trait_::Interpolator;
pub use linear::LinearInterpolator;
