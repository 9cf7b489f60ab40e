//! Image filters.
//!
//! Resampling, smoothing and pyramid construction run on tensors. Gradient
//! and histogram matching work on host copies of the voxel data.

pub mod gaussian;
pub mod downsample;
pub mod pyramid;
pub mod resample;
pub mod gradient;
pub mod histogram_matching;
pub mod average;

pub use gaussian::GaussianFilter;
pub use resample::ResampleImageFilter;
pub use pyramid::{MultiResolutionPyramid, LevelSchedule, MAX_PYRAMID_LEVELS};
pub use downsample::DownsampleFilter;
pub use gradient::ImageGradient;
pub use histogram_matching::{HistogramMatchingConfig, HistogramMatchingFilter, IntensityLandmarks};
pub use average::AverageImageFilter;
