//! Image types and operations.
//!
//! This module provides the Image type, the geometry that maps voxel indices
//! to physical coordinates, and index-grid generation.

pub mod image;
pub mod geometry;
pub mod grid;

pub use image::Image;
pub use geometry::{ImageGeometry, GEOMETRY_TOLERANCE};
pub use grid::generate_grid;
