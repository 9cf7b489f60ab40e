//! Core image types for volreg.
//!
//! Images carry a burn tensor together with their physical geometry. The
//! transforms, interpolators and filters in this crate are the building
//! blocks used by `volreg-registration`.

pub mod error;
pub mod image;
pub mod spatial;
pub mod transform;
pub mod interpolation;
pub mod filter;

pub use error::{ImageError, Result};
pub use image::{Image, ImageGeometry, GEOMETRY_TOLERANCE};
pub use spatial::{Point, Vector, Spacing, Direction};
