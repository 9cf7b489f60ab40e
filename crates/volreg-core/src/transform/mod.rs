//! Transform types and operations.
//!
//! Transforms map physical points. Affine and identity transforms carry a
//! host parameter vector for optimization; displacement fields are dense
//! tensors updated in place by the demons engine.

pub mod trait_;
pub mod identity;
pub mod affine;
pub mod displacement_field;
pub mod kind;

pub use trait_::{Transform, ParametricTransform};
pub use identity::IdentityTransform;
pub use affine::AffineTransform;
pub use displacement_field::DisplacementField;
pub use kind::SpatialTransform;
