use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use super::affine::AffineTransform;
use super::displacement_field::DisplacementField;
use super::trait_::Transform;

/// The closed set of 3D transforms a registration run can produce.
#[derive(Debug, Clone)]
pub enum SpatialTransform<B: Backend> {
    Identity,
    Affine(AffineTransform<3>),
    DisplacementField(DisplacementField<B>),
}

impl<B: Backend> SpatialTransform<B> {
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }
}

impl<B: Backend> Transform<B, 3> for SpatialTransform<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            Self::Identity => points,
            Self::Affine(affine) => Transform::<B, 3>::transform_points(affine, points),
            Self::DisplacementField(field) => field.transform_points(points),
        }
    }
}

impl<B: Backend> From<AffineTransform<3>> for SpatialTransform<B> {
    fn from(affine: AffineTransform<3>) -> Self {
        Self::Affine(affine)
    }
}

impl<B: Backend> From<DisplacementField<B>> for SpatialTransform<B> {
    fn from(field: DisplacementField<B>) -> Self {
        Self::DisplacementField(field)
    }
}
