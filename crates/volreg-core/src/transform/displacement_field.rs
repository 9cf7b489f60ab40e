//! Dense displacement field transform.
//!
//! Each voxel of a grid stores a physical displacement `(dx, dy, dz)`. A point
//! maps to `x + u(x)`, with `u` linearly interpolated between voxels.

use burn::tensor::{Tensor, TensorData, Shape};
use burn::tensor::backend::Backend;
use crate::error::{ImageError, Result};
use crate::filter::gaussian::GaussianFilter;
use crate::image::{Image, ImageGeometry};
use crate::interpolation::{Interpolator, LinearInterpolator};
use crate::spatial::Spacing;
use super::trait_::Transform;

/// Dense 3D displacement field.
///
/// `components` has shape `[3, Z, Y, X]`; component 0 is the x displacement.
#[derive(Debug, Clone)]
pub struct DisplacementField<B: Backend> {
    components: Tensor<B, 4>,
    geometry: ImageGeometry<3>,
}

impl<B: Backend> DisplacementField<B> {
    /// Wrap a `[3, Z, Y, X]` tensor defined on `geometry`.
    pub fn new(components: Tensor<B, 4>, geometry: ImageGeometry<3>) -> Result<Self> {
        let [c, z, y, x] = components.dims();
        if c != 3 || [z, y, x] != geometry.size() {
            return Err(ImageError::invalid_data(format!(
                "field shape {:?} does not match [3, {:?}]",
                components.dims(),
                geometry.size()
            )));
        }
        Ok(Self { components, geometry })
    }

    /// Zero displacement everywhere.
    pub fn zeros(geometry: ImageGeometry<3>, device: &B::Device) -> Self {
        let [z, y, x] = geometry.size();
        Self {
            components: Tensor::zeros([3, z, y, x], device),
            geometry,
        }
    }

    /// Build from host values laid out `[3, Z, Y, X]`.
    pub fn from_vec(values: Vec<f32>, geometry: ImageGeometry<3>, device: &B::Device) -> Result<Self> {
        let [z, y, x] = geometry.size();
        if values.len() != 3 * z * y * x {
            return Err(ImageError::invalid_data(format!(
                "expected {} field values, got {}",
                3 * z * y * x,
                values.len()
            )));
        }
        let components = Tensor::from_data(TensorData::new(values, Shape::new([3, z, y, x])), device);
        Self::new(components, geometry)
    }

    /// Host copy laid out `[3, Z, Y, X]`.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        self.components
            .clone()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| ImageError::invalid_data(format!("{:?}", e)))
    }

    pub fn components(&self) -> &Tensor<B, 4> {
        &self.components
    }

    pub fn geometry(&self) -> &ImageGeometry<3> {
        &self.geometry
    }

    /// Displacement along spatial axis `axis` as a `[Z, Y, X]` tensor.
    pub fn component(&self, axis: usize) -> Tensor<B, 3> {
        let [z, y, x] = self.geometry.size();
        self.components.clone().narrow(0, axis, 1).reshape([z, y, x])
    }

    /// Displacement along `axis` as an image on the field grid.
    pub fn component_image(&self, axis: usize) -> Image<B, 3> {
        let g = &self.geometry;
        Image::new(self.component(axis), *g.origin(), *g.spacing(), *g.direction())
    }

    /// Add a `[3, Z, Y, X]` update in place.
    pub fn add_update(&mut self, update: Tensor<B, 4>) -> Result<()> {
        if update.dims() != self.components.dims() {
            return Err(ImageError::invalid_data(format!(
                "update shape {:?} does not match field shape {:?}",
                update.dims(),
                self.components.dims()
            )));
        }
        self.components = self.components.clone() + update;
        Ok(())
    }

    /// Smooth every component with a Gaussian of `sigma` voxels.
    pub fn smooth(&self, sigma: f64, max_kernel_width: usize) -> Self {
        if sigma <= 0.0 {
            return self.clone();
        }
        let filter = GaussianFilter::<B>::new(vec![sigma]).with_max_kernel_width(max_kernel_width);
        let unit = Spacing::uniform(1.0);
        let smoothed: Vec<Tensor<B, 3>> = (0..3)
            .map(|axis| filter.apply_tensor(self.component(axis), &unit))
            .collect();
        Self {
            components: Tensor::stack(smoothed, 0),
            geometry: self.geometry.clone(),
        }
    }

    /// Interpolated displacement `[N, 3]` at physical points `[N, 3]`.
    pub fn displacement_at(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let indices = self.geometry.world_to_index_tensor(points);
        let interpolator = LinearInterpolator::new();
        let columns: Vec<Tensor<B, 1>> = (0..3)
            .map(|axis| interpolator.interpolate(&self.component(axis), indices.clone()))
            .collect();
        Tensor::stack(columns, 1)
    }
}

impl<B: Backend> Transform<B, 3> for DisplacementField<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let displacement = self.displacement_at(points.clone());
        points + displacement
    }
}
