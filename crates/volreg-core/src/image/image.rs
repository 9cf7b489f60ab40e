//! Image type with physical metadata and coordinate transformations.
//!
//! An image pairs a tensor laid out `[Z, Y, X]` with the origin, spacing and
//! direction that place its voxels in physical space.

use burn::tensor::{Tensor, TensorData, Shape};
use burn::tensor::backend::Backend;
use crate::error::{ImageError, Result};
use crate::spatial::{Point, Spacing, Direction};
use super::geometry::ImageGeometry;

/// Medical image with physical metadata.
///
/// # Type Parameters
/// * `B` - The backend for tensor operations
/// * `D` - The dimensionality of the image
///
/// # Coordinate Systems
/// * **Index Space**: continuous voxel indices ordered `(x, y, z)`
/// * **Physical Space**: continuous coordinates in mm or other units
///
/// # Examples
/// ```rust
/// use volreg_core::Image;
/// use volreg_core::spatial::{Point3, Spacing3, Direction3};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([10, 10, 10], &device);
/// let image = Image::new(data, Point3::origin(), Spacing3::uniform(1.0), Direction3::identity());
/// assert_eq!(image.shape(), [10, 10, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    /// Voxel values in tensor order.
    data: Tensor<B, D>,
    /// Physical coordinate of index 0.
    origin: Point<D>,
    /// Physical distance between voxels along each axis.
    spacing: Spacing<D>,
    /// Orientation of the image axes.
    direction: Direction<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create a new image with the given data and metadata.
    pub fn new(
        data: Tensor<B, D>,
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Self {
        Self {
            data,
            origin,
            spacing,
            direction,
        }
    }

    /// Create an image from a tensor and a geometry, checking the size.
    pub fn from_geometry(data: Tensor<B, D>, geometry: &ImageGeometry<D>) -> Result<Self> {
        if data.dims() != geometry.size() {
            return Err(ImageError::invalid_data(format!(
                "tensor shape {:?} does not match geometry size {:?}",
                data.dims(),
                geometry.size()
            )));
        }
        Ok(Self::new(data, *geometry.origin(), *geometry.spacing(), *geometry.direction()))
    }

    /// Create an image from host values in tensor order.
    pub fn from_vec(values: Vec<f32>, geometry: &ImageGeometry<D>, device: &B::Device) -> Result<Self> {
        if values.len() != geometry.num_voxels() {
            return Err(ImageError::invalid_data(format!(
                "expected {} values, got {}",
                geometry.num_voxels(),
                values.len()
            )));
        }
        let data = Tensor::<B, D>::from_data(TensorData::new(values, Shape::new(geometry.size())), device);
        Self::from_geometry(data, geometry)
    }

    /// Copy the voxel values to the host in tensor order.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        self.data
            .clone()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| ImageError::invalid_data(format!("{:?}", e)))
    }

    /// Same geometry, different voxel values.
    pub fn with_data(&self, data: Tensor<B, D>) -> Self {
        Self::new(data, self.origin, self.spacing, self.direction)
    }

    /// Get the image data tensor.
    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    /// Consume the image, returning its tensor.
    pub fn into_data(self) -> Tensor<B, D> {
        self.data
    }

    /// Get the origin (physical coordinate of first voxel).
    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    /// Get the spacing (physical distance between voxels).
    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    /// Get the direction (orientation matrix).
    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Image shape in tensor order.
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    pub fn geometry(&self) -> ImageGeometry<D> {
        ImageGeometry::new(self.shape(), self.origin, self.spacing, self.direction)
    }

    pub fn device(&self) -> B::Device {
        self.data.device()
    }

    /// Convert a continuous physical point to a continuous index.
    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        self.geometry().physical_to_index(point)
    }

    /// Convert a continuous index to a physical point.
    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        self.geometry().index_to_physical(index)
    }

    /// Batch transform physical points `[N, D]` to continuous indices.
    pub fn world_to_index_tensor(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        self.geometry().world_to_index_tensor(points)
    }

    /// Batch transform continuous indices `[N, D]` to physical points.
    pub fn index_to_world_tensor(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        self.geometry().index_to_world_tensor(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;
    type Point3 = Point<3>;
    type Spacing3 = Spacing<3>;
    type Direction3 = Direction<3>;

    #[test]
    fn test_image_creation() {
        let device = Default::default();
        let data = Tensor::<Backend, 3>::zeros([4, 5, 6], &device);
        let origin = Point3::new([1.0, 2.0, 3.0]);
        let spacing = Spacing3::new([1.0, 1.5, 2.0]);
        let direction = Direction3::identity();

        let image = Image::new(data, origin, spacing, direction);

        assert_eq!(image.shape(), [4, 5, 6]);
        assert_eq!(image.origin(), &origin);
        assert_eq!(image.spacing(), &spacing);
        assert_eq!(image.direction(), &direction);
        assert_eq!(image.geometry().extent(0), 6);
    }

    #[test]
    fn test_from_vec_round_trip() {
        let device = Default::default();
        let geometry = ImageGeometry::<3>::from_size([2, 3, 4]);
        let values: Vec<f32> = (0..24).map(|v| v as f32).collect();

        let image = Image::<Backend, 3>::from_vec(values.clone(), &geometry, &device).unwrap();
        assert_eq!(image.to_vec().unwrap(), values);
        assert_eq!(image.geometry(), geometry);
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        let device = Default::default();
        let geometry = ImageGeometry::<3>::from_size([2, 3, 4]);
        let result = Image::<Backend, 3>::from_vec(vec![0.0; 23], &geometry, &device);
        assert!(matches!(result, Err(ImageError::InvalidData(_))));
    }

    #[test]
    fn test_non_unit_spacing_and_origin() {
        let device = Default::default();
        let data = Tensor::<Backend, 3>::zeros([10, 10, 10], &device);
        let image = Image::new(
            data,
            Point3::new([10.0, 20.0, 30.0]),
            Spacing3::new([2.0, 2.0, 2.0]),
            Direction3::identity(),
        );

        let index = image.transform_physical_point_to_continuous_index(&Point3::new([20.0, 30.0, 40.0]));
        assert!((index[0] - 5.0).abs() < 1e-9);
        assert!((index[1] - 5.0).abs() < 1e-9);
        assert!((index[2] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_tensor_mapping_matches_host_mapping() {
        let device = Default::default();
        let mut direction = Direction3::identity();
        direction[(0, 0)] = 0.0;
        direction[(0, 1)] = -1.0;
        direction[(1, 0)] = 1.0;
        direction[(1, 1)] = 0.0;
        let image = Image::new(
            Tensor::<Backend, 3>::zeros([4, 4, 4], &device),
            Point3::new([1.0, -2.0, 0.5]),
            Spacing3::new([0.5, 1.5, 2.0]),
            direction,
        );

        let index = Point3::new([1.0, 2.0, 3.0]);
        let expected = image.transform_continuous_index_to_physical_point(&index);
        let indices = Tensor::<Backend, 2>::from_floats([[1.0, 2.0, 3.0]], &device);
        let physical = image.index_to_world_tensor(indices);
        let values = physical.clone().into_data().to_vec::<f32>().unwrap();
        for axis in 0..3 {
            assert!((values[axis] as f64 - expected[axis]).abs() < 1e-5);
        }

        let back = image.world_to_index_tensor(physical).into_data().to_vec::<f32>().unwrap();
        for axis in 0..3 {
            assert!((back[axis] as f64 - index[axis]).abs() < 1e-5);
        }
    }
}
