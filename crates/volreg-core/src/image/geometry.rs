//! Image geometry: size, origin, spacing and direction.

use burn::tensor::{Tensor, TensorData, Shape};
use burn::tensor::backend::Backend;
use crate::error::{ImageError, Result};
use crate::spatial::{Point, Spacing, Direction, Vector};

/// Largest difference in origin, spacing or direction entries for two
/// geometries to count as the same grid.
pub const GEOMETRY_TOLERANCE: f64 = 1e-6;

/// Physical layout of a voxel grid.
///
/// `size` is stored in tensor order (`[Z, Y, X]` for volumes) while origin,
/// spacing and direction are indexed by spatial axis (`x, y, z`).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGeometry<const D: usize> {
    size: [usize; D],
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
}

impl<const D: usize> ImageGeometry<D> {
    pub fn new(size: [usize; D], origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Self {
        Self { size, origin, spacing, direction }
    }

    /// Grid at the origin with unit spacing and identity direction.
    pub fn from_size(size: [usize; D]) -> Self {
        Self::new(size, Point::origin(), Spacing::uniform(1.0), Direction::identity())
    }

    /// Size in tensor order.
    pub fn size(&self) -> [usize; D] {
        self.size
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Number of voxels along spatial axis `axis` (0 is x).
    pub fn extent(&self, axis: usize) -> usize {
        self.size[D - 1 - axis]
    }

    pub fn num_voxels(&self) -> usize {
        self.size.iter().product()
    }

    /// `point = origin + Direction * (index * spacing)`
    pub fn index_to_physical(&self, index: &Point<D>) -> Point<D> {
        let scaled = index.coords().component_mul(&self.spacing);
        self.origin + self.direction * scaled
    }

    /// `index = Direction^-1 * (point - origin) / spacing`
    pub fn physical_to_index(&self, point: &Point<D>) -> Point<D> {
        let rotated = self.direction.inverse() * (*point - self.origin);
        Point(nalgebra::Point::from(rotated.component_div(&self.spacing).0))
    }

    /// Physical position of the grid centre.
    pub fn physical_center(&self) -> Point<D> {
        let mut index = Point::origin();
        for axis in 0..D {
            index[axis] = (self.extent(axis) as f64 - 1.0) / 2.0;
        }
        self.index_to_physical(&index)
    }

    /// Whether a continuous index lies within half a voxel of the grid.
    pub fn contains_index(&self, index: &Point<D>) -> bool {
        (0..D).all(|axis| {
            let upper = self.extent(axis) as f64 - 0.5;
            index[axis] >= -0.5 && index[axis] <= upper
        })
    }

    /// Physical size of one voxel step along each index axis.
    pub fn axis_step(&self, axis: usize) -> Vector<D> {
        let mut unit = Vector::zeros();
        unit[axis] = self.spacing[axis];
        self.direction * unit
    }

    /// Check that `other` describes the same grid.
    pub fn ensure_matches(&self, other: &Self) -> Result<()> {
        if self.size != other.size {
            return Err(ImageError::geometry_mismatch(format!(
                "size {:?} differs from {:?}",
                other.size, self.size
            )));
        }
        let origin_diff = (self.origin - other.origin).0.abs().max();
        if origin_diff > GEOMETRY_TOLERANCE {
            return Err(ImageError::geometry_mismatch(format!(
                "origin differs by {:e}",
                origin_diff
            )));
        }
        let spacing_diff = (self.spacing - other.spacing).0.abs().max();
        if spacing_diff > GEOMETRY_TOLERANCE {
            return Err(ImageError::geometry_mismatch(format!(
                "spacing differs by {:e}",
                spacing_diff
            )));
        }
        let direction_diff = self.direction.max_abs_diff(&other.direction);
        if direction_diff > GEOMETRY_TOLERANCE {
            return Err(ImageError::geometry_mismatch(format!(
                "direction differs by {:e}",
                direction_diff
            )));
        }
        Ok(())
    }

    /// Batch transform physical points `[N, D]` to continuous indices `[N, D]`.
    pub fn world_to_index_tensor<B: Backend>(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let origin = self.origin_tensor::<B>(&device);

        // I = (P - O) @ T with T[r, c] = inv_dir[c, r] / spacing[c]
        let inv_dir = self.direction.inverse();
        let mut t_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                t_data.push((inv_dir[(c, r)] / self.spacing[c]) as f32);
            }
        }
        let t_tensor = Tensor::<B, 2>::from_data(TensorData::new(t_data, Shape::new([D, D])), &device);

        (points - origin).matmul(t_tensor)
    }

    /// Batch transform continuous indices `[N, D]` to physical points `[N, D]`.
    pub fn index_to_world_tensor<B: Backend>(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = indices.device();
        let origin = self.origin_tensor::<B>(&device);

        // P = O + I @ M with M[r, c] = spacing[r] * dir[c, r]
        let mut m_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                m_data.push((self.spacing[r] * self.direction[(c, r)]) as f32);
            }
        }
        let m_tensor = Tensor::<B, 2>::from_data(TensorData::new(m_data, Shape::new([D, D])), &device);

        indices.matmul(m_tensor) + origin
    }

    fn origin_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let origin_vec: Vec<f32> = (0..D).map(|i| self.origin[i] as f32).collect();
        Tensor::<B, 1>::from_data(TensorData::new(origin_vec, Shape::new([D])), device).reshape([1, D])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Point3 = Point<3>;
    type Spacing3 = Spacing<3>;

    fn geometry() -> ImageGeometry<3> {
        ImageGeometry::new(
            [4, 6, 8],
            Point3::new([10.0, 20.0, 30.0]),
            Spacing3::new([0.5, 1.0, 2.0]),
            Direction::identity(),
        )
    }

    #[test]
    fn test_extent_follows_spatial_axis() {
        let g = geometry();
        assert_eq!(g.extent(0), 8);
        assert_eq!(g.extent(1), 6);
        assert_eq!(g.extent(2), 4);
        assert_eq!(g.num_voxels(), 192);
    }

    #[test]
    fn test_index_physical_round_trip() {
        let g = geometry();
        let index = Point3::new([3.0, 2.5, 1.0]);
        let physical = g.index_to_physical(&index);
        assert!((physical[0] - 11.5).abs() < 1e-12);
        assert!((physical[1] - 22.5).abs() < 1e-12);
        assert!((physical[2] - 32.0).abs() < 1e-12);
        let back = g.physical_to_index(&physical);
        assert!(back.distance(&index) < 1e-12);
    }

    #[test]
    fn test_physical_center() {
        let center = geometry().physical_center();
        assert!((center[0] - (10.0 + 3.5 * 0.5)).abs() < 1e-12);
        assert!((center[1] - (20.0 + 2.5)).abs() < 1e-12);
        assert!((center[2] - (30.0 + 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_contains_index_half_voxel_margin() {
        let g = geometry();
        assert!(g.contains_index(&Point3::new([-0.5, 0.0, 0.0])));
        assert!(g.contains_index(&Point3::new([7.5, 5.5, 3.5])));
        assert!(!g.contains_index(&Point3::new([7.6, 0.0, 0.0])));
        assert!(!g.contains_index(&Point3::new([0.0, -0.51, 0.0])));
    }

    #[test]
    fn test_ensure_matches() {
        let g = geometry();
        assert!(g.ensure_matches(&g.clone()).is_ok());

        let other_size = ImageGeometry::new([4, 6, 9], *g.origin(), *g.spacing(), *g.direction());
        assert!(matches!(g.ensure_matches(&other_size), Err(ImageError::GeometryMismatch(_))));

        let mut origin = *g.origin();
        origin[0] += 1e-7;
        let within = ImageGeometry::new(g.size(), origin, *g.spacing(), *g.direction());
        assert!(g.ensure_matches(&within).is_ok());

        let mut spacing = *g.spacing();
        spacing[2] += 1e-3;
        let off = ImageGeometry::new(g.size(), *g.origin(), spacing, *g.direction());
        assert!(g.ensure_matches(&off).is_err());
    }
}
