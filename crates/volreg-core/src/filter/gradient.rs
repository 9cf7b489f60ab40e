//! Physical-space image gradient by central differences.

use burn::tensor::backend::Backend;
use crate::error::Result;
use crate::image::Image;
use crate::interpolation::LinearInterpolator;
use crate::spatial::{Point, Vector, Direction};

/// Host-side gradient of a volume, one `[Z, Y, X]` buffer per physical axis.
///
/// Index derivatives use central differences with edge voxels replicated, are
/// divided by the axis spacing, then rotated by the image direction.
#[derive(Debug, Clone)]
pub struct ImageGradient {
    size: [usize; 3],
    components: [Vec<f32>; 3],
}

impl ImageGradient {
    pub fn compute<B: Backend>(image: &Image<B, 3>) -> Result<Self> {
        let values = image.to_vec()?;
        Ok(Self::from_values(&values, image.shape(), &image.spacing().to_array(), image.direction()))
    }

    fn from_values(
        values: &[f32],
        size: [usize; 3],
        spacing: &[f64; 3],
        direction: &Direction<3>,
    ) -> Self {
        let [nz, ny, nx] = size;
        let n = nz * ny * nx;
        let mut components = [vec![0.0f32; n], vec![0.0f32; n], vec![0.0f32; n]];
        let identity = direction.max_abs_diff(&Direction::identity()) < 1e-12;

        let at = |x: usize, y: usize, z: usize| values[(z * ny + y) * nx + x] as f64;
        let extents = [nx, ny, nz];

        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let pos = [x, y, z];
                    let mut g = Vector::<3>::zeros();
                    for axis in 0..3 {
                        if extents[axis] < 2 {
                            continue;
                        }
                        let mut lo = pos;
                        let mut hi = pos;
                        lo[axis] = pos[axis].saturating_sub(1);
                        hi[axis] = (pos[axis] + 1).min(extents[axis] - 1);
                        let diff = at(hi[0], hi[1], hi[2]) - at(lo[0], lo[1], lo[2]);
                        g[axis] = diff / (2.0 * spacing[axis]);
                    }
                    if !identity {
                        g = *direction * g;
                    }
                    let flat = (z * ny + y) * nx + x;
                    for axis in 0..3 {
                        components[axis][flat] = g[axis] as f32;
                    }
                }
            }
        }

        Self { size, components }
    }

    pub fn size(&self) -> [usize; 3] {
        self.size
    }

    /// Gradient at a voxel given by its flat `[Z, Y, X]` offset.
    pub fn at(&self, flat: usize) -> Vector<3> {
        Vector::new([
            self.components[0][flat] as f64,
            self.components[1][flat] as f64,
            self.components[2][flat] as f64,
        ])
    }

    /// Linearly interpolated gradient at a continuous index, clamped to the grid.
    pub fn sample(&self, index: &Point<3>) -> Vector<3> {
        Vector::new([
            LinearInterpolator::sample_3d_clamped(&self.components[0], self.size, index),
            LinearInterpolator::sample_3d_clamped(&self.components[1], self.size, index),
            LinearInterpolator::sample_3d_clamped(&self.components[2], self.size, index),
        ])
    }

    /// Buffer of the gradient along physical `axis`.
    pub fn component(&self, axis: usize) -> &[f32] {
        &self.components[axis]
    }
}
