//! NIfTI-1 volumes to and from [`Image`].
//!
//! Voxel data is exchanged through `ndarray` in NIfTI `(x, y, z)` index order
//! and stored in images as `[Z, Y, X]` tensors.

use std::path::Path;

use burn::tensor::backend::Backend;
use nalgebra::{Matrix3, Vector3};
use ndarray::{Array3, IxDyn};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use tracing::debug;
use volreg_core::image::{Image, ImageGeometry};
use volreg_core::spatial::{Direction, Point, Spacing};

use crate::error::{IoError, Result};

/// Voxel-to-world affine rows `[R*S | t]`, from the sform, else the qform,
/// else pixdim alone.
fn header_affine(header: &NiftiHeader) -> [[f64; 4]; 3] {
    if header.sform_code > 0 {
        let row = |r: [f32; 4]| r.map(|v| v as f64);
        return [row(header.srow_x), row(header.srow_y), row(header.srow_z)];
    }

    let dx = header.pixdim[1] as f64;
    let dy = header.pixdim[2] as f64;
    let dz = header.pixdim[3] as f64;

    if header.qform_code > 0 {
        let b = header.quatern_b as f64;
        let c = header.quatern_c as f64;
        let d = header.quatern_d as f64;
        let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();
        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let dz = dz * qfac;

        return [
            [(a * a + b * b - c * c - d * d) * dx, (2.0 * b * c - 2.0 * a * d) * dy, (2.0 * b * d + 2.0 * a * c) * dz, header.quatern_x as f64],
            [(2.0 * b * c + 2.0 * a * d) * dx, (a * a + c * c - b * b - d * d) * dy, (2.0 * c * d - 2.0 * a * b) * dz, header.quatern_y as f64],
            [(2.0 * b * d - 2.0 * a * c) * dx, (2.0 * c * d + 2.0 * a * b) * dy, (a * a + d * d - c * c - b * b) * dz, header.quatern_z as f64],
        ];
    }

    [[dx, 0.0, 0.0, 0.0], [0.0, dy, 0.0, 0.0], [0.0, 0.0, dz, 0.0]]
}

/// Split an affine into origin, spacing and direction cosines.
fn affine_geometry(affine: &[[f64; 4]; 3]) -> (Point<3>, Spacing<3>, Direction<3>) {
    let origin = Point::new([affine[0][3], affine[1][3], affine[2][3]]);
    let mut spacing = [1.0; 3];
    let mut columns = [Vector3::x(), Vector3::y(), Vector3::z()];

    for axis in 0..3 {
        let column = Vector3::new(affine[0][axis], affine[1][axis], affine[2][axis]);
        let norm = column.norm();
        if norm > 1e-9 {
            spacing[axis] = norm;
            columns[axis] = column / norm;
        }
    }

    (origin, Spacing::new(spacing), Direction(Matrix3::from_columns(&columns)))
}

/// Read a 3-D NIfTI volume (`.nii` or `.nii.gz`).
///
/// A 4-D file is accepted when its fourth dimension is 1.
pub fn read_image<B: Backend, P: AsRef<Path>>(path: P, device: &B::Device) -> Result<Image<B, 3>> {
    let path = path.as_ref();
    let obj = ReaderOptions::new()
        .read_file(path)
        .map_err(|e| IoError::decode(path, e))?;

    let (origin, spacing, direction) = affine_geometry(&header_affine(obj.header()));

    let volume = obj
        .into_volume()
        .into_ndarray::<f32>()
        .map_err(|e| IoError::decode(path, e))?;
    let shape = volume.shape().to_vec();
    let rank = shape.len();
    if !(rank == 3 || (rank > 3 && shape[3..].iter().all(|&d| d == 1))) {
        return Err(IoError::decode(path, format!("expected a 3-D volume, found shape {:?}", shape)));
    }
    let (nx, ny, nz) = (shape[0], shape[1], shape[2]);

    let mut values = Vec::with_capacity(nx * ny * nz);
    let mut index = vec![0usize; rank];
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                index[0] = x;
                index[1] = y;
                index[2] = z;
                values.push(volume[IxDyn(&index)]);
            }
        }
    }

    debug!("Read {} with size ({}, {}, {})", path.display(), nx, ny, nz);
    let geometry = ImageGeometry::new([nz, ny, nx], origin, spacing, direction);
    Image::from_vec(values, &geometry, device).map_err(|e| IoError::decode(path, e))
}

/// Header carrying the image geometry as pixdim and an sform.
fn geometry_header<B: Backend>(image: &Image<B, 3>) -> NiftiHeader {
    let spacing = image.spacing();
    let origin = image.origin();
    let direction = image.direction();

    let mut header = NiftiHeader::default();
    header.pixdim[0] = 1.0;
    for axis in 0..3 {
        header.pixdim[axis + 1] = spacing[axis] as f32;
    }
    let row = |r: usize| {
        [
            (direction[(r, 0)] * spacing[0]) as f32,
            (direction[(r, 1)] * spacing[1]) as f32,
            (direction[(r, 2)] * spacing[2]) as f32,
            origin[r] as f32,
        ]
    };
    header.srow_x = row(0);
    header.srow_y = row(1);
    header.srow_z = row(2);
    header.sform_code = 1;
    header.qform_code = 0;
    header.xyzt_units = 2;
    header
}

/// Write an image as NIfTI. A `.gz` extension produces a compressed file.
///
/// # Arguments
/// * `image` - The image to write
/// * `path` - Path to write the NIfTI file
pub fn write_image<B: Backend, P: AsRef<Path>>(image: &Image<B, 3>, path: P) -> Result<()> {
    let path = path.as_ref();
    let values = image.to_vec().map_err(|e| IoError::encode(path, e))?;
    let [nz, ny, nx] = image.shape();

    let array = Array3::from_shape_fn((nx, ny, nz), |(x, y, z)| values[(z * ny + y) * nx + x]);
    let header = geometry_header(image);

    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&array)
        .map_err(|e| IoError::encode(path, e))?;
    debug!("Wrote {} with size ({}, {}, {})", path.display(), nx, ny, nz);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_read_nifti_basic() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.nii");

        // Array3 shape (3, 4, 5) -> X=3, Y=4, Z=5, value = x + 3y + 12z
        let array = Array3::from_shape_fn((3, 4, 5), |(x, y, z)| (x + 3 * y + 12 * z) as f32);
        WriterOptions::new(&file_path).write_nifti(&array).unwrap();

        let device = Default::default();
        let image = read_image::<TestBackend, _>(&file_path, &device).unwrap();

        // Image shape should be [Z, Y, X] = [5, 4, 3]
        assert_eq!(image.shape(), [5, 4, 3]);
        let values = image.to_vec().unwrap();
        assert_eq!(values.len(), 60);
        for (i, v) in values.iter().enumerate() {
            assert_eq!(*v, i as f32);
        }
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let device = Default::default();
        let err = read_image::<TestBackend, _>("/nonexistent/volume.nii", &device).unwrap_err();
        assert!(matches!(err, IoError::Decode { .. }));
        assert_eq!(err.path(), Path::new("/nonexistent/volume.nii"));
    }

    #[test]
    fn test_affine_geometry_splits_spacing() {
        let affine = [[0.0, -2.0, 0.0, 10.0], [3.0, 0.0, 0.0, -5.0], [0.0, 0.0, 1.5, 1.0]];
        let (origin, spacing, direction) = affine_geometry(&affine);
        assert_eq!(origin, Point::new([10.0, -5.0, 1.0]));
        assert_eq!(spacing, Spacing::new([3.0, 2.0, 1.5]));
        assert_eq!(direction[(0, 1)], -1.0);
        assert_eq!(direction[(1, 0)], 1.0);
        assert!(direction.is_orthogonal());
    }
}
