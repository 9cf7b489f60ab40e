use burn_ndarray::NdArray;
use nalgebra::Matrix3;
use tempfile::tempdir;
use volreg_core::image::{Image, ImageGeometry};
use volreg_core::spatial::{Direction, Point, Spacing};
use volreg_io::{read_image, write_image, IoError};

type B = NdArray<f32>;

fn sample_image() -> Image<B, 3> {
    // 90 degree rotation about z.
    let direction = Direction(Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0));
    let geometry = ImageGeometry::new(
        [4, 5, 6],
        Point::new([12.5, -3.0, 40.0]),
        Spacing::new([0.75, 1.25, 2.0]),
        direction,
    );
    let values: Vec<f32> = (0..120).map(|i| i as f32 * 0.5 - 7.0).collect();
    Image::from_vec(values, &geometry, &Default::default()).unwrap()
}

fn assert_same(a: &Image<B, 3>, b: &Image<B, 3>) {
    assert_eq!(a.shape(), b.shape());
    assert!((a.origin().coords() - b.origin().coords()).norm() < 1e-4);
    assert!((*a.spacing() - *b.spacing()).norm() < 1e-5);
    assert!(a.direction().max_abs_diff(b.direction()) < 1e-5);
    assert_eq!(a.to_vec().unwrap(), b.to_vec().unwrap());
}

#[test]
fn test_roundtrip_uncompressed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("volume.nii");
    let image = sample_image();

    write_image(&image, &path).unwrap();
    let read = read_image::<B, _>(&path, &Default::default()).unwrap();
    assert_same(&image, &read);
}

#[test]
fn test_roundtrip_compressed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("volume.nii.gz");
    let image = sample_image();

    write_image(&image, &path).unwrap();
    let read = read_image::<B, _>(&path, &Default::default()).unwrap();
    assert_same(&image, &read);
}

#[test]
fn test_write_into_missing_directory_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("volume.nii");
    let err = write_image(&sample_image(), &path).unwrap_err();
    assert!(matches!(err, IoError::Encode { .. }));
}

#[test]
fn test_garbage_file_is_decode_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("garbage.nii");
    std::fs::write(&path, b"not a nifti file").unwrap();
    let err = read_image::<B, _>(&path, &Default::default()).unwrap_err();
    assert!(matches!(err, IoError::Decode { .. }));
}
