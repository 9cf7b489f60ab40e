use volreg_core::filter::{MultiResolutionPyramid, ResampleImageFilter};
use volreg_core::image::{Image, ImageGeometry};
use volreg_core::interpolation::LinearInterpolator;
use volreg_core::spatial::{Point, Spacing, Direction, Vector};
use volreg_core::transform::{AffineTransform, DisplacementField, SpatialTransform};
use burn_ndarray::NdArray;

type Backend = NdArray<f32>;

fn linear_ramp(geometry: &ImageGeometry<3>) -> Image<Backend, 3> {
    let device = Default::default();
    let [nz, ny, nx] = geometry.size();
    let mut values = Vec::with_capacity(nz * ny * nx);
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let p = geometry.index_to_physical(&Point::new([x as f64, y as f64, z as f64]));
                values.push((0.5 * p[0] + 0.25 * p[1] - 0.125 * p[2]) as f32);
            }
        }
    }
    Image::from_vec(values, geometry, &device).unwrap()
}

#[test]
fn test_round_trip_through_affine_and_inverse_on_linear_ramp() {
    let geometry = ImageGeometry::new(
        [12, 12, 12],
        Point::new([-6.0, -6.0, -6.0]),
        Spacing::uniform(1.0),
        Direction::identity(),
    );
    let image = linear_ramp(&geometry);

    let forward = AffineTransform::translation_only(Vector::new([0.6, -0.4, 0.3]));
    let inverse = forward.inverse().unwrap();

    let moved = ResampleImageFilter::new_from_reference(&image, forward, LinearInterpolator::new()).apply(&image);
    let back = ResampleImageFilter::new_from_reference(&moved, inverse, LinearInterpolator::new()).apply(&moved);

    let original = image.to_vec().unwrap();
    let restored = back.to_vec().unwrap();
    // Compare away from the border, where both passes stay inside the grid.
    for z in 2..10 {
        for y in 2..10 {
            for x in 2..10 {
                let i = (z * 12 + y) * 12 + x;
                assert!((original[i] - restored[i]).abs() < 1e-3, "voxel ({}, {}, {})", x, y, z);
            }
        }
    }
}

#[test]
fn test_field_and_equivalent_affine_agree() {
    let device = Default::default();
    let geometry = ImageGeometry::<3>::from_size([6, 7, 8]);
    let image = linear_ramp(&geometry);

    let n = geometry.num_voxels();
    let mut values = vec![0.0f32; 3 * n];
    values[..n].fill(0.75);
    values[n..2 * n].fill(-0.5);
    let field = DisplacementField::<Backend>::from_vec(values, geometry.clone(), &device).unwrap();
    let affine = AffineTransform::translation_only(Vector::new([0.75, -0.5, 0.0]));

    let by_field = ResampleImageFilter::new_from_reference(&image, SpatialTransform::from(field), LinearInterpolator::new())
        .apply(&image)
        .to_vec()
        .unwrap();
    let by_affine = ResampleImageFilter::new_from_reference(&image, SpatialTransform::<Backend>::from(affine), LinearInterpolator::new())
        .apply(&image)
        .to_vec()
        .unwrap();

    for (a, b) in by_field.iter().zip(&by_affine) {
        assert!((a - b).abs() < 1e-4);
    }
}

#[test]
fn test_pyramid_levels_cover_same_physical_extent() {
    let geometry = ImageGeometry::new(
        [16, 16, 16],
        Point::new([1.0, 2.0, 3.0]),
        Spacing::new([0.5, 1.0, 1.5]),
        Direction::identity(),
    );
    let image = linear_ramp(&geometry);
    let pyramid = MultiResolutionPyramid::new(&image, 3);

    for level in 0..3 {
        let img = pyramid.get_level(level).unwrap();
        let factor = pyramid.schedule()[level].shrink_factor as f64;
        assert_eq!(img.origin(), image.origin());
        for axis in 0..3 {
            assert!((img.spacing()[axis] - geometry.spacing()[axis] * factor).abs() < 1e-12);
        }
    }
}
