use std::path::Path;
use std::process::Command;

use burn_ndarray::NdArray;
use tempfile::tempdir;
use volreg_core::image::{Image, ImageGeometry};
use volreg_core::spatial::{Direction, Point, Spacing};

type B = NdArray<f32>;

fn volreg() -> Command {
    Command::new(env!("CARGO_BIN_EXE_volreg"))
}

fn geometry(size: usize, spacing: f64) -> ImageGeometry<3> {
    ImageGeometry::new([size; 3], Point::origin(), Spacing::uniform(spacing), Direction::identity())
}

fn write_constant(path: &Path, value: f32, spacing: f64) {
    let geometry = geometry(10, spacing);
    let image = Image::<B, 3>::from_vec(vec![value; 1000], &geometry, &Default::default()).unwrap();
    volreg_io::write_image(&image, path).unwrap();
}

fn write_blob(path: &Path, center: [f32; 3]) {
    let size = 12;
    let mut data = Vec::with_capacity(size * size * size);
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let d2 = (x as f32 - center[0]).powi(2) + (y as f32 - center[1]).powi(2) + (z as f32 - center[2]).powi(2);
                data.push(100.0 * (-d2 / 8.0).exp());
            }
        }
    }
    let image = Image::<B, 3>::from_vec(data, &geometry(size, 1.0), &Default::default()).unwrap();
    volreg_io::write_image(&image, path).unwrap();
}

#[test]
fn test_average_of_constant_volumes() {
    let dir = tempdir().unwrap();
    let inputs: Vec<_> = [3.0, 6.0, 9.0]
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let path = dir.path().join(format!("in{}.nii", i));
            write_constant(&path, *v, 1.0);
            path
        })
        .collect();
    let output = dir.path().join("mean.nii.gz");

    let status = volreg()
        .arg("average")
        .arg("3")
        .args(&inputs)
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());

    let mean = volreg_io::read_image::<B, _>(&output, &Default::default()).unwrap();
    assert!(mean.to_vec().unwrap().iter().all(|v| (v - 6.0).abs() < 1e-5));
}

#[test]
fn test_average_count_mismatch_writes_nothing() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("a.nii");
    write_constant(&input, 1.0, 1.0);
    let output = dir.path().join("mean.nii");

    let status = volreg().args(["average", "2"]).arg(&input).arg(&output).status().unwrap();
    assert!(!status.success());
    assert!(!output.exists());
}

#[test]
fn test_average_geometry_mismatch_writes_nothing() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.nii");
    let b = dir.path().join("b.nii");
    write_constant(&a, 1.0, 1.0);
    write_constant(&b, 1.0, 2.0);
    let output = dir.path().join("mean.nii");

    let status = volreg().args(["average", "2"]).arg(&a).arg(&b).arg(&output).status().unwrap();
    assert!(!status.success());
    assert!(!output.exists());
}

#[test]
fn test_affine_batch_reports_missing_volume() {
    let dir = tempdir().unwrap();
    let fixed = dir.path().join("fixed.nii");
    let good = dir.path().join("good.nii");
    let missing = dir.path().join("missing.nii");
    write_blob(&fixed, [6.0, 6.0, 6.0]);
    write_blob(&good, [6.5, 6.0, 6.0]);

    let output = volreg()
        .args(["affine", "2"])
        .arg(&fixed)
        .arg(&good)
        .arg(&missing)
        .args(["--levels", "1", "--jobs", "2"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[failed]"), "{}", stdout);
    assert!(dir.path().join("affine_good.nii").exists());
    assert!(!dir.path().join("affine_missing.nii").exists());
}

#[test]
fn test_deformable_zero_iterations_writes_output() {
    let dir = tempdir().unwrap();
    let fixed = dir.path().join("fixed.nii");
    let moving = dir.path().join("moving.nii");
    write_blob(&fixed, [6.0, 6.0, 6.0]);
    write_blob(&moving, [7.0, 6.0, 6.0]);
    let output = dir.path().join("warped.nii.gz");

    let status = volreg()
        .arg("deformable")
        .arg(&fixed)
        .arg(&moving)
        .arg(&output)
        .arg("0")
        .status()
        .unwrap();
    assert!(status.success());

    let warped = volreg_io::read_image::<B, _>(&output, &Default::default()).unwrap();
    assert_eq!(warped.shape(), [12, 12, 12]);
}
