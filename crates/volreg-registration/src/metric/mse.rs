//! Mean squares metric with an analytic parameter derivative.

use burn::tensor::backend::Backend;
use nalgebra::Matrix3;
use volreg_core::filter::ImageGradient;
use volreg_core::image::Image;
use volreg_core::interpolation::LinearInterpolator;
use volreg_core::spatial::{Point, Vector};
use volreg_core::transform::ParametricTransform;
use crate::error::{RegistrationError, Result};
use super::trait_::{Metric, MetricEvaluation, SamplingStrategy};

/// Mean Squares Metric.
///
/// MSE = (1/N) * sum((Moving(T(x)) - Fixed(x))^2)
///
/// The sum runs over fixed samples whose mapped point falls within half a
/// voxel of the moving grid. The derivative is
/// `(2/N) * sum(diff * grad(Moving)(T(x))^T * J_T(x))`, with the moving
/// gradient taken in physical space.
///
/// Both images are copied to the host once, so evaluation does not touch the
/// tensor backend.
#[derive(Debug, Clone)]
pub struct MeanSquaresMetric {
    samples: Vec<(Point<3>, f64)>,
    moving_values: Vec<f32>,
    moving_size: [usize; 3],
    moving_origin: Point<3>,
    /// `diag(1 / spacing) * Direction^-1`
    physical_to_index: Matrix3<f64>,
    moving_gradient: ImageGradient,
    max_excluded_fraction: f64,
}

impl MeanSquaresMetric {
    /// Build the metric for a fixed/moving pair.
    ///
    /// # Arguments
    /// * `fixed` - Image whose voxels are the sample positions
    /// * `moving` - Image sampled through the transform
    /// * `sampling` - Dense or every nth fixed voxel
    /// * `max_excluded_fraction` - Evaluation fails when more samples than this
    ///   fraction map outside the moving image
    pub fn new<B: Backend>(
        fixed: &Image<B, 3>,
        moving: &Image<B, 3>,
        sampling: SamplingStrategy,
        max_excluded_fraction: f64,
    ) -> Result<Self> {
        let stride = sampling.stride();
        if stride == 0 {
            return Err(RegistrationError::configuration("sparse sampling stride must be positive"));
        }
        if !(0.0..=1.0).contains(&max_excluded_fraction) {
            return Err(RegistrationError::configuration(format!(
                "max_excluded_fraction must lie in [0, 1], got {}",
                max_excluded_fraction
            )));
        }

        let fixed_geometry = fixed.geometry();
        let [_, ny, nx] = fixed_geometry.size();
        let fixed_values = fixed.to_vec()?;
        let samples = fixed_values
            .iter()
            .enumerate()
            .step_by(stride)
            .map(|(flat, value)| {
                let x = flat % nx;
                let y = (flat / nx) % ny;
                let z = flat / (nx * ny);
                let index = Point::new([x as f64, y as f64, z as f64]);
                (fixed_geometry.index_to_physical(&index), *value as f64)
            })
            .collect();

        let inverse_spacing = Matrix3::from_diagonal(&moving.spacing().0.map(|s| 1.0 / s));
        let physical_to_index = inverse_spacing * moving.direction().inverse().inner();

        Ok(Self {
            samples,
            moving_values: moving.to_vec()?,
            moving_size: moving.shape(),
            moving_origin: *moving.origin(),
            physical_to_index,
            moving_gradient: ImageGradient::compute(moving)?,
            max_excluded_fraction,
        })
    }

    /// Number of fixed samples considered per evaluation.
    pub fn number_of_samples(&self) -> usize {
        self.samples.len()
    }

    fn moving_index(&self, point: &Point<3>) -> Point<3> {
        let offset = (*point - self.moving_origin).0;
        Point(nalgebra::Point::from(self.physical_to_index * offset))
    }
}

impl<T: ParametricTransform<3>> Metric<T> for MeanSquaresMetric {
    fn evaluate(&self, transform: &T) -> Result<MetricEvaluation> {
        let num_params = transform.number_of_parameters();
        let total = self.samples.len();
        let mut jacobian = vec![0.0; 3 * num_params];
        let mut derivative = vec![0.0; num_params];
        let mut sum = 0.0;
        let mut valid = 0usize;

        for (point, fixed_value) in &self.samples {
            let mapped = transform.transform_point(point);
            let index = self.moving_index(&mapped);
            let Some(moving_value) = LinearInterpolator::sample_3d(&self.moving_values, self.moving_size, &index) else {
                continue;
            };

            let diff = moving_value - fixed_value;
            sum += diff * diff;
            valid += 1;

            if num_params == 0 {
                continue;
            }
            let gradient: Vector<3> = self.moving_gradient.sample(&index);
            transform.jacobian_into(point, &mut jacobian);
            for (j, d) in derivative.iter_mut().enumerate() {
                let mut projected = 0.0;
                for i in 0..3 {
                    projected += gradient[i] * jacobian[i * num_params + j];
                }
                *d += diff * projected;
            }
        }

        let excluded = 1.0 - valid as f64 / total.max(1) as f64;
        if valid == 0 || excluded > self.max_excluded_fraction {
            return Err(RegistrationError::DegenerateOverlap { valid, total });
        }

        let n = valid as f64;
        let value = sum / n;
        if !value.is_finite() {
            return Err(RegistrationError::numeric_instability(format!(
                "metric value is {}",
                value
            )));
        }
        for d in derivative.iter_mut() {
            *d *= 2.0 / n;
        }

        Ok(MetricEvaluation {
            value,
            derivative,
            valid_samples: valid,
            total_samples: total,
        })
    }

    fn name(&self) -> &'static str {
        "MeanSquares"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use volreg_core::image::ImageGeometry;
    use volreg_core::spatial::{Direction, Spacing};
    use volreg_core::transform::AffineTransform;

    type B = NdArray<f32>;

    fn ramp(size: [usize; 3], origin: [f64; 3]) -> Image<B, 3> {
        let geometry = ImageGeometry::new(
            size,
            Point::new(origin),
            Spacing::uniform(1.0),
            Direction::identity(),
        );
        let [nz, ny, nx] = size;
        let mut values = Vec::with_capacity(nz * ny * nx);
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let p = geometry.index_to_physical(&Point::new([x as f64, y as f64, z as f64]));
                    values.push((p[0] + 2.0 * p[1] + 3.0 * p[2]) as f32);
                }
            }
        }
        Image::from_vec(values, &geometry, &Default::default()).unwrap()
    }

    #[test]
    fn test_identical_images_zero() {
        let image = ramp([6, 6, 6], [0.0; 3]);
        let metric = MeanSquaresMetric::new(&image, &image, SamplingStrategy::Dense, 0.95).unwrap();
        let eval = metric.evaluate(&AffineTransform::<3>::identity(Point::origin())).unwrap();
        assert!(eval.value.abs() < 1e-10);
        assert_eq!(eval.valid_samples, 216);
        assert_eq!(eval.total_samples, 216);
        assert_eq!(eval.derivative.len(), 12);
    }

    #[test]
    fn test_translation_value_and_derivative() {
        let fixed = ramp([6, 6, 6], [2.0; 3]);
        let moving = ramp([10, 10, 10], [0.0; 3]);
        let metric = MeanSquaresMetric::new(&fixed, &moving, SamplingStrategy::Dense, 0.95).unwrap();

        let transform = AffineTransform::<3>::translation_only(Vector::new([0.3, 0.0, 0.0]));
        let eval = metric.evaluate(&transform).unwrap();
        assert!((eval.value - 0.09).abs() < 1e-4, "value {}", eval.value);
        // d/dtx = 2 * 0.3 * 1, d/dty = 2 * 0.3 * 2, d/dtz = 2 * 0.3 * 3
        assert!((eval.derivative[9] - 0.6).abs() < 1e-3);
        assert!((eval.derivative[10] - 1.2).abs() < 1e-3);
        assert!((eval.derivative[11] - 1.8).abs() < 1e-3);
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let fixed = ramp([6, 6, 6], [2.0; 3]);
        let moving = ramp([10, 10, 10], [0.0; 3]);
        let metric = MeanSquaresMetric::new(&fixed, &moving, SamplingStrategy::Dense, 0.95).unwrap();

        let mut transform = AffineTransform::<3>::identity(Point::new([4.5, 4.5, 4.5]));
        let mut base = transform.parameters();
        base[0] = 1.02;
        base[4] = 0.99;
        base[10] = 0.2;
        transform.set_parameters(&base).unwrap();
        let eval = metric.evaluate(&transform).unwrap();

        let eps = 1e-5;
        for j in [0, 4, 5, 9, 10] {
            let mut plus = base.clone();
            let mut minus = base.clone();
            plus[j] += eps;
            minus[j] -= eps;
            let mut tp = transform;
            let mut tm = transform;
            tp.set_parameters(&plus).unwrap();
            tm.set_parameters(&minus).unwrap();
            let fp = metric.evaluate(&tp).unwrap().value;
            let fm = metric.evaluate(&tm).unwrap().value;
            let numeric = (fp - fm) / (2.0 * eps);
            assert!(
                (numeric - eval.derivative[j]).abs() < 1e-2 * (1.0 + numeric.abs()),
                "param {}: analytic {} numeric {}",
                j,
                eval.derivative[j],
                numeric
            );
        }
    }

    #[test]
    fn test_no_overlap_is_degenerate() {
        let image = ramp([4, 4, 4], [0.0; 3]);
        let metric = MeanSquaresMetric::new(&image, &image, SamplingStrategy::Dense, 0.95).unwrap();
        let far = AffineTransform::<3>::translation_only(Vector::new([100.0, 0.0, 0.0]));
        let err = metric.evaluate(&far).unwrap_err();
        assert!(matches!(err, RegistrationError::DegenerateOverlap { valid: 0, total: 64 }));
    }

    #[test]
    fn test_excluded_fraction_limit() {
        let image = ramp([4, 4, 4], [0.0; 3]);
        // Shift by three voxels leaves a single x column inside.
        let shift = AffineTransform::<3>::translation_only(Vector::new([3.0, 0.0, 0.0]));

        let strict = MeanSquaresMetric::new(&image, &image, SamplingStrategy::Dense, 0.5).unwrap();
        assert!(matches!(
            strict.evaluate(&shift),
            Err(RegistrationError::DegenerateOverlap { valid: 16, total: 64 })
        ));

        let lenient = MeanSquaresMetric::new(&image, &image, SamplingStrategy::Dense, 0.95).unwrap();
        assert_eq!(lenient.evaluate(&shift).unwrap().valid_samples, 16);
    }

    #[test]
    fn test_sparse_sampling() {
        let image = ramp([4, 4, 4], [0.0; 3]);
        let metric = MeanSquaresMetric::new(&image, &image, SamplingStrategy::Sparse(4), 0.95).unwrap();
        assert_eq!(metric.number_of_samples(), 16);
        assert!(MeanSquaresMetric::new(&image, &image, SamplingStrategy::Sparse(0), 0.95).is_err());
    }
}
