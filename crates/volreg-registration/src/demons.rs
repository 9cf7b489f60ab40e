//! Demons deformable registration.
//!
//! Thirion's demons with the symmetric-denominator force
//! `diff * grad(F) / (|grad(F)|^2 + diff^2)`, followed by Gaussian smoothing
//! of the accumulated displacement field after every update.

use std::time::Instant;

use burn::config::Config;
use burn::tensor::backend::Backend;
use tracing::{debug, info, warn};
use volreg_core::filter::{ImageGradient, ResampleImageFilter};
use volreg_core::image::Image;
use volreg_core::interpolation::LinearInterpolator;
use volreg_core::spatial::Vector;
use volreg_core::transform::DisplacementField;

use crate::cancel::CancellationToken;
use crate::error::RegistrationError;
use crate::observer::{IterationState, ObserverSet};
use crate::result::{RegistrationResult, TerminationReason};
use crate::validation::validate_demons_config;

/// Configuration for demons registration.
#[derive(Config, Debug, PartialEq)]
pub struct DemonsConfig {
    /// Number of field updates.
    pub iterations: usize,
    /// Field smoothing, in voxels.
    #[config(default = "1.0")]
    pub standard_deviation: f64,
    /// Voxels whose intensity difference is below this get no force.
    #[config(default = "1e-3")]
    pub intensity_difference_threshold: f64,
    /// Voxels whose force denominator is below this get no force and are
    /// counted as unstable.
    #[config(default = "1e-9")]
    pub denominator_threshold: f64,
    #[config(default = "32")]
    pub max_kernel_width: usize,
    /// Stop once the RMS update falls below this value.
    pub early_stop_rms: Option<f64>,
}

/// Force at one voxel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DemonsForce {
    /// Intensities already agree.
    Zero,
    /// The denominator underflowed; no force is applied.
    Unstable,
    Force(Vector<3>),
}

impl DemonsForce {
    pub fn vector(&self) -> Vector<3> {
        match self {
            Self::Force(v) => *v,
            Self::Zero | Self::Unstable => Vector::zeros(),
        }
    }
}

/// Demons force for intensity difference `diff = F - M(u)` and fixed
/// gradient `gradient`.
pub fn demons_force(diff: f64, gradient: &Vector<3>, config: &DemonsConfig) -> DemonsForce {
    if diff.abs() < config.intensity_difference_threshold {
        return DemonsForce::Zero;
    }
    let denominator = gradient.dot(gradient) + diff * diff;
    if !(denominator >= config.denominator_threshold) {
        return DemonsForce::Unstable;
    }
    DemonsForce::Force(*gradient * (diff / denominator))
}

/// Statistics of one demons update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateStatistics {
    /// Mean squared difference before the update.
    pub mean_squared_difference: f64,
    pub rms_update: f64,
    pub unstable_voxels: usize,
}

/// Demons registration engine.
#[derive(Debug, Clone)]
pub struct DemonsRegistration {
    config: DemonsConfig,
}

impl DemonsRegistration {
    /// Create the engine. Fails on an invalid configuration.
    pub fn new(config: DemonsConfig) -> crate::error::Result<Self> {
        validate_demons_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DemonsConfig {
        &self.config
    }

    /// Run demons from `initial_field`, or from a zero field on the fixed grid.
    ///
    /// Fixed and moving images must share a grid.
    pub fn execute<B: Backend>(
        &self,
        fixed: &Image<B, 3>,
        moving: &Image<B, 3>,
        initial_field: Option<DisplacementField<B>>,
        observers: &ObserverSet<B>,
        cancel: &CancellationToken,
    ) -> crate::error::Result<RegistrationResult<DisplacementField<B>>> {
        let start = Instant::now();
        let geometry = fixed.geometry();
        geometry
            .ensure_matches(&moving.geometry())
            .map_err(|e| RegistrationError::geometry_mismatch(format!("fixed and moving grids differ: {}", e)))?;

        let device = fixed.device();
        let mut field = match initial_field {
            Some(field) => {
                geometry.ensure_matches(field.geometry()).map_err(|e| {
                    RegistrationError::geometry_mismatch(format!("initial field grid differs: {}", e))
                })?;
                field
            }
            None => DisplacementField::zeros(geometry.clone(), &device),
        };

        let fixed_values = fixed.to_vec()?;
        let fixed_gradient = ImageGradient::compute(fixed)?;

        observers.start();
        info!(
            "Demons: {} iterations, sigma {} voxels, size {:?}",
            self.config.iterations,
            self.config.standard_deviation,
            geometry.size()
        );

        let mut termination = TerminationReason::Completed;
        let mut completed = 0;
        let mut final_value = f64::NAN;
        let mut total_unstable = 0;

        for iteration in 1..=self.config.iterations {
            if cancel.is_cancelled() {
                termination = TerminationReason::Cancelled;
                break;
            }

            let warped = warp(moving, &field).to_vec()?;
            let (update, stats) = self.compute_update(&fixed_values, &warped, &fixed_gradient);
            let update = DisplacementField::from_vec(update, geometry.clone(), &device)?;
            field.add_update(update.components().clone())?;
            field = field.smooth(self.config.standard_deviation, self.config.max_kernel_width);

            completed = iteration;
            final_value = stats.mean_squared_difference;
            total_unstable += stats.unstable_voxels;
            debug!(
                "Demons iteration {}: mse {:.6}, rms update {:.4e}",
                iteration, stats.mean_squared_difference, stats.rms_update
            );

            observers.iteration(&IterationState::Demons {
                iteration,
                value: stats.mean_squared_difference,
                rms_update: stats.rms_update,
                unstable_voxels: stats.unstable_voxels,
                field: &field,
            });

            if cancel.is_cancelled() {
                termination = TerminationReason::Cancelled;
                break;
            }
            if let Some(threshold) = self.config.early_stop_rms {
                if stats.rms_update < threshold {
                    info!("Demons converged at iteration {} (rms update {:.4e})", iteration, stats.rms_update);
                    termination = TerminationReason::Converged;
                    break;
                }
            }
        }

        if completed == 0 {
            final_value = mean_squared_difference(&fixed_values, &warp(moving, &field).to_vec()?);
        }
        if total_unstable > 0 {
            warn!("Demons zeroed the force at {} unstable voxel updates", total_unstable);
        }

        let result = RegistrationResult {
            transform: field,
            iterations: completed,
            final_value,
            termination,
            levels: Vec::new(),
            degraded: false,
        };
        observers.complete(&result.summary(start.elapsed()));
        Ok(result)
    }

    /// Force field laid out `[3, Z, Y, X]` and the statistics of this update.
    fn compute_update(
        &self,
        fixed: &[f32],
        warped: &[f32],
        gradient: &ImageGradient,
    ) -> (Vec<f32>, UpdateStatistics) {
        let n = fixed.len();
        let mut update = vec![0.0f32; 3 * n];
        let mut squared_diff = 0.0;
        let mut squared_update = 0.0;
        let mut unstable = 0;

        for (i, (f, m)) in fixed.iter().zip(warped).enumerate() {
            let diff = (*f - *m) as f64;
            squared_diff += diff * diff;
            let force = demons_force(diff, &gradient.at(i), &self.config);
            if force == DemonsForce::Unstable {
                unstable += 1;
            }
            let v = force.vector();
            squared_update += v.dot(&v);
            for axis in 0..3 {
                update[axis * n + i] = v[axis] as f32;
            }
        }

        let count = n.max(1) as f64;
        let stats = UpdateStatistics {
            mean_squared_difference: squared_diff / count,
            rms_update: (squared_update / count).sqrt(),
            unstable_voxels: unstable,
        };
        (update, stats)
    }
}

fn warp<B: Backend>(moving: &Image<B, 3>, field: &DisplacementField<B>) -> Image<B, 3> {
    ResampleImageFilter::new(field.geometry().clone(), field.clone(), LinearInterpolator::new()).apply(moving)
}

fn mean_squared_difference(a: &[f32], b: &[f32]) -> f64 {
    let sum: f64 = a.iter().zip(b).map(|(x, y)| ((*x - *y) as f64).powi(2)).sum();
    sum / a.len().max(1) as f64
}
