//! Multi-resolution affine registration.

use std::time::Instant;

use burn::config::Config;
use burn::tensor::backend::Backend;
use tracing::{debug, info, warn};
use volreg_core::filter::MultiResolutionPyramid;
use volreg_core::image::Image;
use volreg_core::transform::{AffineTransform, ParametricTransform};

use crate::cancel::CancellationToken;
use crate::error::RegistrationError;
use crate::metric::{MeanSquaresMetric, Metric, SamplingStrategy};
use crate::observer::{IterationState, ObserverSet};
use crate::optimizer::{
    Optimizer, OptimizerState, RegularStepGradientDescent, ReversalCriterion, StopCondition,
};
use crate::result::{LevelReport, RegistrationResult, TerminationReason};
use crate::validation::{validate_affine_config, AFFINE_PARAMETERS};

/// Configuration for multi-resolution affine registration.
#[derive(Config, Debug, PartialEq)]
pub struct AffineRegistrationConfig {
    /// Number of pyramid levels, coarsest first.
    #[config(default = "3")]
    pub number_of_levels: usize,
    /// Maximum optimizer step length per level, non-increasing.
    #[config(default = "vec![0.0625, 0.03125, 0.015625]")]
    pub max_step_lengths: Vec<f64>,
    #[config(default = "1e-3")]
    pub min_step_length: f64,
    #[config(default = "1e-4")]
    pub gradient_tolerance: f64,
    /// Iteration cap per level.
    #[config(default = "100")]
    pub max_iterations: usize,
    #[config(default = "0.5")]
    pub relaxation_factor: f64,
    /// One scale per affine parameter; all ones when absent.
    pub parameter_scales: Option<Vec<f64>>,
    #[config(default = "SamplingStrategy::Dense")]
    pub sampling: SamplingStrategy,
    #[config(default = "0.95")]
    pub max_excluded_fraction: f64,
    /// When the step is relaxed. `Direction` (gradient dot product below
    /// zero) ignores a sign flip in one weak component that `AnyComponent`
    /// would treat as a reversal, so steps shrink less eagerly.
    #[config(default = "ReversalCriterion::Direction")]
    pub reversal_criterion: ReversalCriterion,
    /// Move the transform centre to the physical centre of the fixed image.
    #[config(default = "true")]
    pub center_on_fixed: bool,
}

/// Step lengths starting at `initial` and halving at every finer level.
pub fn halving_step_schedule(initial: f64, levels: usize) -> Vec<f64> {
    (0..levels).map(|level| initial / 2f64.powi(level as i32)).collect()
}

impl AffineRegistrationConfig {
    /// Same configuration with `levels` pyramid levels. The step schedule is
    /// rebuilt by halving from the current coarsest step length.
    pub fn with_levels(self, levels: usize) -> Self {
        let initial = self.max_step_lengths.first().copied().unwrap_or(0.0625);
        self.with_number_of_levels(levels)
            .with_max_step_lengths(halving_step_schedule(initial, levels))
    }
}

enum LevelOutcome {
    Finished(OptimizerState),
    Aborted { iteration: usize, error: RegistrationError },
}

/// Multi-resolution registration framework.
///
/// Orchestrates the registration process across multiple resolution levels
/// (coarse-to-fine) to improve robustness and convergence range. Each level
/// runs regular-step gradient descent on the mean squares metric, seeded
/// with the parameters of the last level that finished cleanly.
#[derive(Debug, Clone)]
pub struct MultiResolutionRegistration {
    config: AffineRegistrationConfig,
}

impl MultiResolutionRegistration {
    /// Create the registration. Fails on an invalid configuration.
    pub fn new(config: AffineRegistrationConfig) -> crate::error::Result<Self> {
        validate_affine_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AffineRegistrationConfig {
        &self.config
    }

    fn optimizer(&self) -> crate::error::Result<RegularStepGradientDescent> {
        let scales = self
            .config
            .parameter_scales
            .clone()
            .unwrap_or_else(|| vec![1.0; AFFINE_PARAMETERS]);
        Ok(RegularStepGradientDescent::new(
            scales,
            self.config.min_step_length,
            self.config.gradient_tolerance,
            self.config.relaxation_factor,
            self.config.max_iterations,
        )?
        .with_reversal_criterion(self.config.reversal_criterion))
    }

    /// Execute the multi-resolution registration.
    ///
    /// # Arguments
    /// * `fixed` - The fixed image
    /// * `moving` - The moving image
    /// * `initial` - The starting transform, mapping fixed space into moving space
    /// * `observers` - Notified once per optimizer iteration
    /// * `cancel` - Checked at every level and iteration boundary
    ///
    /// A level whose metric fails is abandoned and the run continues from the
    /// last good parameters; the result is then flagged `degraded`.
    pub fn execute<B: Backend>(
        &self,
        fixed: &Image<B, 3>,
        moving: &Image<B, 3>,
        initial: AffineTransform<3>,
        observers: &ObserverSet<B>,
        cancel: &CancellationToken,
    ) -> crate::error::Result<RegistrationResult<AffineTransform<3>>> {
        let start = Instant::now();
        let optimizer = self.optimizer()?;
        let levels = self.config.number_of_levels;

        let mut transform = if self.config.center_on_fixed {
            initial.with_center(fixed.geometry().physical_center())
        } else {
            initial
        };
        let mut last_good = transform.parameters();

        observers.start();

        let fixed_pyramid = MultiResolutionPyramid::new(fixed, levels);
        let moving_pyramid = MultiResolutionPyramid::new(moving, levels);

        let mut reports = Vec::with_capacity(levels);
        let mut total_iterations = 0;
        let mut final_value = f64::NAN;
        let mut degraded = false;
        let mut termination = TerminationReason::Completed;

        for level in 0..levels {
            if cancel.is_cancelled() {
                termination = TerminationReason::Cancelled;
                break;
            }
            let (Some(fixed_level), Some(moving_level)) =
                (fixed_pyramid.get_level(level), moving_pyramid.get_level(level))
            else {
                return Err(RegistrationError::configuration(format!("pyramid level {} missing", level)));
            };
            let max_step = self.config.max_step_lengths[level];

            info!(
                "Starting level {}/{} with max step {}, iters={}",
                level + 1,
                levels,
                max_step,
                self.config.max_iterations
            );
            info!("  Fixed size: {:?}", fixed_level.shape());
            info!("  Moving size: {:?}", moving_level.shape());

            let outcome = self.run_level(
                level,
                fixed_level,
                moving_level,
                &mut transform,
                &optimizer,
                optimizer.initialize(last_good.clone(), max_step),
                observers,
                cancel,
            );

            let (iterations, value, stop) = match outcome {
                LevelOutcome::Finished(state) => {
                    last_good = state.parameters.clone();
                    if state.iteration > 0 {
                        final_value = state.value;
                    }
                    info!(
                        "Level {} stopped after {} iterations ({:?}), metric {:.6}",
                        level + 1,
                        state.iteration,
                        state.stop,
                        state.value
                    );
                    (state.iteration, state.value, state.stop)
                }
                LevelOutcome::Aborted { iteration, error } => {
                    if matches!(error, RegistrationError::Configuration(_)) {
                        observers.error(&error.to_string());
                        return Err(error);
                    }
                    let stop = match error {
                        RegistrationError::DegenerateOverlap { .. } | RegistrationError::GeometryMismatch(_) => {
                            StopCondition::NoOverlap
                        }
                        RegistrationError::Image(volreg_core::ImageError::GeometryMismatch(_)) => {
                            StopCondition::NoOverlap
                        }
                        _ => StopCondition::Failed,
                    };
                    warn!(
                        "Level {} aborted at iteration {}: {}; keeping last good parameters",
                        level + 1,
                        iteration,
                        error
                    );
                    degraded = true;
                    (iteration, f64::NAN, stop)
                }
            };

            transform.set_parameters(&last_good)?;
            total_iterations += iterations;
            reports.push(LevelReport {
                level,
                size: fixed_level.shape(),
                max_step_length: max_step,
                iterations,
                final_value: value,
                stop,
            });

            if stop == StopCondition::Cancelled {
                termination = TerminationReason::Cancelled;
                break;
            }
        }

        let result = RegistrationResult {
            transform,
            iterations: total_iterations,
            final_value,
            termination,
            levels: reports,
            degraded,
        };
        observers.complete(&result.summary(start.elapsed()));
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_level<B: Backend>(
        &self,
        level: usize,
        fixed: &Image<B, 3>,
        moving: &Image<B, 3>,
        transform: &mut AffineTransform<3>,
        optimizer: &RegularStepGradientDescent,
        mut state: OptimizerState,
        observers: &ObserverSet<B>,
        cancel: &CancellationToken,
    ) -> LevelOutcome {
        let metric = match MeanSquaresMetric::new(
            fixed,
            moving,
            self.config.sampling,
            self.config.max_excluded_fraction,
        ) {
            Ok(metric) => metric,
            Err(error) => return LevelOutcome::Aborted { iteration: 0, error },
        };
        debug!("Level {} uses {} samples", level + 1, metric.number_of_samples());

        while state.stop.is_running() {
            if cancel.is_cancelled() {
                state.stop = StopCondition::Cancelled;
                break;
            }
            if optimizer.is_exhausted(&state) {
                state.stop = StopCondition::MaximumIterations;
                break;
            }

            let step = transform
                .set_parameters(&state.parameters)
                .map_err(RegistrationError::from)
                .and_then(|_| metric.evaluate(&*transform))
                .and_then(|eval| {
                    optimizer.advance(&mut state, eval.value, &eval.derivative)?;
                    Ok(eval.value)
                });
            let value = match step {
                Ok(value) => value,
                Err(error) => {
                    return LevelOutcome::Aborted {
                        iteration: state.iteration,
                        error,
                    }
                }
            };

            state.iteration += 1;
            observers.iteration(&IterationState::Affine {
                level,
                iteration: state.iteration,
                value,
                step_length: state.step_length,
                parameters: &state.parameters,
            });
        }

        LevelOutcome::Finished(state)
    }
}
