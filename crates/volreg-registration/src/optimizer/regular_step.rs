//! Regular-step gradient descent.

use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::{RegistrationError, Result};
use super::trait_::{Optimizer, OptimizerState, StopCondition};

/// How a direction reversal is detected between consecutive gradients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReversalCriterion {
    /// The scaled gradients point in opposing directions (negative dot product).
    Direction,
    /// Any single component changed sign.
    AnyComponent,
}

impl Default for ReversalCriterion {
    fn default() -> Self {
        Self::Direction
    }
}

/// Gradient descent with a fixed step length that shrinks on reversal.
///
/// Each step moves the parameters a distance `step_length` along the
/// normalized scaled gradient:
///
/// `p_j -= step_length * (g_j / s_j) / |g / s| / s_j`
///
/// When the gradient reverses direction the step length is multiplied by the
/// relaxation factor. The run stops once the scaled gradient magnitude falls
/// below the tolerance, the step length falls below its minimum, or the
/// iteration cap is reached.
#[derive(Debug, Clone)]
pub struct RegularStepGradientDescent {
    min_step_length: f64,
    gradient_tolerance: f64,
    relaxation_factor: f64,
    max_iterations: usize,
    scales: Vec<f64>,
    reversal: ReversalCriterion,
}

impl RegularStepGradientDescent {
    /// Create a new optimizer.
    ///
    /// # Arguments
    /// * `scales` - One positive scale per parameter; larger scales mean
    ///   smaller moves for that parameter
    pub fn new(
        scales: Vec<f64>,
        min_step_length: f64,
        gradient_tolerance: f64,
        relaxation_factor: f64,
        max_iterations: usize,
    ) -> Result<Self> {
        if let Some(bad) = scales.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(RegistrationError::configuration(format!(
                "parameter scales must be positive, got {}",
                bad
            )));
        }
        if !(relaxation_factor > 0.0 && relaxation_factor < 1.0) {
            return Err(RegistrationError::configuration(format!(
                "relaxation factor must lie in (0, 1), got {}",
                relaxation_factor
            )));
        }
        if !(min_step_length >= 0.0) || !(gradient_tolerance >= 0.0) {
            return Err(RegistrationError::configuration(
                "step length and gradient tolerances must be non-negative",
            ));
        }
        Ok(Self {
            min_step_length,
            gradient_tolerance,
            relaxation_factor,
            max_iterations,
            scales,
            reversal: ReversalCriterion::default(),
        })
    }

    pub fn with_reversal_criterion(mut self, reversal: ReversalCriterion) -> Self {
        self.reversal = reversal;
        self
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    fn reversed(&self, scaled: &[f64], previous: &[f64]) -> bool {
        match self.reversal {
            ReversalCriterion::Direction => {
                scaled.iter().zip(previous).map(|(a, b)| a * b).sum::<f64>() < 0.0
            }
            ReversalCriterion::AnyComponent => scaled.iter().zip(previous).any(|(a, b)| a * b < 0.0),
        }
    }
}

impl Optimizer for RegularStepGradientDescent {
    fn initialize(&self, parameters: Vec<f64>, step_length: f64) -> OptimizerState {
        OptimizerState::new(parameters, step_length)
    }

    fn is_exhausted(&self, state: &OptimizerState) -> bool {
        state.iteration >= self.max_iterations
    }

    fn advance(&self, state: &mut OptimizerState, value: f64, gradient: &[f64]) -> Result<()> {
        let n = state.parameters.len();
        if gradient.len() != n || self.scales.len() != n {
            return Err(RegistrationError::configuration(format!(
                "expected {} gradient entries and scales, got {} and {}",
                n,
                gradient.len(),
                self.scales.len()
            )));
        }
        if gradient.iter().any(|g| !g.is_finite()) {
            return Err(RegistrationError::numeric_instability("non-finite metric gradient"));
        }

        state.previous_value = state.value;
        state.value = value;
        state.previous_gradient = std::mem::replace(&mut state.gradient, gradient.to_vec());

        let scaled: Vec<f64> = gradient.iter().zip(&self.scales).map(|(g, s)| g / s).collect();
        let previous_scaled: Vec<f64> = state
            .previous_gradient
            .iter()
            .zip(&self.scales)
            .map(|(g, s)| g / s)
            .collect();
        let magnitude = scaled.iter().map(|g| g * g).sum::<f64>().sqrt();

        if magnitude < self.gradient_tolerance {
            state.stop = StopCondition::GradientTolerance;
            return Ok(());
        }

        if self.reversed(&scaled, &previous_scaled) {
            state.step_length *= self.relaxation_factor;
            debug!("gradient reversed, step length relaxed to {:e}", state.step_length);
        }

        if state.step_length < self.min_step_length {
            state.stop = StopCondition::StepTooSmall;
            return Ok(());
        }

        let factor = state.step_length / magnitude;
        for ((p, g), s) in state.parameters.iter_mut().zip(&scaled).zip(&self.scales) {
            *p -= factor * g / s;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optimizer(n: usize) -> RegularStepGradientDescent {
        RegularStepGradientDescent::new(vec![1.0; n], 1e-3, 1e-6, 0.5, 100).unwrap()
    }

    #[test]
    fn test_step_has_requested_length() {
        let opt = optimizer(2);
        let mut state = opt.initialize(vec![0.0, 0.0], 0.5);
        opt.advance(&mut state, 1.0, &[3.0, 4.0]).unwrap();
        assert!((state.parameters[0] + 0.3).abs() < 1e-12);
        assert!((state.parameters[1] + 0.4).abs() < 1e-12);
        assert!(state.stop.is_running());
    }

    #[test]
    fn test_reversal_relaxes_step() {
        let opt = optimizer(1);
        let mut state = opt.initialize(vec![0.0], 1.0);
        opt.advance(&mut state, 1.0, &[1.0]).unwrap();
        assert_eq!(state.step_length, 1.0);
        opt.advance(&mut state, 0.5, &[-1.0]).unwrap();
        assert_eq!(state.step_length, 0.5);
        assert!((state.parameters[0] - (-0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_any_component_criterion() {
        let direction = optimizer(2);
        let any = optimizer(2).with_reversal_criterion(ReversalCriterion::AnyComponent);

        let mut a = direction.initialize(vec![0.0, 0.0], 1.0);
        let mut b = any.initialize(vec![0.0, 0.0], 1.0);
        for (opt, state) in [(&direction, &mut a), (&any, &mut b)] {
            opt.advance(state, 1.0, &[10.0, 1.0]).unwrap();
            opt.advance(state, 1.0, &[10.0, -1.0]).unwrap();
        }
        assert_eq!(a.step_length, 1.0);
        assert_eq!(b.step_length, 0.5);
    }

    #[test]
    fn test_small_gradient_stops() {
        let opt = optimizer(1);
        let mut state = opt.initialize(vec![2.0], 1.0);
        opt.advance(&mut state, 0.0, &[1e-9]).unwrap();
        assert_eq!(state.stop, StopCondition::GradientTolerance);
        assert_eq!(state.parameters, vec![2.0]);
    }

    #[test]
    fn test_step_too_small_stops() {
        let opt = RegularStepGradientDescent::new(vec![1.0], 0.3, 1e-6, 0.5, 100).unwrap();
        let mut state = opt.initialize(vec![0.0], 0.5);
        opt.advance(&mut state, 1.0, &[1.0]).unwrap();
        opt.advance(&mut state, 1.0, &[-1.0]).unwrap();
        assert_eq!(state.stop, StopCondition::StepTooSmall);
        assert!((state.parameters[0] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_scales_shrink_moves() {
        let opt = RegularStepGradientDescent::new(vec![1.0, 10.0], 1e-3, 1e-9, 0.5, 100).unwrap();
        let mut state = opt.initialize(vec![0.0, 0.0], 1.0);
        opt.advance(&mut state, 1.0, &[1.0, 10.0]).unwrap();
        // Scaled gradient is (1, 1); the second parameter moves a tenth as far.
        let moved = state.parameters[1] / state.parameters[0];
        assert!((moved - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_quadratic_converges() {
        let opt = RegularStepGradientDescent::new(vec![1.0, 1.0], 1e-6, 1e-8, 0.5, 500).unwrap();
        let mut state = opt.initialize(vec![3.0, -2.0], 1.0);
        while state.stop.is_running() && !opt.is_exhausted(&state) {
            let p = state.parameters.clone();
            let value = p[0] * p[0] + p[1] * p[1];
            opt.advance(&mut state, value, &[2.0 * p[0], 2.0 * p[1]]).unwrap();
            state.iteration += 1;
        }
        assert!(state.parameters.iter().all(|p| p.abs() < 1e-3), "{:?}", state.parameters);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(RegularStepGradientDescent::new(vec![0.0], 1e-3, 1e-4, 0.5, 10).is_err());
        assert!(RegularStepGradientDescent::new(vec![1.0], 1e-3, 1e-4, 1.5, 10).is_err());
        let opt = optimizer(2);
        let mut state = opt.initialize(vec![0.0, 0.0], 1.0);
        assert!(opt.advance(&mut state, 0.0, &[1.0]).is_err());
        assert!(matches!(
            opt.advance(&mut state, 0.0, &[f64::NAN, 0.0]),
            Err(RegistrationError::NumericInstability(_))
        ));
    }
}
