//! Outcome types returned by the registration engines.

use std::time::Duration;
use crate::optimizer::StopCondition;

/// Why a registration run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Every level (or every demons iteration) ran to its own stop condition.
    Completed,
    /// The demons RMS update fell below the early-stop threshold.
    Converged,
    /// The cancellation token was set.
    Cancelled,
}

/// What happened at one pyramid level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelReport {
    pub level: usize,
    /// Size of the fixed image at this level, in tensor order.
    pub size: [usize; 3],
    pub max_step_length: f64,
    pub iterations: usize,
    pub final_value: f64,
    pub stop: StopCondition,
}

/// Summary handed to observers when a run finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationSummary {
    pub iterations: usize,
    pub final_value: f64,
    pub termination: TerminationReason,
    pub degraded: bool,
    pub elapsed: Duration,
}

/// A registered transform with its diagnostics.
#[derive(Debug, Clone)]
pub struct RegistrationResult<T> {
    pub transform: T,
    /// Total optimizer or demons iterations across all levels.
    pub iterations: usize,
    pub final_value: f64,
    pub termination: TerminationReason,
    /// Per-level reports; empty for demons runs.
    pub levels: Vec<LevelReport>,
    /// Set when a level failed and parameters were carried over from the
    /// last good level.
    pub degraded: bool,
}

impl<T> RegistrationResult<T> {
    pub fn summary(&self, elapsed: Duration) -> RegistrationSummary {
        RegistrationSummary {
            iterations: self.iterations,
            final_value: self.final_value,
            termination: self.termination,
            degraded: self.degraded,
            elapsed,
        }
    }

    /// Replace the transform, keeping the diagnostics.
    pub fn map_transform<U>(self, f: impl FnOnce(T) -> U) -> RegistrationResult<U> {
        RegistrationResult {
            transform: f(self.transform),
            iterations: self.iterations,
            final_value: self.final_value,
            termination: self.termination,
            levels: self.levels,
            degraded: self.degraded,
        }
    }
}
