//! Iteration observers for registration loops.
//!
//! The affine and demons loops report every iteration through an
//! [`ObserverSet`]. Observers receive shared snapshots of the loop state and
//! cannot influence the run.

use std::fmt::Display;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use burn::tensor::backend::Backend;
use volreg_core::filter::ResampleImageFilter;
use volreg_core::image::Image;
use volreg_core::interpolation::LinearInterpolator;
use volreg_core::transform::DisplacementField;

use crate::result::RegistrationSummary;

/// Snapshot of the loop state after one iteration.
#[derive(Debug)]
pub enum IterationState<'a, B: Backend> {
    Affine {
        level: usize,
        iteration: usize,
        value: f64,
        step_length: f64,
        parameters: &'a [f64],
    },
    Demons {
        iteration: usize,
        /// Mean squared difference before this iteration's update.
        value: f64,
        rms_update: f64,
        unstable_voxels: usize,
        field: &'a DisplacementField<B>,
    },
}

impl<B: Backend> IterationState<'_, B> {
    pub fn iteration(&self) -> usize {
        match self {
            Self::Affine { iteration, .. } | Self::Demons { iteration, .. } => *iteration,
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Self::Affine { value, .. } | Self::Demons { value, .. } => *value,
        }
    }
}

/// Observer trait for monitoring registration progress.
pub trait IterationObserver<B: Backend>: Send + Sync {
    /// Called after every iteration.
    fn on_iteration(&self, state: &IterationState<'_, B>);

    /// Called when registration starts.
    fn on_start(&self) {}

    /// Called when registration finishes, including degraded and cancelled runs.
    fn on_complete(&self, _summary: &RegistrationSummary) {}

    /// Called when registration fails.
    fn on_error(&self, _error: &str) {}
}

impl<B, F> IterationObserver<B> for F
where
    B: Backend,
    F: Fn(&IterationState<'_, B>) + Send + Sync,
{
    fn on_iteration(&self, state: &IterationState<'_, B>) {
        self(state)
    }
}

/// Console observer that logs to tracing.
#[derive(Debug, Clone)]
pub struct ConsoleObserver {
    /// Log interval (iterations).
    pub log_interval: usize,
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self { log_interval: 10 }
    }
}

impl ConsoleObserver {
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl<B: Backend> IterationObserver<B> for ConsoleObserver {
    fn on_iteration(&self, state: &IterationState<'_, B>) {
        if state.iteration() % self.log_interval != 0 {
            return;
        }
        match state {
            IterationState::Affine { level, iteration, value, step_length, .. } => {
                tracing::info!(
                    "Level {} | Iter {} | Metric: {:.6} | Step: {:.3e}",
                    level,
                    iteration,
                    value,
                    step_length
                );
            }
            IterationState::Demons { iteration, value, rms_update, unstable_voxels, .. } => {
                tracing::info!(
                    "Iter {} | MSE: {:.6} | RMS update: {:.4e} | Unstable: {}",
                    iteration,
                    value,
                    rms_update,
                    unstable_voxels
                );
            }
        }
    }

    fn on_start(&self) {
        tracing::info!("Registration started");
    }

    fn on_complete(&self, summary: &RegistrationSummary) {
        tracing::info!(
            "Registration finished in {:.2}s after {} iterations ({:?}) with final metric {:.6}{}",
            summary.elapsed.as_secs_f64(),
            summary.iterations,
            summary.termination,
            summary.final_value,
            if summary.degraded { ", degraded" } else { "" }
        );
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Registration failed: {}", error);
    }
}

/// History observer that records `(iteration, value)` pairs.
#[derive(Debug, Clone, Default)]
pub struct HistoryObserver {
    history: Arc<Mutex<Vec<(usize, f64)>>>,
}

impl HistoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the recorded history.
    pub fn history(&self) -> Vec<(usize, f64)> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Recorded values in order.
    pub fn values(&self) -> Vec<f64> {
        self.history().into_iter().map(|(_, v)| v).collect()
    }

    pub fn clear(&self) {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl<B: Backend> IterationObserver<B> for HistoryObserver {
    fn on_iteration(&self, state: &IterationState<'_, B>) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((state.iteration(), state.value()));
    }
}

/// Insert `_iterNNNN` before the file extension, keeping `.nii.gz` intact.
///
/// `out.nii.gz` at iteration 3 becomes `out_iter0003.nii.gz`.
pub fn checkpoint_path(base: &Path, iteration: usize) -> PathBuf {
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = match name.strip_suffix(".nii.gz") {
        Some(stem) => (stem.to_string(), ".nii.gz".to_string()),
        None => match name.rfind('.') {
            Some(dot) if dot > 0 => (name[..dot].to_string(), name[dot..].to_string()),
            _ => (name.clone(), String::new()),
        },
    };
    base.with_file_name(format!("{}_iter{:04}{}", stem, iteration, ext))
}

/// Periodically writes the moving image warped by the current demons field.
///
/// The writer receives the warped image and the checkpoint path. Its failures
/// are logged and never reach the registration loop.
pub struct CheckpointObserver<B: Backend, W> {
    moving: Image<B, 3>,
    base: PathBuf,
    interval: usize,
    writer: W,
    _backend: PhantomData<B>,
}

impl<B, W, E> CheckpointObserver<B, W>
where
    B: Backend,
    W: Fn(&Image<B, 3>, &Path) -> Result<(), E> + Send + Sync,
    E: Display,
{
    /// # Arguments
    /// * `moving` - The image to warp, on its original grid
    /// * `base` - Output path the checkpoint names are derived from
    /// * `interval` - Write every `interval` demons iterations
    /// * `writer` - Persists one checkpoint image
    pub fn new(moving: Image<B, 3>, base: impl Into<PathBuf>, interval: usize, writer: W) -> Self {
        Self {
            moving,
            base: base.into(),
            interval: interval.max(1),
            writer,
            _backend: PhantomData,
        }
    }

    fn write(&self, iteration: usize, field: &DisplacementField<B>) {
        let warped = ResampleImageFilter::new(field.geometry().clone(), field.clone(), LinearInterpolator::new())
            .apply(&self.moving);
        let path = checkpoint_path(&self.base, iteration);
        match (self.writer)(&warped, &path) {
            Ok(()) => tracing::debug!("Wrote checkpoint {}", path.display()),
            Err(e) => tracing::warn!("Failed to write checkpoint {}: {}", path.display(), e),
        }
    }
}

impl<B, W, E> IterationObserver<B> for CheckpointObserver<B, W>
where
    B: Backend,
    W: Fn(&Image<B, 3>, &Path) -> Result<(), E> + Send + Sync,
    E: Display,
{
    fn on_iteration(&self, state: &IterationState<'_, B>) {
        if let IterationState::Demons { iteration, field, .. } = state {
            if *iteration > 0 && iteration % self.interval == 0 {
                self.write(*iteration, field);
            }
        }
    }
}

/// Fans events out to every registered observer.
pub struct ObserverSet<B: Backend> {
    observers: Vec<Arc<dyn IterationObserver<B>>>,
}

impl<B: Backend> Default for ObserverSet<B> {
    fn default() -> Self {
        Self { observers: Vec::new() }
    }
}

impl<B: Backend> Clone for ObserverSet<B> {
    fn clone(&self) -> Self {
        Self {
            observers: self.observers.clone(),
        }
    }
}

impl<B: Backend> ObserverSet<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: Arc<dyn IterationObserver<B>>) {
        self.observers.push(observer);
    }

    pub fn with(mut self, observer: Arc<dyn IterationObserver<B>>) -> Self {
        self.add(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn start(&self) {
        for observer in &self.observers {
            observer.on_start();
        }
    }

    pub fn iteration(&self, state: &IterationState<'_, B>) {
        for observer in &self.observers {
            observer.on_iteration(state);
        }
    }

    pub fn complete(&self, summary: &RegistrationSummary) {
        for observer in &self.observers {
            observer.on_complete(summary);
        }
    }

    pub fn error(&self, error: &str) {
        for observer in &self.observers {
            observer.on_error(error);
        }
    }
}
