//! End-to-end affine and deformable workflows.
//!
//! Each workflow runs its registration engine, then resamples the moving
//! image onto the fixed grid through the registered transform.

use burn::tensor::backend::Backend;
use tracing::info;
use volreg_core::filter::{HistogramMatchingConfig, HistogramMatchingFilter, ResampleImageFilter};
use volreg_core::image::Image;
use volreg_core::interpolation::LinearInterpolator;
use volreg_core::spatial::Point;
use volreg_core::transform::{AffineTransform, DisplacementField, IdentityTransform};

use crate::cancel::CancellationToken;
use crate::demons::{DemonsConfig, DemonsRegistration};
use crate::error::Result;
use crate::multires::{AffineRegistrationConfig, MultiResolutionRegistration};
use crate::observer::ObserverSet;
use crate::result::RegistrationResult;

/// Output of an affine workflow.
#[derive(Debug, Clone)]
pub struct AffineOutput<B: Backend> {
    /// Moving image resampled onto the fixed grid.
    pub image: Image<B, 3>,
    pub result: RegistrationResult<AffineTransform<3>>,
}

/// Register `moving` to `fixed` starting from the identity.
pub fn register_affine<B: Backend>(
    fixed: &Image<B, 3>,
    moving: &Image<B, 3>,
    config: AffineRegistrationConfig,
    observers: &ObserverSet<B>,
    cancel: &CancellationToken,
) -> Result<AffineOutput<B>> {
    let registration = MultiResolutionRegistration::new(config)?;
    let result = registration.execute(
        fixed,
        moving,
        AffineTransform::identity(Point::origin()),
        observers,
        cancel,
    )?;
    let image = ResampleImageFilter::new_from_reference(fixed, result.transform, LinearInterpolator::new())
        .apply(moving);
    Ok(AffineOutput { image, result })
}

/// Output of a deformable workflow.
#[derive(Debug, Clone)]
pub struct DeformableOutput<B: Backend> {
    /// Histogram-matched moving image warped onto the fixed grid.
    pub image: Image<B, 3>,
    pub result: RegistrationResult<DisplacementField<B>>,
}

/// Histogram matching followed by demons.
#[derive(Debug, Clone)]
pub struct DeformablePipeline {
    matching: HistogramMatchingFilter,
    demons: DemonsRegistration,
}

impl DeformablePipeline {
    pub fn new(demons: DemonsConfig, matching: HistogramMatchingConfig) -> Result<Self> {
        Ok(Self {
            matching: HistogramMatchingFilter::new(matching),
            demons: DemonsRegistration::new(demons)?,
        })
    }

    /// Bring `moving` onto the fixed grid and match its intensities to the
    /// fixed image.
    pub fn normalize<B: Backend>(&self, fixed: &Image<B, 3>, moving: &Image<B, 3>) -> Result<Image<B, 3>> {
        let moving = match fixed.geometry().ensure_matches(&moving.geometry()) {
            Ok(()) => moving.clone(),
            Err(mismatch) => {
                info!("Resampling moving image onto the fixed grid ({})", mismatch);
                ResampleImageFilter::new_from_reference(fixed, IdentityTransform::<3>, LinearInterpolator::new())
                    .apply(moving)
            }
        };
        Ok(self.matching.apply(&moving, fixed)?)
    }

    /// Run demons on a moving image already normalized onto the fixed grid.
    pub fn register<B: Backend>(
        &self,
        fixed: &Image<B, 3>,
        matched: &Image<B, 3>,
        observers: &ObserverSet<B>,
        cancel: &CancellationToken,
    ) -> Result<DeformableOutput<B>> {
        let result = self.demons.execute(fixed, matched, None, observers, cancel)?;
        let image = ResampleImageFilter::new_from_reference(fixed, result.transform.clone(), LinearInterpolator::new())
            .apply(matched);
        Ok(DeformableOutput { image, result })
    }

    /// Normalize, then register.
    pub fn run<B: Backend>(
        &self,
        fixed: &Image<B, 3>,
        moving: &Image<B, 3>,
        observers: &ObserverSet<B>,
        cancel: &CancellationToken,
    ) -> Result<DeformableOutput<B>> {
        let matched = self.normalize(fixed, moving)?;
        self.register(fixed, &matched, observers, cancel)
    }
}
