//! Validation of registration configurations.
//!
//! Every check runs before any image work starts, so a bad configuration
//! fails fast with [`RegistrationError::Configuration`].

use volreg_core::filter::MAX_PYRAMID_LEVELS;

use crate::demons::DemonsConfig;
use crate::error::{RegistrationError, Result};
use crate::metric::SamplingStrategy;
use crate::multires::AffineRegistrationConfig;

/// Number of parameters of a 3-D affine transform.
pub const AFFINE_PARAMETERS: usize = 12;

/// Validate a per-level step length schedule.
///
/// The schedule must have one entry per level, every entry positive and
/// finite, and never increase from coarse to fine.
pub fn validate_step_schedule(step_lengths: &[f64], levels: usize) -> Result<()> {
    if step_lengths.len() != levels {
        return Err(RegistrationError::configuration(format!(
            "expected {} step lengths, got {}",
            levels,
            step_lengths.len()
        )));
    }
    if let Some(bad) = step_lengths.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
        return Err(RegistrationError::configuration(format!(
            "step lengths must be positive, got {}",
            bad
        )));
    }
    if let Some(pair) = step_lengths.windows(2).find(|w| w[1] > w[0]) {
        return Err(RegistrationError::configuration(format!(
            "step lengths must not increase from coarse to fine: {} then {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

/// Validate iteration count.
pub fn validate_iterations(iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(RegistrationError::configuration("Iterations must be positive"));
    }
    if iterations > 1_000_000 {
        return Err(RegistrationError::configuration(format!(
            "Iterations too large: {}",
            iterations
        )));
    }
    Ok(())
}

fn validate_fraction(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(RegistrationError::configuration(format!(
            "{} must lie in [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_non_negative(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(RegistrationError::configuration(format!(
            "{} must be non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Validate an affine registration configuration.
pub fn validate_affine_config(config: &AffineRegistrationConfig) -> Result<()> {
    if config.number_of_levels == 0 {
        return Err(RegistrationError::configuration("at least one pyramid level is required"));
    }
    if config.number_of_levels > MAX_PYRAMID_LEVELS {
        return Err(RegistrationError::configuration(format!(
            "at most {} pyramid levels are supported, got {}",
            MAX_PYRAMID_LEVELS, config.number_of_levels
        )));
    }
    validate_step_schedule(&config.max_step_lengths, config.number_of_levels)?;
    validate_iterations(config.max_iterations)?;
    validate_non_negative("min_step_length", config.min_step_length)?;
    validate_non_negative("gradient_tolerance", config.gradient_tolerance)?;
    if !(config.relaxation_factor > 0.0 && config.relaxation_factor < 1.0) {
        return Err(RegistrationError::configuration(format!(
            "relaxation_factor must lie in (0, 1), got {}",
            config.relaxation_factor
        )));
    }
    validate_fraction("max_excluded_fraction", config.max_excluded_fraction)?;
    if let SamplingStrategy::Sparse(0) = config.sampling {
        return Err(RegistrationError::configuration("sparse sampling stride must be positive"));
    }
    if let Some(scales) = &config.parameter_scales {
        if scales.len() != AFFINE_PARAMETERS {
            return Err(RegistrationError::configuration(format!(
                "expected {} parameter scales, got {}",
                AFFINE_PARAMETERS,
                scales.len()
            )));
        }
        if let Some(bad) = scales.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(RegistrationError::configuration(format!(
                "parameter scales must be positive, got {}",
                bad
            )));
        }
    }
    Ok(())
}

/// Validate a demons configuration. Zero iterations is allowed.
pub fn validate_demons_config(config: &DemonsConfig) -> Result<()> {
    if config.iterations > 1_000_000 {
        return Err(RegistrationError::configuration(format!(
            "Iterations too large: {}",
            config.iterations
        )));
    }
    validate_non_negative("standard_deviation", config.standard_deviation)?;
    validate_non_negative("intensity_difference_threshold", config.intensity_difference_threshold)?;
    validate_non_negative("denominator_threshold", config.denominator_threshold)?;
    if config.max_kernel_width == 0 {
        return Err(RegistrationError::configuration("max_kernel_width must be positive"));
    }
    if let Some(rms) = config.early_stop_rms {
        validate_non_negative("early_stop_rms", rms)?;
    }
    Ok(())
}
