//! Registration engines for volreg.
//!
//! Multi-resolution affine registration driven by regular-step gradient
//! descent over a mean squares metric, and demons deformable registration.
//! Both report progress through [`observer::ObserverSet`] and honour a
//! [`cancel::CancellationToken`].

pub mod error;
pub mod metric;
pub mod optimizer;
pub mod multires;
pub mod demons;
pub mod observer;
pub mod cancel;
pub mod result;
pub mod validation;
pub mod pipeline;

pub use error::{RegistrationError, Result};
pub use cancel::CancellationToken;
pub use demons::{DemonsConfig, DemonsRegistration};
pub use multires::{AffineRegistrationConfig, MultiResolutionRegistration};
pub use observer::{
    checkpoint_path, CheckpointObserver, ConsoleObserver, HistoryObserver, IterationObserver,
    IterationState, ObserverSet,
};
pub use pipeline::{register_affine, AffineOutput, DeformableOutput, DeformablePipeline};
pub use result::{LevelReport, RegistrationResult, RegistrationSummary, TerminationReason};
