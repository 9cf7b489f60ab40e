//! NIfTI reading and writing for volreg images.

pub mod error;
pub mod nifti_io;

pub use error::{IoError, Result};
pub use nifti_io::{read_image, write_image};
