//! Unified error type for the pump control core.
//!
//! Every public controller operation returns [`Result`].  Variants are
//! `Copy` so a failed pulse or transition can be logged, counted and
//! returned without allocation.

use core::fmt;

use crate::app::ports::MotorError;

/// Every fallible controller operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A motor capability call (start, set speed, engage, release) failed.
    HardwareCommandFailed(MotorError),
    /// Settings were rejected before any hardware call was made.
    InvalidSettings(&'static str),
    /// A drip rate that is negative or not a finite number.
    InvalidRate,
    /// The pulsing thread could not be created.
    TaskSpawn,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardwareCommandFailed(e) => write!(f, "hardware command failed: {e}"),
            Self::InvalidSettings(msg) => write!(f, "invalid settings: {msg}"),
            Self::InvalidRate => write!(f, "drip rate must be a finite number >= 0"),
            Self::TaskSpawn => write!(f, "could not spawn the pulsing task"),
        }
    }
}

impl std::error::Error for Error {}

impl From<MotorError> for Error {
    fn from(e: MotorError) -> Self {
        Self::HardwareCommandFailed(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
