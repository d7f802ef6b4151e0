//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PumpController (domain)
//! ```
//!
//! Driven adapters (motor transport, settings storage, event sinks)
//! implement these traits.  The [`PumpController`](super::service::PumpController)
//! consumes them via generics, so the domain core never touches a bus
//! or a file directly.

use crate::config::Settings;

// ───────────────────────────────────────────────────────────────
// Motor port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// The minimal motor capability the pump core depends on.
///
/// One method per hardware operation, no logic.  Implementations must be
/// `Send` because the pulsing task drives the motor from its own thread.
pub trait MotorPort: Send {
    /// Initialise the driver board.  Called once per motor binding.
    fn start(&mut self) -> Result<(), MotorError>;

    /// Set the motor power level (0 = no power, 255 = full).
    fn set_speed(&mut self, level: u16) -> Result<(), MotorError>;

    /// Drive the motor forward at the current level.
    fn engage(&mut self) -> Result<(), MotorError>;

    /// Let the motor coast to a stop.
    fn release(&mut self) -> Result<(), MotorError>;
}

impl<M: MotorPort + ?Sized> MotorPort for Box<M> {
    fn start(&mut self) -> Result<(), MotorError> {
        (**self).start()
    }

    fn set_speed(&mut self, level: u16) -> Result<(), MotorError> {
        (**self).set_speed(level)
    }

    fn engage(&mut self) -> Result<(), MotorError> {
        (**self).engage()
    }

    fn release(&mut self) -> Result<(), MotorError> {
        (**self).release()
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The controller emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port when it handles a command.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persisted settings)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the user-chosen dripper [`Settings`].
///
/// Implementations MUST validate before persisting.  Out-of-range speed
/// levels are rejected with [`ConfigError::ValidationFailed`], never
/// silently clamped.
pub trait ConfigPort {
    /// Load settings from persistent storage.
    fn load(&self) -> Result<Settings, ConfigError>;

    /// Validate and persist settings.
    fn save(&self, settings: &Settings) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`MotorPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorError {
    /// The I2C transaction failed.
    Bus(embedded_hal::i2c::ErrorKind),
    /// A command was issued before [`MotorPort::start`] succeeded.
    NotStarted,
    /// The transport is unavailable for another reason.
    Unavailable(&'static str),
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No settings stored yet (first boot).
    NotFound,
    /// Stored settings could not be parsed.
    Corrupted,
    /// A settings field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError(std::io::ErrorKind),
}

impl core::fmt::Display for MotorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus(kind) => write!(f, "I2C bus error ({:?})", kind),
            Self::NotStarted => write!(f, "motor driver not started"),
            Self::Unavailable(msg) => write!(f, "motor unavailable: {}", msg),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "settings not found"),
            Self::Corrupted => write!(f, "settings corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError(kind) => write!(f, "I/O error ({})", kind),
        }
    }
}

impl std::error::Error for MotorError {}

impl std::error::Error for ConfigError {}
