//! Outbound application events.
//!
//! The [`PumpController`](super::service::PumpController) emits these
//! through the [`EventSink`](super::ports::EventSink) port when it handles
//! a command.  Adapters on the other side decide what to do with them.

use crate::config::Settings;

use super::mode::Mode;
use super::service::Snapshot;

/// Structured events emitted by the pump core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The operating mode changed.
    ModeChanged { from: Mode, to: Mode },

    /// The drip target now reads this many drips per minute.
    RateChanged(f64),

    /// New settings are active and the motor driver was re-initialised.
    Reconfigured(Settings),

    /// Status requested by a client.
    Status(Snapshot),
}
