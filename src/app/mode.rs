//! Operating mode of the pump.
//!
//! ```text
//!            enter_drip              enter_run
//!   ┌─────┐ ───────────▶ ┌──────┐ ───────────▶ ┌─────┐
//!   │ Off │              │ Drip │              │ Run │
//!   └─────┘ ◀─────────── └──────┘ ◀─────────── └─────┘
//!      ▲        stop                enter_drip    │
//!      └──────────────────────────────────────────┘
//!                         stop
//! ```
//!
//! Every mode is reachable from every other; `Off` is initial.

use serde::{Deserialize, Serialize};

/// Top-level operating state of the pump controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Motor released.
    #[default]
    Off,
    /// Motor engaged continuously at the run level.
    Run,
    /// Pulsing task running at the drip level.
    Drip,
}

impl Mode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Run => "run",
            Self::Drip => "drip",
        }
    }
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "run" => Ok(Self::Run),
            "drip" => Ok(Self::Drip),
            _ => Err(UnknownMode),
        }
    }
}

/// Returned when a string names no [`Mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownMode;

impl core::fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown mode (expected off, run or drip)")
    }
}
