//! Inbound commands to the pump controller.
//!
//! These represent actions requested by the outside world (console,
//! network front-end) that [`PumpController::handle_command`]
//! interprets and acts upon.
//!
//! [`PumpController::handle_command`]: super::service::PumpController::handle_command

use crate::config::Settings;

use super::pulse::MAX_DRIPS_PER_MINUTE;

/// Commands that external adapters can send into the pump core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    /// Pulse at the given drips per minute.
    Drip(f64),
    /// Run continuously at full speed (bloom, prime, drain).
    Run,
    /// Stop the pump.
    Off,
    /// Change the drip target without touching the mode.
    SetRate(f64),
    /// Replace the dripper settings.
    Reconfigure(Settings),
    /// Report a status snapshot.
    Status,
}

/// Why a text command was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    UnknownCommand(String),
    MissingArgument(&'static str),
    BadNumber(String),
    RateTooHigh,
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::UnknownCommand(cmd) => write!(f, "unknown command '{}'", cmd),
            Self::MissingArgument(what) => write!(f, "missing argument: {}", what),
            Self::BadNumber(raw) => write!(f, "not a number: '{}'", raw),
            Self::RateTooHigh => {
                write!(f, "drips per minute must not exceed {}", MAX_DRIPS_PER_MINUTE)
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl AppCommand {
    /// Parse one console line, e.g. `drip 60` or `settings 250 100 255`.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(ParseError::Empty)?;

        match verb.to_ascii_lowercase().as_str() {
            "drip" => Ok(Self::Drip(rate_arg(words.next())?)),
            "rate" => Ok(Self::SetRate(rate_arg(words.next())?)),
            "run" => Ok(Self::Run),
            "off" | "stop" => Ok(Self::Off),
            "status" => Ok(Self::Status),
            "settings" => Ok(Self::Reconfigure(Settings {
                drip_duration_ms: number_arg(words.next(), "dripDuration")?,
                drip_speed: number_arg(words.next(), "dripSpeed")?,
                run_speed: number_arg(words.next(), "runSpeed")?,
            })),
            _ => Err(ParseError::UnknownCommand(verb.to_string())),
        }
    }
}

fn rate_arg(word: Option<&str>) -> Result<f64, ParseError> {
    let rate: f64 = number_arg(word, "drips per minute")?;
    if !rate.is_finite() || rate < 0.0 {
        return Err(ParseError::BadNumber(rate.to_string()));
    }
    if rate > MAX_DRIPS_PER_MINUTE {
        return Err(ParseError::RateTooHigh);
    }
    Ok(rate)
}

fn number_arg<T: core::str::FromStr>(word: Option<&str>, what: &'static str) -> Result<T, ParseError> {
    let raw = word.ok_or(ParseError::MissingArgument(what))?;
    raw.parse().map_err(|_| ParseError::BadNumber(raw.to_string()))
}
