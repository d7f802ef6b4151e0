//! Motor binding at startup.
//!
//! Picks the [`MotorPort`] the controller drives: the Motor HAT on a Linux
//! I2C bus in production, or the in-memory [`SimulatedMotor`] in
//! development.  Builds without the `hardware` feature always fall back to
//! the simulation.

use log::{info, warn};

use crate::adapters::sim_motor::SimulatedMotor;
use crate::app::ports::{MotorError, MotorPort};
use crate::config::{Environment, MotorHatConfig};

// ── Error type ────────────────────────────────────────────────

/// Errors while binding the motor transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwInitError {
    /// The I2C character device could not be opened.
    I2cOpen(String),
    /// The HAT rejected its configuration.
    Motor(MotorError),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::I2cOpen(msg) => write!(f, "I2C device open failed: {}", msg),
            Self::Motor(e) => write!(f, "motor HAT binding failed: {}", e),
        }
    }
}

impl std::error::Error for HwInitError {}

// ── Binding ───────────────────────────────────────────────────

/// Which transport [`init_motor`] hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorBinding {
    Simulated,
    MotorHat,
}

/// Transport for `environment` in this build.
pub fn motor_binding(environment: Environment) -> MotorBinding {
    match environment {
        Environment::Production if cfg!(feature = "hardware") => MotorBinding::MotorHat,
        _ => MotorBinding::Simulated,
    }
}

/// Open the motor transport for `environment`.  The driver is not started;
/// the controller does that.
pub fn init_motor(
    environment: Environment,
    config: &MotorHatConfig,
) -> Result<Box<dyn MotorPort>, HwInitError> {
    match motor_binding(environment) {
        MotorBinding::MotorHat => open_motor_hat(config),
        MotorBinding::Simulated => {
            if environment == Environment::Production {
                warn!("hw_init: built without the `hardware` feature, driving the simulated motor");
            } else {
                info!("hw_init(sim): simulated motor");
            }
            Ok(Box::new(SimulatedMotor::new()))
        }
    }
}

#[cfg(feature = "hardware")]
fn open_motor_hat(config: &MotorHatConfig) -> Result<Box<dyn MotorPort>, HwInitError> {
    use linux_embedded_hal::{Delay, I2cdev};

    use super::motor_hat::MotorHat;

    let i2c = I2cdev::new(&config.i2c_device)
        .map_err(|e| HwInitError::I2cOpen(format!("{}: {}", config.i2c_device.display(), e)))?;
    let hat = MotorHat::new(i2c, Delay, config).map_err(HwInitError::Motor)?;
    info!(
        "hw_init: motor HAT M{} on {} @ 0x{:02x}",
        config.motor + 1,
        config.i2c_device.display(),
        config.i2c_address
    );
    Ok(Box::new(hat))
}

#[cfg(not(feature = "hardware"))]
fn open_motor_hat(_config: &MotorHatConfig) -> Result<Box<dyn MotorPort>, HwInitError> {
    Ok(Box::new(SimulatedMotor::new()))
}
