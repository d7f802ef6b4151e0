//! Dripper settings and process configuration.
//!
//! [`Settings`] are the user-tunable pump parameters, persisted through a
//! [`ConfigPort`](crate::app::ports::ConfigPort).  [`AppConfig`] is the
//! process-level configuration, built from defaults, an optional JSON file
//! and `COLD_BREW_*` environment overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Highest power level the motor driver accepts.
pub const MAX_SPEED_LEVEL: u16 = 255;

/// Longest accepted pulse-on time.
pub const MAX_DRIP_DURATION_MS: u32 = 60_000;

/// Prefix for every environment override.
pub const ENV_PREFIX: &str = "COLD_BREW_";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Pump parameters.  Immutable once built; replaced as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Pulse-on time per drip, in milliseconds.
    #[serde(rename = "dripDuration")]
    pub drip_duration_ms: u32,
    /// Slowest level at which the motor still rotates.
    pub drip_speed: u16,
    /// Full-run level.
    pub run_speed: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            drip_duration_ms: 250,
            drip_speed: 100,
            run_speed: MAX_SPEED_LEVEL,
        }
    }
}

impl Settings {
    /// Check `0 < drip_speed <= run_speed <= MAX_SPEED_LEVEL` and the duration range.
    pub fn validate(&self) -> Result<()> {
        if self.drip_speed == 0 {
            return Err(Error::InvalidSettings("dripSpeed must be greater than 0"));
        }
        if self.drip_speed > self.run_speed {
            return Err(Error::InvalidSettings("dripSpeed must not exceed runSpeed"));
        }
        if self.run_speed > MAX_SPEED_LEVEL {
            return Err(Error::InvalidSettings("runSpeed must be 0-255"));
        }
        if self.drip_duration_ms == 0 || self.drip_duration_ms > MAX_DRIP_DURATION_MS {
            return Err(Error::InvalidSettings("dripDuration must be 1-60000 ms"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Process configuration
// ---------------------------------------------------------------------------

/// Deployment environment the service runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl core::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            other => bail!("invalid environment supplied: {other:?}"),
        }
    }
}

/// Motor HAT binding parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorHatConfig {
    /// Linux I2C character device the HAT sits on.
    pub i2c_device: PathBuf,
    /// 7-bit I2C address of the PCA9685.
    pub i2c_address: u8,
    /// Motor terminal, indexed from zero (M1 = 0).
    pub motor: u8,
    pub pwm_frequency_hz: u16,
}

impl Default for MotorHatConfig {
    fn default() -> Self {
        Self {
            i2c_device: PathBuf::from("/dev/i2c-1"),
            i2c_address: 0x60,
            motor: 2,
            pwm_frequency_hz: 1600,
        }
    }
}

/// Process-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    /// Root directory of the file-backed settings store.
    pub settings_dir: PathBuf,
    /// Default `env_logger` filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub motor: MotorHatConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            settings_dir: PathBuf::from("/var/lib/coldbrew"),
            log_level: "info".into(),
            motor: MotorHatConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the first config file found on the search path, then
    /// apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok();
        let file = search_paths(&lookup).into_iter().find(|p| p.is_file());
        Self::from_sources(file.as_deref(), lookup)
    }

    /// Build from an optional file and an environment lookup function.
    pub fn from_sources(
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let mut cfg = match file {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Self::default(),
        };

        if let Some(env_name) = env(&format!("{ENV_PREFIX}ENVIRONMENT")) {
            cfg.environment = env_name.parse()?;
        }
        if let Some(dir) = env(&format!("{ENV_PREFIX}SETTINGS_DIR")) {
            cfg.settings_dir = PathBuf::from(dir);
        }
        if let Some(level) = env(&format!("{ENV_PREFIX}LOG_LEVEL")) {
            cfg.log_level = level;
        }
        if let Some(device) = env(&format!("{ENV_PREFIX}I2C_DEVICE")) {
            cfg.motor.i2c_device = PathBuf::from(device);
        }
        if cfg.motor.motor > 3 {
            bail!("motor index must be 0-3, got {}", cfg.motor.motor);
        }
        Ok(cfg)
    }
}

/// Candidate config files, most specific first.
fn search_paths(env: &impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(explicit) = env(&format!("{ENV_PREFIX}CONFIG")) {
        paths.push(PathBuf::from(explicit));
    }
    paths.push(PathBuf::from("/etc/coldbrew/config.json"));
    if let Some(home) = env("HOME") {
        paths.push(Path::new(&home).join(".coldbrew").join("config.json"));
    }
    paths
}
