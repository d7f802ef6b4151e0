//! File-backed settings store.
//!
//! Implements [`ConfigPort`] with one JSON document per resource, laid out
//! as `<root>/<collection>/<resource>.json`.  Settings are validated before
//! they are written and again after they are read back.
//!
//! Writes go to a temporary sibling first and are renamed into place, so
//! a crash mid-write never leaves a truncated document behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::Settings;
use crate::error::Error;

const SETTINGS_COLLECTION: &str = "settings";
const SETTINGS_RESOURCE: &str = "dripper";

/// Settings persisted under a root directory.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    root: PathBuf,
}

impl FileSettingsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location of the settings document.
    pub fn path(&self) -> PathBuf {
        self.root
            .join(SETTINGS_COLLECTION)
            .join(format!("{SETTINGS_RESOURCE}.json"))
    }
}

fn validate(settings: &Settings) -> Result<(), ConfigError> {
    settings.validate().map_err(|e| match e {
        Error::InvalidSettings(msg) => ConfigError::ValidationFailed(msg),
        _ => ConfigError::ValidationFailed("settings rejected"),
    })
}

fn io_error(e: &std::io::Error) -> ConfigError {
    ConfigError::IoError(e.kind())
}

impl ConfigPort for FileSettingsStore {
    fn load(&self) -> Result<Settings, ConfigError> {
        let path = self.path();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(ConfigError::NotFound),
            Err(e) => return Err(io_error(&e)),
        };
        let settings: Settings =
            serde_json::from_str(&text).map_err(|_| ConfigError::Corrupted)?;
        validate(&settings)?;
        Ok(settings)
    }

    fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        validate(settings)?;

        let path = self.path();
        let dir = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| io_error(&e))?;

        let body = serde_json::to_vec_pretty(settings).map_err(|_| ConfigError::Corrupted)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(|e| io_error(&e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_error(&e))?;

        info!("settings saved to {}", path.display());
        Ok(())
    }
}

/// Load stored settings, falling back to the defaults on any error so a
/// fresh install still starts.
pub fn load_or_default(store: &impl ConfigPort) -> Settings {
    match store.load() {
        Ok(settings) => {
            info!("settings loaded");
            settings
        }
        Err(ConfigError::NotFound) => {
            info!("no stored settings, using defaults");
            Settings::default()
        }
        Err(e) => {
            warn!("settings load failed ({}), using defaults", e);
            Settings::default()
        }
    }
}
