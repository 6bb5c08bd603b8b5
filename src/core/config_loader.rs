//! # Settings Loader
//!
//! Loads the optional `settings.toml` that supplies defaults for the `safeproc`
//! CLI: newline splitting per stream, cancellation timing and a default working
//! directory. A missing default file is not an error; built-in defaults apply.
use crate::constants::{DEFAULT_CANCEL_GRACE, DEFAULT_POLL_INTERVAL};
use crate::core::paths::{self, PathError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error with temporary file: {0}")]
    TempFile(#[from] tempfile::PersistError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Settings file '{0}' does not exist.")]
    NotFound(PathBuf),
    #[error("Failed to parse settings file: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize settings to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// User defaults read from `settings.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Keep line boundaries in captured stdout.
    pub split_stdout_newlines: bool,
    /// Keep line boundaries in captured stderr.
    pub split_stderr_newlines: bool,
    /// Exit-status poll interval of a cancellable wait, in milliseconds.
    pub poll_interval_ms: u64,
    /// Time workers get to finish after a cancelled wait, in milliseconds.
    pub cancel_grace_ms: u64,
    /// Working directory used when none is given on the command line. `~` and `$VAR` are expanded.
    pub working_dir: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            split_stdout_newlines: true,
            split_stderr_newlines: true,
            poll_interval_ms: millis(DEFAULT_POLL_INTERVAL),
            cancel_grace_ms: millis(DEFAULT_CANCEL_GRACE),
            working_dir: None,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    /// The configured working directory with `~` and environment variables expanded.
    pub fn resolved_working_dir(&self) -> Result<Option<PathBuf>, ConfigError> {
        match &self.working_dir {
            Some(raw) => Ok(Some(paths::expand_path(raw)?)),
            None => Ok(None),
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }
}

/// Loads settings from `explicit`, or from the default location when `None`.
///
/// An explicit path must exist. A missing default file yields [`Settings::default`].
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            path.to_path_buf()
        }
        None => {
            let default_path = paths::get_settings_path()?;
            if !default_path.exists() {
                log::debug!(
                    "No settings file at '{}', using defaults.",
                    default_path.display()
                );
                return Ok(Settings::default());
            }
            default_path
        }
    };

    log::debug!("Loading settings from '{}'", path.display());
    let content = fs::read_to_string(&path)?;
    let settings: Settings = toml::from_str(&content)?;
    settings.validate()
}

/// Writes `settings` to `path`, replacing the file atomically.
pub fn write_settings(settings: &Settings, path: &Path) -> Result<(), ConfigError> {
    let toml_string = toml::to_string_pretty(settings)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut temp = NamedTempFile::new_in(&dir)?;
    temp.write_all(toml_string.as_bytes())?;
    temp.flush()?;
    temp.persist(path)?;
    Ok(())
}
