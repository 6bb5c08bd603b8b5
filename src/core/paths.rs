// src/core/paths.rs

use crate::constants::{CONFIG_DIR_NAME, SETTINGS_FILENAME};
use lazy_static::lazy_static;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

lazy_static! {
    static ref CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not create config directory at '{path}': {source}")]
    ConfigDirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not expand path '{path}': {reason}")]
    Expansion { path: String, reason: String },
}

/// Returns the safeproc configuration directory (`~/.config/safeproc` on Linux),
/// creating it if needed.
///
/// The first call computes the path; later calls return the cached value.
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    // A poisoned lock only means another thread panicked mid-lookup; the cache is still usable.
    let mut cached = CONFIG_DIR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(path) = &*cached {
        return Ok(path.clone());
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME);

    if !config_path.exists() {
        fs::create_dir_all(&config_path).map_err(|e| PathError::ConfigDirCreation {
            path: config_path.display().to_string(),
            source: e,
        })?;
    }

    *cached = Some(config_path.clone());
    Ok(config_path)
}

/// Path of the default settings file.
pub fn get_settings_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(SETTINGS_FILENAME))
}

/// Expands `~` and environment variables (`$VAR`, `${VAR}`) in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(raw).map_err(|e| PathError::Expansion {
        path: raw.to_string(),
        reason: e.to_string(),
    })?;
    Ok(dunce::simplified(&PathBuf::from(expanded.into_owned())).to_path_buf())
}
