//! Application settings loaded from config.toml
//!
//! Every section and key is optional; missing values fall back to the defaults
//! below. `DATABASE_URL` in the environment (or `.env`) takes precedence over
//! `[database] url`.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Collision retries allowed while searching for a free code.
pub const DEFAULT_MAX_COLLISION_ATTEMPTS: u32 = 1000;
/// Whole-assignment retries allowed when an insert loses a race on `saturn_code`.
pub const DEFAULT_MAX_INSERT_ATTEMPTS: u32 = 1000;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database section
    pub database: DatabaseSettings,
    /// Code generation section
    pub codes: CodeSettings,
}

/// `[database]` section
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection URL, e.g. `sqlite://data/saturn.sqlite?mode=rwc`
    pub url: Option<String>,
}

/// `[codes]` section - retry ceilings for Saturn Code assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodeSettings {
    /// Upper bound on the collision counter inside a single assignment
    pub max_collision_attempts: u32,
    /// Upper bound on restarting an assignment after a unique-constraint failure
    pub max_insert_attempts: u32,
}

impl Default for CodeSettings {
    fn default() -> Self {
        Self {
            max_collision_attempts: DEFAULT_MAX_COLLISION_ATTEMPTS,
            max_insert_attempts: DEFAULT_MAX_INSERT_ATTEMPTS,
        }
    }
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML syntax is invalid,
/// or a retry ceiling is zero.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_settings(&contents)
}

/// Parses settings from TOML text and checks the retry ceilings.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    if settings.codes.max_collision_attempts == 0 || settings.codes.max_insert_attempts == 0 {
        return Err(Error::Config {
            message: "Retry ceilings in [codes] must be at least 1".to_string(),
        });
    }

    Ok(settings)
}

/// Loads settings from `path` if the file exists, otherwise returns the defaults.
pub fn load_settings_or_default<P: AsRef<Path>>(path: P) -> Result<Settings> {
    if path.as_ref().exists() {
        load_settings(path)
    } else {
        tracing::debug!(
            "No config file at {}, using defaults",
            path.as_ref().display()
        );
        Ok(Settings::default())
    }
}
