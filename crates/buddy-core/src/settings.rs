use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::identity::DEFAULT_ACCEPTED_SUFFIXES;
use crate::store::{storage_err, FileStore};
use crate::{BuddyError, IdentityGate, Result};

/// Overrides the home directory; mostly for tests and multiple local profiles.
pub const HOME_ENV: &str = "BUDDY_HOME";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_suffixes")]
    pub accepted_suffixes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

fn default_suffixes() -> Vec<String> {
    DEFAULT_ACCEPTED_SUFFIXES.iter().map(|s| s.to_string()).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accepted_suffixes: default_suffixes(),
            data_dir: None,
        }
    }
}

impl Settings {
    pub fn gate(&self) -> IdentityGate {
        IdentityGate::new(&self.accepted_suffixes)
    }

    /// Where the collections live: the configured directory, or `<home>/data`.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| buddy_home().join("data"))
    }

    pub fn file_store(&self) -> FileStore {
        FileStore::new(self.data_dir())
    }
}

/// Resolve the app directory: `$BUDDY_HOME`, else `~/.campus-buddy/`.
pub fn buddy_home() -> PathBuf {
    match env::var(HOME_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".campus-buddy"),
    }
}

/// `<home>/settings.json`.
pub fn settings_path() -> PathBuf {
    buddy_home().join("settings.json")
}

impl Settings {
    /// Read `path`, falling back to defaults when the file is missing or unreadable.
    pub fn load(path: &Path) -> Settings {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no settings file, using defaults");
                return Settings::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read settings, using defaults");
                return Settings::default();
            }
        };
        match serde_json::from_str::<Settings>(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid settings file, using defaults");
                Settings::default()
            }
        }
    }

    /// Write the settings as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(storage_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| BuddyError::Storage(e.to_string()))?;
        fs::write(path, json).map_err(storage_err)
    }
}

/// Settings from the default location.
pub fn read_settings() -> Settings {
    Settings::load(&settings_path())
}

/// Write a default settings file at `path` unless one is already there.
/// Returns `true` if a file was written.
pub fn ensure_settings(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    Settings::default().save(path)?;
    info!(path = %path.display(), "wrote default settings");
    Ok(true)
}
