//! Persisted settings
//!
//! A small JSON file holding the device path, baud rate, and optional device
//! profile overrides, so a bench setup survives between runs.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use pantilt_core::protocol::DeviceProfile;

/// Contents of the settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Serial device of the unit
    pub device: Option<String>,
    /// Baud rate in bits per second
    pub baud: Option<u32>,
    /// Device profile overrides (resolutions, timeouts, sweep limits)
    #[serde(default)]
    pub profile: Option<DeviceProfile>,
}

impl Settings {
    /// Location of the settings file, when a config directory exists
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pantilt").join("settings.json"))
    }

    /// Load settings, falling back to defaults on a missing or bad file
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        let Ok(text) = fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), "ignoring malformed settings file: {}", e);
                Self::default()
            }
        }
    }

    /// Write settings to the settings file
    pub fn save(&self) -> Result<()> {
        let path = Self::path().context("no config directory on this system")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}
