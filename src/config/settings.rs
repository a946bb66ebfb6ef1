//! Recording delivery settings and their persistence.
//!
//! Settings are deliberately read through to the store on every use — the
//! coordinator never caches them across calls, so an external edit (or a
//! concurrent save through the API) takes effect on the next operation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// Delivery policy for a completed recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    #[default]
    Manual,
    Auto,
}

impl SendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub send_mode: SendMode,
}

/// Persistence seam for [`Settings`].
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings>;
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// TOML-file backed store. A missing file yields the defaults.
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }

        let content =
            std::fs::read_to_string(&self.path).context("Failed to read settings file")?;

        toml::from_str(&content).context("Failed to parse settings file")
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }

        let content = toml::to_string_pretty(settings).context("Failed to serialize settings")?;

        std::fs::write(&self.path, content).context("Failed to write settings file")?;

        Ok(())
    }
}

/// In-memory store for tests and embedded use.
#[derive(Default)]
pub struct MemorySettingsStore {
    inner: Mutex<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = settings.clone();
        Ok(())
    }
}
