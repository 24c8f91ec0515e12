//! Settings management

use crate::error::Result;
use crate::paths::BaseDir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime settings, read from a JSON file. Missing keys take defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub script: ScriptSettings,
    pub paths: PathSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub tag: String,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    /// Nesting limit when converting script values.
    pub max_depth: usize,
    /// Queue drains per second.
    pub tick_rate: u32,
    /// Ticks before the runtime exits.
    pub ticks: u32,
}

/// Per-directory overrides; `None` means the platform default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub resource: Option<PathBuf>,
    pub documents: Option<PathBuf>,
    pub caches: Option<PathBuf>,
    pub temporary: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            tag: "tether".to_string(),
            debug: false,
        }
    }
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            max_depth: 32,
            tick_rate: 60,
            ticks: 120,
        }
    }
}

impl PathSettings {
    pub fn get(&self, dir: BaseDir) -> Option<&PathBuf> {
        match dir {
            BaseDir::Resource => self.resource.as_ref(),
            BaseDir::Documents => self.documents.as_ref(),
            BaseDir::Caches => self.caches.as_ref(),
            BaseDir::Temporary => self.temporary.as_ref(),
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
