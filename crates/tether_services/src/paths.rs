//! Base directories and file paths
//!
//! Scripts name a base directory with an opaque pointer token (the same
//! value every time, so scripts can compare them). The tokens are only
//! ever compared, never dereferenced.

use crate::error::{Result, ServiceError};
use crate::settings::PathSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tether_core::{Hashtable, OpaquePointer};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseDir {
    /// Read-only files shipped with the app.
    Resource,
    Documents,
    Caches,
    Temporary,
}

// One distinct address per base directory
static TOKENS: [u8; 4] = [0, 1, 2, 3];

impl BaseDir {
    pub const ALL: [BaseDir; 4] = [
        BaseDir::Resource,
        BaseDir::Documents,
        BaseDir::Caches,
        BaseDir::Temporary,
    ];

    /// Name the token is published under.
    pub fn name(&self) -> &'static str {
        match self {
            BaseDir::Resource => "ResourceDirectory",
            BaseDir::Documents => "DocumentsDirectory",
            BaseDir::Caches => "CachesDirectory",
            BaseDir::Temporary => "TemporaryDirectory",
        }
    }

    pub fn pointer(&self) -> OpaquePointer {
        OpaquePointer::from_ref(&TOKENS[*self as usize])
    }

    pub fn from_pointer(pointer: OpaquePointer) -> Option<BaseDir> {
        BaseDir::ALL.into_iter().find(|dir| dir.pointer() == pointer)
    }
}

impl fmt::Display for BaseDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// All four tokens keyed by name, ready to push into script globals.
pub fn dir_pointers() -> Hashtable {
    BaseDir::ALL
        .into_iter()
        .map(|dir| (dir.name().to_string(), dir.pointer().into()))
        .collect()
}

pub fn base_dir_to_string(pointer: OpaquePointer) -> Option<&'static str> {
    BaseDir::from_pointer(pointer).map(|dir| dir.name())
}

/// Maps base directories to places on disk.
pub trait PathResolver {
    fn base_path(&self, dir: BaseDir) -> Result<PathBuf>;

    fn path_for_file(&self, filename: &str, dir: BaseDir) -> Result<PathBuf> {
        Ok(self.base_path(dir)?.join(filename))
    }

    /// Like [`PathResolver::path_for_file`] for a token received from a script.
    fn path_for_pointer(&self, filename: &str, base_dir: OpaquePointer) -> Result<PathBuf> {
        let dir = BaseDir::from_pointer(base_dir).ok_or(ServiceError::UnknownBaseDir(base_dir))?;
        self.path_for_file(filename, dir)
    }
}

/// Platform directories from `dirs`, with per-directory overrides.
pub struct PlatformPaths {
    app_name: String,
    settings: PathSettings,
}

impl PlatformPaths {
    pub fn new(app_name: &str) -> Self {
        Self::with_settings(app_name, PathSettings::default())
    }

    pub fn with_settings(app_name: &str, settings: PathSettings) -> Self {
        Self {
            app_name: app_name.to_string(),
            settings,
        }
    }

    fn platform_path(&self, dir: BaseDir) -> Option<PathBuf> {
        match dir {
            BaseDir::Resource => std::env::current_dir().ok(),
            BaseDir::Documents => dirs::document_dir().map(|path| path.join(&self.app_name)),
            BaseDir::Caches => dirs::cache_dir().map(|path| path.join(&self.app_name)),
            BaseDir::Temporary => Some(std::env::temp_dir()),
        }
    }
}

impl PathResolver for PlatformPaths {
    fn base_path(&self, dir: BaseDir) -> Result<PathBuf> {
        self.settings
            .get(dir)
            .cloned()
            .or_else(|| self.platform_path(dir))
            .ok_or(ServiceError::NoBaseDir(dir))
    }
}
