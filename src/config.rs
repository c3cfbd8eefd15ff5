// src/config.rs

//! Config file bootstrap
//!
//! The config is a small JSON document naming the mirror to download from
//! and the directory packages get installed into. It is created with
//! defaults the first time debrip runs.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_MIRROR: &str = "https://mirrors.edge.kernel.org/ubuntu";
pub const DEFAULT_DIST: &str = "eoan";
pub const DEFAULT_REPO: &str = "main";
pub const DEFAULT_ARCHITECTURE: &str = "amd64";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Debian/Ubuntu mirror
    pub mirror: String,

    /// Root directory packages are installed into
    pub install_root: PathBuf,

    /// Binary architecture of the package feed
    #[serde(default = "default_architecture")]
    pub architecture: String,
}

fn default_architecture() -> String {
    DEFAULT_ARCHITECTURE.to_string()
}

impl Config {
    pub fn new(mirror: impl Into<String>, install_root: impl Into<PathBuf>) -> Self {
        Self {
            mirror: mirror.into(),
            install_root: install_root.into(),
            architecture: default_architecture(),
        }
    }

    /// Defaults used when no config file exists yet
    pub fn default_for_user() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
        Ok(Self::new(DEFAULT_MIRROR, home.join(".local")))
    }

    /// Read the config at `path`, writing the defaults there first if missing
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            return serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("Invalid config file {}: {}", path.display(), e))
            });
        }

        let config = Self::default_for_user()?;
        config.save(path)?;
        info!("Wrote default config to {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Mirror URL with any trailing slash removed
    pub fn mirror_url(&self) -> &str {
        self.mirror.trim_end_matches('/')
    }

    /// Directory for debrip's own files under the install root
    pub fn state_dir(&self) -> PathBuf {
        self.install_root.join(crate::STATE_DIR)
    }
}

/// Default config file location (`~/.config/debrip/debrip.json` on Linux)
pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
    Ok(dir.join("debrip").join("debrip.json"))
}
