// src/db/mod.rs

//! Installed-package database
//!
//! This module handles the persisted installation state:
//! - Locating the state file under the install root
//! - Loading it once per invocation (missing file means nothing installed)
//! - Writing it back atomically after a successful operation

pub mod models;

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use models::{InstallationState, InstalledPackage};

/// File name of the state document inside the state directory
const STATE_FILE: &str = "installed_packages.json";

/// Location of the state file for an install root
pub fn state_path(install_root: &Path) -> PathBuf {
    install_root.join(crate::STATE_DIR).join(STATE_FILE)
}

/// Load the installation state for `install_root`
///
/// A missing file is an empty state, not an error.
pub fn load(install_root: &Path) -> Result<InstallationState> {
    let path = state_path(install_root);
    if !path.exists() {
        debug!("No state file at {}, starting empty", path.display());
        return Ok(InstallationState::new());
    }

    let content = fs::read_to_string(&path)?;
    let state: InstallationState = serde_json::from_str(&content)
        .map_err(|e| Error::Parse(format!("Invalid state file {}: {}", path.display(), e)))?;

    debug!("Loaded {} installed packages from {}", state.len(), path.display());
    Ok(state)
}

/// Persist the installation state
///
/// Written to a temporary sibling first and renamed into place so a crash
/// never leaves a half-written state file.
pub fn save(install_root: &Path, state: &InstallationState) -> Result<()> {
    let path = state_path(install_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, serde_json::to_string_pretty(state)?)?;
    fs::rename(&temp_path, &path)?;

    info!("Saved {} installed packages to {}", state.len(), path.display());
    Ok(())
}
