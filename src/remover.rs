// src/remover.rs

//! Package removal
//!
//! Removing a package deletes its files, prunes directories left empty, and
//! drops its state entry. Its former dependencies are then removed too when
//! they were only pulled in as dependencies and nothing else needs them.

use crate::db::InstallationState;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of one top-level removal
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemoveReport {
    /// Packages removed, the requested one first
    pub removed: Vec<String>,
    /// Recorded files that were already gone from disk
    pub missing_files: Vec<PathBuf>,
}

pub struct Remover<'a> {
    install_root: &'a Path,
    state: &'a mut InstallationState,
}

impl<'a> Remover<'a> {
    pub fn new(install_root: &'a Path, state: &'a mut InstallationState) -> Self {
        Self {
            install_root,
            state,
        }
    }

    /// Remove an explicitly requested package and cascade into its
    /// dependencies
    ///
    /// Fails with `BlockedByDependents` if another installed package still
    /// depends on `name`. A name that isn't installed is a no-op.
    pub fn remove(&mut self, name: &str) -> Result<RemoveReport> {
        let mut report = RemoveReport::default();

        // (package, quiet): quiet entries come from the cascade
        let mut pending = vec![(name.to_string(), false)];

        while let Some((name, quiet)) = pending.pop() {
            let Some(package) = self.state.get(&name).cloned() else {
                continue;
            };

            let dependents = self.state.reverse_dependencies(&name).len();
            if dependents > 0 {
                if quiet {
                    debug!("Keeping {}: still required by {} packages", name, dependents);
                    continue;
                }
                return Err(Error::BlockedByDependents {
                    package: name,
                    count: dependents,
                });
            }

            info!("Removing {} ({} files)", name, package.files.len());
            for file in &package.files {
                let path = self.install_root.join(file);
                if fs::symlink_metadata(&path).is_ok() {
                    fs::remove_file(&path)?;
                } else {
                    warn!("File \"{}\" of package \"{}\" appears to be missing", path.display(), name);
                    report.missing_files.push(path.clone());
                }
                prune_empty_dirs(self.install_root, &path);
            }
            self.state.remove(&name);
            report.removed.push(name);

            for dep in package.depends.iter().rev() {
                if self.state.get(dep).is_some_and(|pkg| !pkg.explicit) {
                    pending.push((dep.clone(), true));
                }
            }
        }

        Ok(report)
    }
}

/// Remove now-empty parent directories of `path`, stopping below
/// `install_root`
pub(crate) fn prune_empty_dirs(install_root: &Path, path: &Path) {
    let mut dir = path.parent();
    while let Some(current) = dir {
        if current == install_root || !current.starts_with(install_root) {
            break;
        }
        // Fails when the directory is non-empty or already gone
        if fs::remove_dir(current).is_err() {
            break;
        }
        debug!("Pruned empty directory {}", current.display());
        dir = current.parent();
    }
}
