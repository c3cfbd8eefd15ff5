// src/db/models.rs

//! Records for installed packages
//!
//! This module defines the structs stored in the installed-packages file
//! and the in-memory map operations the installer and remover build on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Provenance recorded for packages marked as provided by the system
pub const SYSTEM_DIST: &str = "special";
pub const SYSTEM_REPO: &str = "system";

/// A package recorded as installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    /// Distribution it was fetched from
    pub dist: String,
    /// Repository it was fetched from
    pub repo: String,
    /// Named directly by the user rather than pulled in as a dependency
    pub explicit: bool,
    /// Paths relative to the install root owned by this package
    pub files: Vec<String>,
    /// Bare dependency names recorded at install time
    pub depends: Vec<String>,
}

impl InstalledPackage {
    pub fn new(dist: impl Into<String>, repo: impl Into<String>, explicit: bool) -> Self {
        Self {
            dist: dist.into(),
            repo: repo.into(),
            explicit,
            files: Vec::new(),
            depends: Vec::new(),
        }
    }

    /// Marker for a package provided outside debrip: no files, no deps
    pub fn system() -> Self {
        Self::new(SYSTEM_DIST, SYSTEM_REPO, true)
    }

    pub fn is_system(&self) -> bool {
        self.dist == SYSTEM_DIST && self.repo == SYSTEM_REPO
    }
}

/// Mapping of package name to its installed record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallationState {
    packages: BTreeMap<String, InstalledPackage>,
}

impl InstallationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&InstalledPackage> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, package: InstalledPackage) {
        self.packages.insert(name.into(), package);
    }

    pub fn remove(&mut self, name: &str) -> Option<InstalledPackage> {
        self.packages.remove(name)
    }

    /// Fold entries committed by an install transaction into the state
    pub fn merge(&mut self, committed: impl IntoIterator<Item = (String, InstalledPackage)>) {
        self.packages.extend(committed);
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, InstalledPackage> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Installed packages whose recorded dependencies include `name`
    pub fn reverse_dependencies(&self, name: &str) -> Vec<&str> {
        self.packages
            .iter()
            .filter(|(other, pkg)| other.as_str() != name && pkg.depends.iter().any(|d| d == name))
            .map(|(other, _)| other.as_str())
            .collect()
    }

    /// Which installed package owns `path`, if any
    pub fn owner_of(&self, path: &str) -> Option<&str> {
        self.packages
            .iter()
            .find(|(_, pkg)| pkg.files.iter().any(|f| f == path))
            .map(|(name, _)| name.as_str())
    }
}

impl<'a> IntoIterator for &'a InstallationState {
    type Item = (&'a String, &'a InstalledPackage);
    type IntoIter = btree_map::Iter<'a, String, InstalledPackage>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(depends: &[&str], explicit: bool) -> InstalledPackage {
        let mut pkg = InstalledPackage::new("eoan", "main", explicit);
        pkg.depends = depends.iter().map(|d| d.to_string()).collect();
        pkg
    }

    #[test]
    fn test_system_marker() {
        let pkg = InstalledPackage::system();
        assert!(pkg.is_system());
        assert!(pkg.explicit);
        assert!(pkg.files.is_empty());
        assert!(pkg.depends.is_empty());
        assert!(!package(&[], true).is_system());
    }

    #[test]
    fn test_reverse_dependencies() {
        let mut state = InstallationState::new();
        state.insert("app", package(&["libfoo", "libbar"], true));
        state.insert("tool", package(&["libfoo"], true));
        state.insert("libfoo", package(&[], false));
        state.insert("libbar", package(&["libbar"], false));

        assert_eq!(state.reverse_dependencies("libfoo"), vec!["app", "tool"]);
        // Self-dependency does not count
        assert_eq!(state.reverse_dependencies("libbar"), vec!["app"]);
        assert!(state.reverse_dependencies("app").is_empty());
        // Names that aren't installed are fine
        assert!(state.reverse_dependencies("missing").is_empty());
    }

    #[test]
    fn test_merge_and_owner() {
        let mut state = InstallationState::new();
        let mut pkg = package(&[], true);
        pkg.files = vec!["usr/bin/hello".to_string()];

        state.merge(vec![("hello".to_string(), pkg)]);
        assert!(state.contains("hello"));
        assert_eq!(state.owner_of("usr/bin/hello"), Some("hello"));
        assert_eq!(state.owner_of("usr/bin/other"), None);

        assert!(state.remove("hello").is_some());
        assert!(state.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let mut state = InstallationState::new();
        let mut pkg = package(&["libc6"], true);
        pkg.files = vec!["usr/bin/hello".to_string()];
        state.insert("hello", pkg);

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "hello": {
                    "dist": "eoan",
                    "repo": "main",
                    "explicit": true,
                    "files": ["usr/bin/hello"],
                    "depends": ["libc6"]
                }
            })
        );
    }
}
