// src/lib.rs

//! debrip
//!
//! Fetches binary packages from a Debian/Ubuntu mirror and installs their
//! files into an unprivileged root directory, tracking what it installed so
//! packages can be removed again without breaking their dependents.
//!
//! # Architecture
//!
//! - Package index: parsed `Packages.gz` feed, cached as JSON per dist/repo
//! - Installed state: one JSON document under the install root
//! - Transactions: files are staged and conflict-checked before anything
//!   touches the install root
//! - Removal: reverse-dependency checks and cascade through orphaned deps

pub mod config;
pub mod db;
mod error;
pub mod installer;
pub mod packages;
pub mod progress;
pub mod remover;
pub mod repository;

pub use error::{Error, Result};

/// Directory under the install root holding debrip's own bookkeeping
pub const STATE_DIR: &str = "etc/debrip";
