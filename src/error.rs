// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for debrip
#[derive(Error, Debug)]
pub enum Error {
    /// No index entry matches a requested name
    #[error("Failed to find a package matching \"{0}\"")]
    NotFound(String),

    /// Several substring matches and no exact one
    #[error("Ambiguous package name \"{query}\" (found {candidates} candidates)")]
    AmbiguousName { query: String, candidates: usize },

    /// The same Package name appeared twice in one feed
    #[error("Duplicate package \"{0}\" in index")]
    DuplicatePackage(String),

    /// Archive unpack failed or produced no payload
    #[error("Failed to extract package \"{package}\": {reason}")]
    Extraction { package: String, reason: String },

    /// A package file collides with an existing or already staged file
    #[error("File \"{}\" of package \"{package}\" conflicts with existing file", path.display())]
    Conflict { path: PathBuf, package: String },

    /// Explicit removal of a package something else still depends on
    #[error("Package \"{package}\" is required by {count} other packages")]
    BlockedByDependents { package: String, count: usize },

    /// Top-level removal of a package that is not installed
    #[error("Package \"{0}\" is not installed")]
    NotInstalled(String),

    /// A dependency named by an index record has no index entry itself
    #[error("Dependency \"{dependency}\" of package \"{package}\" is not in the index")]
    MissingDependency { package: String, dependency: String },

    /// Index record without a download path
    #[error("Package \"{0}\" has no Filename in the index")]
    MissingFilename(String),

    /// HTTP errors
    #[error("Download error: {0}")]
    Download(String),

    /// Malformed feed, cache or state data
    #[error("Parse error: {0}")]
    Parse(String),

    /// Config bootstrap errors
    #[error("Config error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using debrip's Error type
pub type Result<T> = std::result::Result<T, Error>;
