// src/packages/mod.rs

//! Package archive support
//!
//! The installer only needs one thing from a package archive: its payload
//! unpacked into a directory. Each archive format implements `Extractor`.

pub mod deb;

use crate::error::Result;
use std::path::Path;

pub use deb::DebExtractor;

/// Archive-extraction collaborator
pub trait Extractor {
    /// Unpack the payload of `archive` into `dest`
    ///
    /// Fails with `Error::Extraction` when the archive is malformed or
    /// yields no files. `package` is only used for error reporting.
    fn extract(&self, package: &str, archive: &[u8], dest: &Path) -> Result<()>;
}
