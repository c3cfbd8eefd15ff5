// src/repository/index.rs

//! Debian/Ubuntu package index
//!
//! Parses Debian-style Packages.gz files which use RFC 822-like format
//! (similar to email headers with key: value pairs), and caches the parsed
//! form as JSON under the install root so later runs skip the download.

use super::{Fetcher, mirror_url};
use crate::config::Config;
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One package as described by the repository feed
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Package name (the index key, not stored in the cached record)
    #[serde(skip)]
    pub name: String,

    /// Version string, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Download path relative to the mirror base
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Raw dependency specifiers, e.g. "libc6 (>= 2.34)"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

impl PackageRecord {
    /// Dependency names with version constraints stripped, in declared order
    pub fn dependency_names(&self) -> Vec<String> {
        self.depends
            .iter()
            .map(|spec| dependency_name(spec))
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// Reduce a dependency specifier to a bare package name
///
/// "libc6 (>= 2.34)" -> "libc6", "python3:any" -> "python3",
/// "awk | mawk" -> "awk".
pub fn dependency_name(spec: &str) -> String {
    let first_alt = spec.split('|').next().unwrap_or(spec);
    let name = first_alt.split_whitespace().next().unwrap_or("");
    let name = name.split('(').next().unwrap_or(name);
    name.split(':').next().unwrap_or(name).to_string()
}

/// Debian package entry structure for rfc822-like parsing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DebianPackageEntry {
    package: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    depends: Option<String>,
}

/// Parsed package feed for one distribution/repository pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIndex {
    packages: BTreeMap<String, PackageRecord>,
}

impl PackageIndex {
    /// Load the index for `dist`/`repo`, from the cache if present
    ///
    /// The cache is never invalidated here; use [`PackageIndex::refresh`]
    /// to force a fresh download.
    pub fn load<F: Fetcher>(fetcher: &F, config: &Config, dist: &str, repo: &str) -> Result<Self> {
        let cache = Self::cache_path(&config.install_root, dist, repo);
        if cache.exists() {
            debug!("Using cached package index {}", cache.display());
            return Self::read_cache(&cache);
        }
        Self::refresh(fetcher, config, dist, repo)
    }

    /// Download and parse the feed, then overwrite the cache
    pub fn refresh<F: Fetcher>(fetcher: &F, config: &Config, dist: &str, repo: &str) -> Result<Self> {
        let url = mirror_url(
            config.mirror_url(),
            &format!(
                "dists/{}/{}/binary-{}/Packages.gz",
                dist, repo, config.architecture
            ),
        );
        info!("Syncing package index {}/{} from {}", dist, repo, url);

        let data = fetcher.fetch(&url, true)?;
        let text = decompress_feed(&data)?;
        let index = Self::parse(&text)?;

        index.write_cache(&Self::cache_path(&config.install_root, dist, repo))?;
        info!("Parsed {} packages from {}/{}", index.len(), dist, repo);
        Ok(index)
    }

    /// Parse the text of a Packages file
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let entries: Vec<DebianPackageEntry> = rfc822_like::from_str(content)
            .map_err(|e| Error::Parse(format!("Failed to parse Packages file: {}", e)))?;

        debug!("Parsed {} package entries", entries.len());

        let mut packages = BTreeMap::new();
        for entry in entries {
            if packages.contains_key(&entry.package) {
                return Err(Error::DuplicatePackage(entry.package));
            }

            let depends = entry
                .depends
                .map(|deps| {
                    deps.split(',')
                        .map(|dep| dep.trim().to_string())
                        .filter(|dep| !dep.is_empty())
                        .collect()
                })
                .unwrap_or_default();

            let record = PackageRecord {
                name: entry.package.clone(),
                version: entry.version,
                filename: entry.filename,
                depends,
            };
            packages.insert(entry.package, record);
        }

        Ok(Self { packages })
    }

    /// Cache location for one distribution/repository pair
    pub fn cache_path(install_root: &Path, dist: &str, repo: &str) -> PathBuf {
        install_root
            .join(crate::STATE_DIR)
            .join("package-indices")
            .join(format!("{}-{}.json", dist, repo))
    }

    fn read_cache(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut packages: BTreeMap<String, PackageRecord> = serde_json::from_str(&content)
            .map_err(|e| Error::Parse(format!("Invalid index cache {}: {}", path.display(), e)))?;
        for (name, record) in packages.iter_mut() {
            record.name = name.clone();
        }
        Ok(Self { packages })
    }

    fn write_cache(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.packages)?)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.get(name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Every package name containing `query` (case-sensitive), sorted
    pub fn search(&self, query: &str) -> Vec<&str> {
        self.packages
            .keys()
            .filter(|name| name.contains(query))
            .map(String::as_str)
            .collect()
    }

    /// Resolve a user-supplied name to a single record
    ///
    /// An exact match wins; otherwise the substring search must produce
    /// exactly one candidate.
    pub fn resolve(&self, query: &str) -> Result<&PackageRecord> {
        if let Some(record) = self.packages.get(query) {
            return Ok(record);
        }

        let candidates = self.search(query);
        match candidates.as_slice() {
            [] => Err(Error::NotFound(query.to_string())),
            [only] => Ok(&self.packages[*only]),
            _ => Err(Error::AmbiguousName {
                query: query.to_string(),
                candidates: candidates.len(),
            }),
        }
    }
}

impl FromIterator<PackageRecord> for PackageIndex {
    fn from_iter<I: IntoIterator<Item = PackageRecord>>(iter: I) -> Self {
        let packages = iter
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();
        Self { packages }
    }
}

/// Gunzip and UTF-8 decode a Packages.gz body
fn decompress_feed(data: &[u8]) -> Result<String> {
    let mut gz = GzDecoder::new(data);
    let mut decompressed = String::new();
    gz.read_to_string(&mut decompressed)
        .map_err(|e| Error::Parse(format!("Failed to decompress Packages.gz: {}", e)))?;

    debug!("Decompressed Packages file: {} bytes", decompressed.len());
    Ok(decompressed)
}
