// src/installer.rs

//! Package installation
//!
//! Installing is a two-phase transaction:
//!
//! 1. Stage: each requested package and its transitive dependencies are
//!    downloaded, extracted, and every file is checked against the install
//!    root and against files already staged in this transaction. Files that
//!    pass are moved into a "validated" staging tree.
//! 2. Commit: only once every package staged cleanly are the validated
//!    files moved into the install root and the new entries folded into
//!    the installation state.
//!
//! Any failure during staging drops the transaction, which deletes the
//! staging directory and leaves the install root and state untouched.

use crate::config::Config;
use crate::db::{InstallationState, InstalledPackage};
use crate::error::{Error, Result};
use crate::packages::Extractor;
use crate::remover::prune_empty_dirs;
use crate::repository::{Fetcher, PackageIndex, PackageRecord, mirror_url};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Distribution and repository an install command targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub dist: String,
    pub repo: String,
}

impl Target {
    pub fn new(dist: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            dist: dist.into(),
            repo: repo.into(),
        }
    }
}

/// Outcome of an install command
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Newly installed packages, in staging order
    pub installed: Vec<String>,
    /// Explicit requests that were already installed
    pub already_installed: Vec<String>,
}

/// Staging area and pending entries for one install invocation
pub struct Transaction {
    staging: TempDir,
    committed: BTreeMap<String, InstalledPackage>,
    order: Vec<String>,
}

impl Transaction {
    /// Create the staging directories inside `state_dir`
    ///
    /// Staging next to the install root keeps the final commit a rename on
    /// the same filesystem.
    pub fn begin(state_dir: &Path) -> Result<Self> {
        fs::create_dir_all(state_dir)?;
        let staging = tempfile::Builder::new()
            .prefix("staging-")
            .tempdir_in(state_dir)?;

        fs::create_dir_all(staging.path().join("install"))?;
        debug!("Staging transaction in {}", staging.path().display());

        Ok(Self {
            staging,
            committed: BTreeMap::new(),
            order: Vec::new(),
        })
    }

    /// Files that passed conflict checks, laid out relative to the root
    fn validated_dir(&self) -> PathBuf {
        self.staging.path().join("install")
    }

    /// Empty directory for the next package's payload
    fn fresh_extract_dir(&self) -> Result<PathBuf> {
        let dir = self.staging.path().join("extract");
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn is_staged(&self, name: &str) -> bool {
        self.committed.contains_key(name)
    }

    /// Names staged so far, in staging order
    pub fn staged(&self) -> &[String] {
        &self.order
    }

    fn record(&mut self, name: String, package: InstalledPackage) {
        self.order.push(name.clone());
        self.committed.insert(name, package);
    }

    /// Move every validated file into `install_root` and merge the staged
    /// entries into `state`
    ///
    /// Returns the names that were installed, in staging order. If a move
    /// fails, files already moved are put back and the root is left as it
    /// was.
    pub fn commit(self, install_root: &Path, state: &mut InstallationState) -> Result<Vec<String>> {
        let validated = self.validated_dir();
        let mut moved: Vec<(PathBuf, PathBuf)> = Vec::new();

        for name in &self.order {
            let package = &self.committed[name];
            for file in &package.files {
                let staged = validated.join(file);
                let installed = install_root.join(file);
                if let Err(e) = move_file(&staged, &installed) {
                    warn!("Commit of {} failed at {}: {}", name, installed.display(), e);
                    roll_back(install_root, &moved);
                    return Err(e);
                }
                moved.push((staged, installed));
            }
            debug!("Committed {} files of {}", package.files.len(), name);
        }

        info!("Committed {} packages to {}", self.order.len(), install_root.display());
        state.merge(self.committed);
        Ok(self.order)
    }
}

/// Stages packages and their dependencies into a [`Transaction`]
pub struct Installer<'a, F, E> {
    config: &'a Config,
    index: &'a PackageIndex,
    installed: &'a InstallationState,
    owned_files: HashSet<&'a str>,
    fetcher: &'a F,
    extractor: &'a E,
    target: &'a Target,
    show_progress: bool,
}

impl<'a, F: Fetcher, E: Extractor> Installer<'a, F, E> {
    pub fn new(
        config: &'a Config,
        index: &'a PackageIndex,
        installed: &'a InstallationState,
        fetcher: &'a F,
        extractor: &'a E,
        target: &'a Target,
    ) -> Self {
        let owned_files = installed
            .iter()
            .flat_map(|(_, pkg)| pkg.files.iter().map(String::as_str))
            .collect();

        Self {
            config,
            index,
            installed,
            owned_files,
            fetcher,
            extractor,
            target,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn is_installed(&self, tx: &Transaction, name: &str) -> bool {
        self.installed.contains(name) || tx.is_staged(name)
    }

    /// Stage `name` and every dependency not yet installed or staged
    ///
    /// Returns `false` when `name` itself was already installed. Dependencies
    /// are walked depth-first in declared order; a package is recorded as
    /// staged before its dependencies are visited, so cycles terminate.
    pub fn install(&self, tx: &mut Transaction, name: &str, explicit: bool) -> Result<bool> {
        if self.is_installed(tx, name) {
            if explicit {
                debug!("Package \"{}\" is already installed", name);
            }
            return Ok(false);
        }

        // (package, explicit, required by)
        let mut pending: Vec<(String, bool, Option<String>)> = vec![(name.to_string(), explicit, None)];

        while let Some((name, explicit, required_by)) = pending.pop() {
            if self.is_installed(tx, &name) {
                debug!("Dependency {} already satisfied", name);
                continue;
            }

            let record = match (self.index.get(&name), required_by) {
                (Some(record), _) => record,
                (None, Some(package)) => {
                    return Err(Error::MissingDependency {
                        package,
                        dependency: name,
                    });
                }
                (None, None) => return Err(Error::NotFound(name)),
            };

            let package = self.stage(tx, record, explicit)?;
            let depends = package.depends.clone();
            tx.record(name.clone(), package);

            for dep in depends.into_iter().rev() {
                pending.push((dep, false, Some(name.clone())));
            }
        }

        Ok(true)
    }

    /// Fetch, extract and validate one package
    fn stage(&self, tx: &Transaction, record: &PackageRecord, explicit: bool) -> Result<InstalledPackage> {
        info!(
            "Installing {} {}{}",
            record.name,
            record.version.as_deref().unwrap_or(""),
            if explicit { "" } else { " (dependency)" }
        );

        let filename = record
            .filename
            .as_deref()
            .ok_or_else(|| Error::MissingFilename(record.name.clone()))?;
        let url = mirror_url(self.config.mirror_url(), filename);
        let archive = self.fetcher.fetch(&url, self.show_progress)?;

        let extract_dir = tx.fresh_extract_dir()?;
        self.extractor.extract(&record.name, &archive, &extract_dir)?;

        let files = self.validate(&record.name, &extract_dir, &tx.validated_dir())?;
        if files.is_empty() {
            return Err(Error::Extraction {
                package: record.name.clone(),
                reason: "package contains no files".to_string(),
            });
        }

        let mut package = InstalledPackage::new(&self.target.dist, &self.target.repo, explicit);
        package.files = files;
        package.depends = record.dependency_names();
        Ok(package)
    }

    /// Conflict-check every extracted file and move it into `validated`
    fn validate(&self, package: &str, extract_dir: &Path, validated: &Path) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(extract_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Io(io::Error::other(e)))?;
            if entry.file_type().is_dir() {
                continue;
            }

            let rel_path = entry
                .path()
                .strip_prefix(extract_dir)
                .map_err(|e| Error::Io(io::Error::other(e)))?;
            let rel = rel_path.to_str().ok_or_else(|| Error::Extraction {
                package: package.to_string(),
                reason: format!("non UTF-8 path {}", rel_path.display()),
            })?;

            let root_path = self.config.install_root.join(rel_path);
            let staged_path = validated.join(rel_path);

            let collision = if self.owned_files.contains(rel) || exists(&root_path) {
                Some(root_path)
            } else if exists(&staged_path) {
                Some(staged_path.clone())
            } else {
                self.blocked_ancestor(rel_path, validated)
            };
            if let Some(path) = collision {
                return Err(Error::Conflict {
                    path,
                    package: package.to_string(),
                });
            }

            move_file(entry.path(), &staged_path)?;
            files.push(rel.to_string());
        }

        debug!("Validated {} files of {}", files.len(), package);
        Ok(files)
    }

    /// First parent of `rel_path`, in the install root or the staging tree,
    /// that exists but is not a directory
    ///
    /// A symlink to a directory is fine; a dangling symlink is not.
    fn blocked_ancestor(&self, rel_path: &Path, validated: &Path) -> Option<PathBuf> {
        for ancestor in rel_path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            if ancestor.to_str().is_some_and(|a| self.owned_files.contains(a)) {
                return Some(self.config.install_root.join(ancestor));
            }
            for base in [self.config.install_root.as_path(), validated] {
                let path = base.join(ancestor);
                if exists(&path) && !path.is_dir() {
                    return Some(path);
                }
            }
        }
        None
    }
}

/// Resolve `names`, stage them with their dependencies, and commit
///
/// Every name is resolved before anything is downloaded; the install root
/// and `state` are only modified once all packages have staged cleanly.
#[allow(clippy::too_many_arguments)]
pub fn install_packages<F: Fetcher, E: Extractor>(
    config: &Config,
    index: &PackageIndex,
    fetcher: &F,
    extractor: &E,
    target: &Target,
    names: &[String],
    state: &mut InstallationState,
    show_progress: bool,
) -> Result<InstallReport> {
    let resolved = names
        .iter()
        .map(|name| index.resolve(name).map(|record| record.name.clone()))
        .collect::<Result<Vec<_>>>()?;

    let mut report = InstallReport::default();
    let mut tx = Transaction::begin(&config.state_dir())?;
    {
        let installer = Installer::new(config, index, state, fetcher, extractor, target)
            .with_progress(show_progress);
        for name in &resolved {
            if !installer.install(&mut tx, name, true)? {
                report.already_installed.push(name.clone());
            }
        }
    }

    report.installed = tx.commit(&config.install_root, state)?;
    Ok(report)
}

/// Record `names` as provided by the system without fetching anything
///
/// Returns the names that were already installed and left untouched.
pub fn mark_system(names: &[String], state: &mut InstallationState) -> Vec<String> {
    let mut already = Vec::new();
    for name in names {
        if state.contains(name) {
            already.push(name.clone());
        } else {
            info!("Marking {} as installed by the system", name);
            state.insert(name.clone(), InstalledPackage::system());
        }
    }
    already
}

/// Move committed files back into staging, newest first
fn roll_back(install_root: &Path, moved: &[(PathBuf, PathBuf)]) {
    for (staged, installed) in moved.iter().rev() {
        if let Err(e) = move_file(installed, staged) {
            warn!("Failed to roll back {}: {}", installed.display(), e);
            continue;
        }
        prune_empty_dirs(install_root, installed);
    }
    info!("Rolled back {} files", moved.len());
}

/// Existence check that does not follow a final symlink
fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Move a file or symlink, creating parent directories as needed
fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_entry(src, dst)?;
            fs::remove_file(src)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn copy_entry(src: &Path, dst: &Path) -> io::Result<()> {
    #[cfg(unix)]
    if fs::symlink_metadata(src)?.file_type().is_symlink() {
        return std::os::unix::fs::symlink(fs::read_link(src)?, dst);
    }
    fs::copy(src, dst).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::tempdir;

    /// Serves the URL back as the archive body and records each request
    #[derive(Default)]
    struct FakeMirror {
        requests: RefCell<Vec<String>>,
    }

    impl Fetcher for FakeMirror {
        fn fetch(&self, url: &str, _show_progress: bool) -> Result<Vec<u8>> {
            self.requests.borrow_mut().push(url.to_string());
            Ok(url.as_bytes().to_vec())
        }
    }

    impl FakeMirror {
        fn fetched(&self, name: &str) -> usize {
            let suffix = format!("/pool/{}.deb", name);
            self.requests.borrow().iter().filter(|u| u.ends_with(&suffix)).count()
        }
    }

    /// Writes a fixed file list per package
    #[derive(Default)]
    struct FakeExtractor {
        payloads: HashMap<String, Vec<&'static str>>,
    }

    impl FakeExtractor {
        fn with(mut self, package: &str, files: &[&'static str]) -> Self {
            self.payloads.insert(package.to_string(), files.to_vec());
            self
        }
    }

    impl Extractor for FakeExtractor {
        fn extract(&self, package: &str, _archive: &[u8], dest: &Path) -> Result<()> {
            let files = self.payloads.get(package).ok_or_else(|| Error::Extraction {
                package: package.to_string(),
                reason: "corrupt archive".to_string(),
            })?;
            for file in files {
                let path = dest.join(file);
                fs::create_dir_all(path.parent().unwrap())?;
                fs::write(&path, package)?;
            }
            Ok(())
        }
    }

    fn record(name: &str, depends: &[&str]) -> PackageRecord {
        PackageRecord {
            name: name.to_string(),
            version: Some("1.0".to_string()),
            filename: Some(format!("pool/{}.deb", name)),
            depends: depends.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    struct Fixture {
        root: TempDir,
        config: Config,
        target: Target,
        mirror: FakeMirror,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempdir().unwrap();
            let config = Config::new("http://mirror.test/ubuntu", root.path());
            Self {
                root,
                config,
                target: Target::new("eoan", "main"),
                mirror: FakeMirror::default(),
            }
        }

        fn install(
            &self,
            index: &PackageIndex,
            extractor: &FakeExtractor,
            request: &[&str],
            state: &mut InstallationState,
        ) -> Result<InstallReport> {
            install_packages(
                &self.config,
                index,
                &self.mirror,
                extractor,
                &self.target,
                &names(request),
                state,
                false,
            )
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.root.path().join(rel)
        }

        fn staging_dirs(&self) -> usize {
            match fs::read_dir(self.config.state_dir()) {
                Ok(entries) => entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().starts_with("staging-"))
                    .count(),
                Err(_) => 0,
            }
        }
    }

    #[test]
    fn test_install_with_dependencies() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![
            record("app", &["libfoo (>= 1.2)", "libbar"]),
            record("libfoo", &["libc6"]),
            record("libbar", &[]),
            record("libc6", &[]),
        ]
        .into_iter()
        .collect();
        let extractor = FakeExtractor::default()
            .with("app", &["usr/bin/app", "usr/share/doc/app/README"])
            .with("libfoo", &["usr/lib/libfoo.so.1"])
            .with("libbar", &["usr/lib/libbar.so.1"])
            .with("libc6", &["lib/libc.so.6"]);

        let mut state = InstallationState::new();
        let report = fx.install(&index, &extractor, &["app"], &mut state).unwrap();

        // Depth-first in declared order
        assert_eq!(report.installed, vec!["app", "libfoo", "libc6", "libbar"]);
        assert!(report.already_installed.is_empty());

        let app = state.get("app").unwrap();
        assert!(app.explicit);
        assert_eq!(app.dist, "eoan");
        assert_eq!(app.repo, "main");
        assert_eq!(app.depends, vec!["libfoo", "libbar"]);
        assert_eq!(app.files, vec!["usr/bin/app", "usr/share/doc/app/README"]);
        assert!(!state.get("libc6").unwrap().explicit);

        assert_eq!(fs::read_to_string(fx.path("usr/bin/app")).unwrap(), "app");
        assert!(fx.path("lib/libc.so.6").exists());
        assert_eq!(fx.staging_dirs(), 0);
        assert_eq!(
            fx.mirror.requests.borrow()[0],
            "http://mirror.test/ubuntu/pool/app.deb"
        );
    }

    #[test]
    fn test_shared_dependency_installed_once() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![
            record("top", &["left", "right"]),
            record("left", &["base"]),
            record("right", &["base"]),
            record("base", &[]),
        ]
        .into_iter()
        .collect();
        let extractor = FakeExtractor::default()
            .with("top", &["bin/top"])
            .with("left", &["bin/left"])
            .with("right", &["bin/right"])
            .with("base", &["lib/base"]);

        let mut state = InstallationState::new();
        fx.install(&index, &extractor, &["top"], &mut state).unwrap();

        assert_eq!(fx.mirror.fetched("base"), 1);
        assert_eq!(state.len(), 4);
    }

    #[test]
    fn test_already_installed_is_noop() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![record("hello", &[])].into_iter().collect();
        let extractor = FakeExtractor::default().with("hello", &["usr/bin/hello"]);

        let mut state = InstallationState::new();
        fx.install(&index, &extractor, &["hello"], &mut state).unwrap();
        let before = state.clone();

        let report = fx.install(&index, &extractor, &["hello"], &mut state).unwrap();
        assert!(report.installed.is_empty());
        assert_eq!(report.already_installed, vec!["hello"]);
        assert_eq!(fx.mirror.fetched("hello"), 1);
        assert_eq!(state, before);
    }

    #[test]
    fn test_dependency_already_installed_is_skipped() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![record("app", &["libc6"]), record("libc6", &[])]
            .into_iter()
            .collect();
        let extractor = FakeExtractor::default().with("app", &["usr/bin/app"]);

        let mut state = InstallationState::new();
        mark_system(&names(&["libc6"]), &mut state);

        let report = fx.install(&index, &extractor, &["app"], &mut state).unwrap();
        assert_eq!(report.installed, vec!["app"]);
        assert_eq!(fx.mirror.fetched("libc6"), 0);
        assert!(state.get("libc6").unwrap().is_system());
    }

    #[test]
    fn test_conflict_with_existing_file_installs_nothing() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![
            record("a", &["b", "c"]),
            record("b", &[]),
            record("c", &[]),
        ]
        .into_iter()
        .collect();
        let extractor = FakeExtractor::default()
            .with("a", &["usr/bin/a"])
            .with("b", &["usr/bin/b"])
            .with("c", &["usr/bin/c", "etc/shared.conf"]);

        fs::create_dir_all(fx.path("etc")).unwrap();
        fs::write(fx.path("etc/shared.conf"), "user data").unwrap();

        let mut state = InstallationState::new();
        let result = fx.install(&index, &extractor, &["a"], &mut state);

        match result {
            Err(Error::Conflict { path, package }) => {
                assert_eq!(package, "c");
                assert_eq!(path, fx.path("etc/shared.conf"));
            }
            other => panic!("expected conflict, got {:?}", other),
        }

        assert!(state.is_empty());
        assert!(!fx.path("usr/bin/a").exists());
        assert!(!fx.path("usr/bin/b").exists());
        assert!(!fx.path("usr/bin/c").exists());
        assert_eq!(fs::read_to_string(fx.path("etc/shared.conf")).unwrap(), "user data");
        assert_eq!(fx.staging_dirs(), 0);
    }

    #[test]
    fn test_conflict_between_staged_packages() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![record("one", &[]), record("two", &[])]
            .into_iter()
            .collect();
        let extractor = FakeExtractor::default()
            .with("one", &["usr/bin/tool"])
            .with("two", &["usr/bin/tool"]);

        let mut state = InstallationState::new();
        let result = fx.install(&index, &extractor, &["one", "two"], &mut state);

        match result {
            Err(Error::Conflict { path, package }) => {
                assert_eq!(package, "two");
                assert!(path.starts_with(fx.config.state_dir()));
                assert!(path.ends_with("usr/bin/tool"));
            }
            other => panic!("expected conflict, got {:?}", other),
        }
        assert!(state.is_empty());
        assert!(!fx.path("usr/bin/tool").exists());
    }

    fn chain_index() -> (PackageIndex, FakeExtractor) {
        let index: PackageIndex = vec![record("a", &["b"]), record("b", &[])]
            .into_iter()
            .collect();
        let extractor = FakeExtractor::default()
            .with("a", &["opt/a"])
            .with("b", &["usr/bin/b"]);
        (index, extractor)
    }

    #[test]
    fn test_file_where_directory_is_needed_installs_nothing() {
        let fx = Fixture::new();
        let (index, extractor) = chain_index();

        fs::create_dir_all(fx.path("usr")).unwrap();
        fs::write(fx.path("usr/bin"), "not a directory").unwrap();

        let mut state = InstallationState::new();
        let result = fx.install(&index, &extractor, &["a"], &mut state);

        match result {
            Err(Error::Conflict { path, package }) => {
                assert_eq!(package, "b");
                assert_eq!(path, fx.path("usr/bin"));
            }
            other => panic!("expected conflict, got {:?}", other),
        }
        assert!(state.is_empty());
        assert!(!fx.path("opt/a").exists());
        assert_eq!(fs::read_to_string(fx.path("usr/bin")).unwrap(), "not a directory");
        assert_eq!(fx.staging_dirs(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_parent_conflicts() {
        let fx = Fixture::new();
        let (index, extractor) = chain_index();
        std::os::unix::fs::symlink(fx.path("nowhere"), fx.path("usr")).unwrap();

        let mut state = InstallationState::new();
        let result = fx.install(&index, &extractor, &["a"], &mut state);

        assert!(matches!(result, Err(Error::Conflict { path, .. }) if path == fx.path("usr")));
        assert!(!fx.path("opt/a").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_parent_is_allowed() {
        let fx = Fixture::new();
        let (index, extractor) = chain_index();
        fs::create_dir_all(fx.path("real/bin")).unwrap();
        std::os::unix::fs::symlink(fx.path("real"), fx.path("usr")).unwrap();

        let mut state = InstallationState::new();
        let report = fx.install(&index, &extractor, &["a"], &mut state).unwrap();

        assert_eq!(report.installed, vec!["a", "b"]);
        assert_eq!(fs::read_to_string(fx.path("real/bin/b")).unwrap(), "b");
    }

    #[test]
    fn test_commit_failure_moves_files_back() {
        let fx = Fixture::new();
        let (index, extractor) = chain_index();
        let mut state = InstallationState::new();

        let mut tx = Transaction::begin(&fx.config.state_dir()).unwrap();
        {
            let installer = Installer::new(&fx.config, &index, &state, &fx.mirror, &extractor, &fx.target);
            installer.install(&mut tx, "a", true).unwrap();
        }
        assert_eq!(tx.staged(), ["a", "b"]);

        // Appears between staging and commit
        fs::create_dir_all(fx.path("usr")).unwrap();
        fs::write(fx.path("usr/bin"), "late arrival").unwrap();

        let result = tx.commit(fx.root.path(), &mut state);
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(state.is_empty());
        assert!(!fx.path("opt").exists());
        assert_eq!(fs::read_to_string(fx.path("usr/bin")).unwrap(), "late arrival");
        assert_eq!(fx.staging_dirs(), 0);
    }

    #[test]
    fn test_conflict_with_recorded_but_missing_file() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![record("new", &[])].into_iter().collect();
        let extractor = FakeExtractor::default().with("new", &["usr/bin/tool"]);

        let mut state = InstallationState::new();
        let mut old = InstalledPackage::new("eoan", "main", true);
        old.files = vec!["usr/bin/tool".to_string()];
        state.insert("old", old);

        let result = fx.install(&index, &extractor, &["new"], &mut state);
        assert!(matches!(result, Err(Error::Conflict { .. })));
        assert!(!state.contains("new"));
    }

    #[test]
    fn test_extraction_failure_aborts() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![record("a", &["broken"]), record("broken", &[])]
            .into_iter()
            .collect();
        let extractor = FakeExtractor::default().with("a", &["usr/bin/a"]);

        let mut state = InstallationState::new();
        let result = fx.install(&index, &extractor, &["a"], &mut state);

        assert!(matches!(result, Err(Error::Extraction { package, .. }) if package == "broken"));
        assert!(state.is_empty());
        assert!(!fx.path("usr/bin/a").exists());
    }

    #[test]
    fn test_empty_payload_is_extraction_error() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![record("empty", &[])].into_iter().collect();
        let extractor = FakeExtractor::default().with("empty", &[]);

        let mut state = InstallationState::new();
        let result = fx.install(&index, &extractor, &["empty"], &mut state);
        assert!(matches!(result, Err(Error::Extraction { .. })));
    }

    #[test]
    fn test_resolution_failure_fetches_nothing() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![record("hello", &[]), record("help2man", &[])]
            .into_iter()
            .collect();
        let extractor = FakeExtractor::default().with("hello", &["usr/bin/hello"]);

        let mut state = InstallationState::new();

        let result = fx.install(&index, &extractor, &["hello", "zsh"], &mut state);
        assert!(matches!(result, Err(Error::NotFound(_))));

        let result = fx.install(&index, &extractor, &["hello", "hel"], &mut state);
        assert!(matches!(result, Err(Error::AmbiguousName { candidates: 2, .. })));

        assert!(fx.mirror.requests.borrow().is_empty());
        assert_eq!(fx.staging_dirs(), 0);
    }

    #[test]
    fn test_substring_request_resolves() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![record("hello", &[]), record("bash", &[])]
            .into_iter()
            .collect();
        let extractor = FakeExtractor::default().with("hello", &["usr/bin/hello"]);

        let mut state = InstallationState::new();
        let report = fx.install(&index, &extractor, &["ell"], &mut state).unwrap();
        assert_eq!(report.installed, vec!["hello"]);
    }

    #[test]
    fn test_missing_dependency() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![record("app", &["ghost"])].into_iter().collect();
        let extractor = FakeExtractor::default().with("app", &["usr/bin/app"]);

        let mut state = InstallationState::new();
        let result = fx.install(&index, &extractor, &["app"], &mut state);
        assert!(matches!(
            result,
            Err(Error::MissingDependency { package, dependency }) if package == "app" && dependency == "ghost"
        ));
        assert!(!fx.path("usr/bin/app").exists());
    }

    #[test]
    fn test_dependency_cycle_terminates() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![record("ping", &["pong"]), record("pong", &["ping"])]
            .into_iter()
            .collect();
        let extractor = FakeExtractor::default()
            .with("ping", &["bin/ping"])
            .with("pong", &["bin/pong"]);

        let mut state = InstallationState::new();
        let report = fx.install(&index, &extractor, &["ping"], &mut state).unwrap();
        assert_eq!(report.installed, vec!["ping", "pong"]);
        assert_eq!(fx.mirror.fetched("ping"), 1);
    }

    #[test]
    fn test_explicit_request_already_staged_as_dependency() {
        let fx = Fixture::new();
        let index: PackageIndex = vec![record("app", &["lib"]), record("lib", &[])]
            .into_iter()
            .collect();
        let extractor = FakeExtractor::default()
            .with("app", &["bin/app"])
            .with("lib", &["lib/lib.so"]);

        let mut state = InstallationState::new();
        let report = fx.install(&index, &extractor, &["app", "lib"], &mut state).unwrap();
        assert_eq!(report.installed, vec!["app", "lib"]);
        assert_eq!(report.already_installed, vec!["lib"]);
        assert!(!state.get("lib").unwrap().explicit);
    }

    #[test]
    fn test_mark_system() {
        let mut state = InstallationState::new();
        let already = mark_system(&names(&["libc6", "perl"]), &mut state);
        assert!(already.is_empty());
        assert!(state.get("perl").unwrap().is_system());

        let already = mark_system(&names(&["perl"]), &mut state);
        assert_eq!(already, vec!["perl"]);
        assert_eq!(state.len(), 2);
    }
}
