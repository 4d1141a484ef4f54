//! The package registry: packages grouped by owning repo, loaded lazily
//! on first reference.
//!
//! Tests and the resolver's unit fixtures insert packages directly; the
//! real tool registers each cloned repo's root directory and the
//! registry scans for `pkg.yml` files the first time a package from that
//! repo is referenced.

use crate::error::{PkgError, Result};
use crate::package::Package;
use ahash::AHashSet;
use newt_core::PkgName;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
struct Root {
    path: PathBuf,
    /// Subtrees not owned by this repo (the project root contains the
    /// managed repos directory, which belongs to other repos).
    excludes: Vec<PathBuf>,
}

/// All packages known to one project.
#[derive(Debug)]
pub struct PkgRegistry {
    local_repo: String,
    packages: BTreeMap<String, Package>,
    roots: BTreeMap<String, Root>,
    scanned: AHashSet<String>,
}

impl PkgRegistry {
    /// Create a registry; `local_repo` is what unqualified names resolve
    /// against.
    #[must_use]
    pub fn new(local_repo: impl Into<String>) -> Self {
        Self {
            local_repo: local_repo.into(),
            packages: BTreeMap::new(),
            roots: BTreeMap::new(),
            scanned: AHashSet::new(),
        }
    }

    /// The local repo name.
    #[must_use]
    pub fn local_repo(&self) -> &str {
        &self.local_repo
    }

    /// Register a repo's on-disk root for lazy scanning.
    pub fn add_root(&mut self, repo: impl Into<String>, path: impl Into<PathBuf>) {
        self.add_root_excluding(repo, path, &[]);
    }

    /// Register a root, skipping the given subtrees during the scan.
    pub fn add_root_excluding(
        &mut self,
        repo: impl Into<String>,
        path: impl Into<PathBuf>,
        excludes: &[PathBuf],
    ) {
        self.roots.insert(
            repo.into(),
            Root {
                path: path.into(),
                excludes: excludes.to_vec(),
            },
        );
    }

    /// Insert an already-loaded package.
    pub fn insert(&mut self, pkg: Package) -> Result<()> {
        let key = pkg.name.to_string();
        if let Some(existing) = self.packages.get(&key) {
            return Err(PkgError::DuplicatePackage {
                name: key,
                first: existing.name.to_string(),
                second: pkg.name.to_string(),
            });
        }
        self.packages.insert(key, pkg);
        Ok(())
    }

    /// Look up a package, scanning its repo on first reference.
    pub fn get(&mut self, name: &PkgName) -> Result<&Package> {
        let resolved = name.resolve(&self.local_repo);
        let key = resolved.to_string();

        if !self.packages.contains_key(&key) {
            if let Some(repo) = resolved.repo().map(str::to_string) {
                self.ensure_scanned(&repo)?;
            }
        }

        self.packages
            .get(&key)
            .ok_or(PkgError::UnknownPackage { name: key })
    }

    /// Like [`PkgRegistry::get`] but without an error for absence.
    pub fn lookup(&mut self, name: &PkgName) -> Option<&Package> {
        let resolved = name.resolve(&self.local_repo);
        let key = resolved.to_string();
        if !self.packages.contains_key(&key) {
            if let Some(repo) = resolved.repo().map(str::to_string) {
                self.ensure_scanned(&repo).ok()?;
            }
        }
        self.packages.get(&key)
    }

    /// Every loaded package, sorted by qualified name. Does not trigger
    /// scans.
    pub fn loaded(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    fn ensure_scanned(&mut self, repo: &str) -> Result<()> {
        if self.scanned.contains(repo) {
            return Ok(());
        }
        self.scanned.insert(repo.to_string());

        let Some(root) = self.roots.get(repo).cloned() else {
            return Ok(());
        };
        self.scan_root(repo, &root)
    }

    /// Walk a repo for `pkg.yml` files and load each package with its
    /// adjacent `syscfg.yml`.
    fn scan_root(&mut self, repo: &str, root: &Root) -> Result<()> {
        debug!(%repo, root = %root.path.display(), "scanning repo for packages");
        let mut loaded = 0usize;

        let excluded =
            |path: &Path| root.excludes.iter().any(|ex| path.starts_with(ex));

        for entry in WalkDir::new(&root.path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !excluded(e.path()))
            .filter_map(std::result::Result::ok)
        {
            if !entry.file_type().is_file() || entry.file_name() != "pkg.yml" {
                continue;
            }
            let pkg_path = entry.path();
            let pkg_doc = read_yaml(pkg_path)?;

            let syscfg_path = pkg_path.with_file_name("syscfg.yml");
            let syscfg_doc = if syscfg_path.exists() {
                Some(read_yaml(&syscfg_path)?)
            } else {
                None
            };

            let pkg = Package::from_yaml(repo, &pkg_doc, syscfg_doc.as_ref())?;
            trace!(pkg = %pkg.name, "loaded");
            self.insert(pkg)?;
            loaded += 1;
        }

        debug!(%repo, loaded, "repo scan complete");
        Ok(())
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).map_err(|source| PkgError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(newt_core::yaml::parse_str(
        &text,
        &path.display().to_string(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pkg(repo: &str, name: &str) -> Package {
        let doc: Value =
            serde_yaml::from_str(&format!("pkg.name: {name}\npkg.type: lib\n")).unwrap();
        Package::from_yaml(repo, &doc, None).unwrap()
    }

    #[test]
    fn insert_and_get() {
        let mut reg = PkgRegistry::new("project");
        reg.insert(pkg("core", "sys/log")).unwrap();

        let found = reg.get(&PkgName::parse("@core/sys/log").unwrap()).unwrap();
        assert_eq!(found.name.to_string(), "@core/sys/log");
    }

    #[test]
    fn unqualified_resolves_against_local_repo() {
        let mut reg = PkgRegistry::new("project");
        reg.insert(pkg("project", "apps/blinky")).unwrap();

        let found = reg.get(&PkgName::parse("apps/blinky").unwrap()).unwrap();
        assert_eq!(found.name.repo(), Some("project"));
    }

    #[test]
    fn duplicate_rejected() {
        let mut reg = PkgRegistry::new("project");
        reg.insert(pkg("core", "sys/log")).unwrap();
        let err = reg.insert(pkg("core", "sys/log")).unwrap_err();
        assert!(matches!(err, PkgError::DuplicatePackage { .. }));
    }

    #[test]
    fn unknown_package() {
        let mut reg = PkgRegistry::new("project");
        let err = reg.get(&PkgName::parse("@ghost/a/b").unwrap()).unwrap_err();
        assert!(matches!(err, PkgError::UnknownPackage { .. }));
    }

    #[test]
    fn lazy_scan_on_first_reference() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path().join("sys/console");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(
            pkg_dir.join("pkg.yml"),
            "pkg.name: sys/console\npkg.type: lib\npkg.apis: [console]\n",
        )
        .unwrap();
        std::fs::write(
            pkg_dir.join("syscfg.yml"),
            "syscfg.defs:\n    CONSOLE_ECHO:\n        value: 1\n        type: bool\n",
        )
        .unwrap();

        let mut reg = PkgRegistry::new("project");
        reg.add_root("core", dir.path());

        assert_eq!(reg.loaded().count(), 0);
        let found = reg.get(&PkgName::parse("@core/sys/console").unwrap()).unwrap();
        assert_eq!(found.apis[0].name, "console");
        assert_eq!(found.syscfg_defs[0].name, "CONSOLE_ECHO");
        assert_eq!(reg.loaded().count(), 1);
    }
}
