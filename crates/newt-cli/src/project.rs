//! The project: the composition root that ties the manifest, the repo
//! descriptors, the package registry, and the targets together.
//!
//! There is no process-wide current project; commands construct one
//! `Project` value and thread it through everything they call.

use anyhow::{bail, Context, Result};
use newt_core::{yaml, PkgName, Version};
use newt_pkg::{PkgRegistry, Target};
use newt_repo::{ProjectManifest, RepoDescriptor, RepoResolution};
use newt_vcs::Vcs;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Subdirectory the managed repos live under.
const REPOS_DIR: &str = "repos";

/// A loaded project.
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    manifest: ProjectManifest,
    descriptors: BTreeMap<String, RepoDescriptor>,
}

impl Project {
    /// Load `project.yml` from `root` and every installed repo's
    /// `repository.yml`. Repos that are not on disk yet get an empty
    /// descriptor; run `newt install` to materialise them.
    pub fn load(root: &Path) -> Result<Self> {
        let manifest_path = root.join("project.yml");
        let text = std::fs::read_to_string(&manifest_path)
            .with_context(|| format!("cannot read {}", manifest_path.display()))?;
        let doc = yaml::parse_str(&text, "project.yml")?;
        let manifest = ProjectManifest::from_yaml(&doc)?;

        let mut descriptors = BTreeMap::new();
        descriptors.insert(
            manifest.name.clone(),
            RepoDescriptor::local(manifest.name.clone()),
        );

        for (name, spec) in &manifest.repos {
            let repo_yml = root.join(REPOS_DIR).join(name).join("repository.yml");
            let desc = if repo_yml.exists() {
                let text = std::fs::read_to_string(&repo_yml)
                    .with_context(|| format!("cannot read {}", repo_yml.display()))?;
                let doc = yaml::parse_str(&text, &format!("{name}/repository.yml"))?;
                RepoDescriptor::from_yaml(name, &doc)?.with_url(&spec.url)
            } else {
                debug!(repo = %name, "no repository.yml on disk yet");
                RepoDescriptor::from_parts(
                    name.clone(),
                    spec.url.clone(),
                    BTreeMap::new(),
                    BTreeMap::new(),
                    BTreeMap::new(),
                )
            };
            descriptors.insert(name.clone(), desc);
        }

        info!(project = %manifest.name, repos = manifest.repos.len(), "project loaded");
        Ok(Self {
            root: root.to_path_buf(),
            manifest,
            descriptors,
        })
    }

    /// Project root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory the managed repos live under.
    #[must_use]
    pub fn repos_root(&self) -> PathBuf {
        self.root.join(REPOS_DIR)
    }

    /// The parsed manifest.
    #[must_use]
    pub const fn manifest(&self) -> &ProjectManifest {
        &self.manifest
    }

    /// The loaded descriptors, local repo included.
    #[must_use]
    pub const fn descriptors(&self) -> &BTreeMap<String, RepoDescriptor> {
        &self.descriptors
    }

    /// Clone any repo that has no manifest on disk yet, so its
    /// `repository.yml` becomes readable, then reload. Called by the
    /// installer-facing commands before resolution.
    pub fn ensure_manifests(self, vcs: &dyn Vcs) -> Result<Self> {
        let mut cloned = false;
        for (name, spec) in &self.manifest.repos {
            let dir = self.root.join(REPOS_DIR).join(name);
            if dir.join("repository.yml").exists() {
                continue;
            }
            info!(repo = %name, "fetching repository manifest");
            vcs.clone_repo(&spec.url, &dir)?;
            cloned = true;
        }
        if cloned {
            Self::load(&self.root)
        } else {
            Ok(self)
        }
    }

    /// Run repo resolution for this project.
    pub fn resolve_repos(&self) -> Result<RepoResolution> {
        let requirements = self.manifest.requirement_map();
        Ok(newt_repo::resolve(&requirements, &self.descriptors)?)
    }

    /// A registry rooted at the project directory and every installed
    /// repo. The managed repos directory is excluded from the local
    /// repo's scan; its packages belong to their own repos.
    #[must_use]
    pub fn registry(&self) -> PkgRegistry {
        let mut registry = PkgRegistry::new(self.manifest.name.clone());
        registry.add_root_excluding(
            self.manifest.name.clone(),
            self.root.clone(),
            &[self.repos_root()],
        );
        for name in self.manifest.repos.keys() {
            registry.add_root(name.clone(), self.root.join(REPOS_DIR).join(name));
        }
        registry
    }

    /// Load a target by name (`targets/<name>` under the project repo).
    pub fn load_target(&self, name: &str) -> Result<Target> {
        let rel = if name.contains('/') {
            name.to_string()
        } else {
            format!("targets/{name}")
        };
        let dir = self.root.join(&rel);
        let pkg_path = dir.join("pkg.yml");
        if !pkg_path.exists() {
            bail!("target \"{name}\" not found (no {})", pkg_path.display());
        }
        let pkg_text = std::fs::read_to_string(&pkg_path)
            .with_context(|| format!("cannot read {}", pkg_path.display()))?;
        let pkg_doc = yaml::parse_str(&pkg_text, &format!("{rel}/pkg.yml"))?;

        let syscfg_path = dir.join("syscfg.yml");
        let syscfg_doc = if syscfg_path.exists() {
            let text = std::fs::read_to_string(&syscfg_path)
                .with_context(|| format!("cannot read {}", syscfg_path.display()))?;
            Some(yaml::parse_str(&text, &format!("{rel}/syscfg.yml"))?)
        } else {
            None
        };

        Ok(Target::from_yaml(
            &self.manifest.name,
            &pkg_doc,
            syscfg_doc.as_ref(),
        )?)
    }

    /// The version of this tool, for newt-compat checks.
    pub fn tool_version() -> Version {
        Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::unspecified())
    }

    /// Resolve a package name against the local repo, for graph filters.
    pub fn qualify(&self, name: &str) -> Result<String> {
        Ok(PkgName::parse(name)?.resolve(&self.manifest.name).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn scaffold() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("project.yml"),
            r#"
project.name: demo
project.repositories:
    - core
repository.core:
    type: github
    vers: "^1.0.0"
    url: "https://git.example.com/core.git"
"#,
        );
        write(
            &dir.path().join("repos/core/repository.yml"),
            r#"
repo.name: core
repo.versions:
    "1.0.0": "c1"
    "1.2.0": "c2"
"#,
        );
        write(
            &dir.path().join("targets/blink/pkg.yml"),
            r#"
pkg.name: targets/blink
pkg.type: target
target.app: apps/blinky
target.bsp: "@core/hw/bsp/native"
"#,
        );
        dir
    }

    #[test]
    fn load_and_resolve() {
        let dir = scaffold();
        let project = Project::load(dir.path()).unwrap();
        assert_eq!(project.manifest().name, "demo");
        assert!(project.descriptors()["demo"].is_local());

        let resolution = project.resolve_repos().unwrap();
        assert_eq!(resolution.version_map["core"].to_string(), "1.2.0");
    }

    #[test]
    fn load_target() {
        let dir = scaffold();
        let project = Project::load(dir.path()).unwrap();
        let target = project.load_target("blink").unwrap();
        assert_eq!(target.name().to_string(), "@demo/targets/blink");
        assert_eq!(target.bsp.to_string(), "@core/hw/bsp/native");
    }

    #[test]
    fn missing_target_is_an_error() {
        let dir = scaffold();
        let project = Project::load(dir.path()).unwrap();
        assert!(project.load_target("ghost").is_err());
    }

    /// Full pipeline over on-disk manifests: project -> repo resolution
    /// -> package/syscfg resolution.
    #[test]
    fn end_to_end_target_resolution() {
        let dir = scaffold();
        write(
            &dir.path().join("apps/blinky/pkg.yml"),
            "pkg.name: apps/blinky\npkg.type: app\npkg.deps:\n    - \"@core/sys/log\"\n",
        );
        write(
            &dir.path().join("repos/core/hw/bsp/native/pkg.yml"),
            "pkg.name: hw/bsp/native\npkg.type: bsp\npkg.cflags: [\"-DNATIVE\"]\n",
        );
        write(
            &dir.path().join("repos/core/sys/log/pkg.yml"),
            "pkg.name: sys/log\npkg.type: lib\npkg.apis: [log]\npkg.init:\n    log_init: 100\n",
        );
        write(
            &dir.path().join("repos/core/sys/log/syscfg.yml"),
            "syscfg.defs:\n    LOG_LEVEL:\n        value: 0\n        type: int\n",
        );
        write(
            &dir.path().join("targets/blink/syscfg.yml"),
            "syscfg.vals:\n    LOG_LEVEL: 3\n",
        );

        let project = Project::load(dir.path()).unwrap();
        let repos = project.resolve_repos().unwrap();
        let target = project.load_target("blink").unwrap();
        let mut registry = project.registry();

        let resolution = newt_resolver::resolve_target(newt_resolver::ResolveParams {
            registry: &mut registry,
            target: &target,
            version_map: repos.version_map,
            policy: newt_syscfg::AmbiguityPolicy::FirstSeen,
            warnings: repos.warnings,
        })
        .unwrap();

        assert_eq!(resolution.version_map["core"].to_string(), "1.2.0");
        assert!(resolution.contains("@core/sys/log"));
        assert!(resolution.contains("@core/hw/bsp/native"));
        assert_eq!(resolution.syscfg["LOG_LEVEL"], "3");
        assert_eq!(resolution.sysinit[0].function, "log_init");
        assert!(resolution.warnings.is_empty());
    }
}
