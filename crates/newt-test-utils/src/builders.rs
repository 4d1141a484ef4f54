//! Fluent builders for in-memory repos, packages, and targets.

use newt_core::{Expr, PkgName, VerReq, Version};
use newt_pkg::{ApiDecl, LogDecl, OverrideVal, Package, PackageType, PkgDep, Target};
use newt_repo::descriptor::{CompatCode, RepoDescriptor, RepoReq};
use newt_syscfg::{SettingDef, SettingType};
use std::collections::BTreeMap;

/// Builder for [`RepoDescriptor`].
#[derive(Debug)]
pub struct RepoBuilder {
    name: String,
    url: String,
    vers: BTreeMap<String, String>,
    deps: BTreeMap<newt_core::version::NumericVersion, Vec<RepoReq>>,
    compat: BTreeMap<newt_core::version::NumericVersion, Vec<(Version, CompatCode)>>,
}

impl RepoBuilder {
    /// Start a repo named `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: format!("https://git.example.com/{name}.git"),
            vers: BTreeMap::new(),
            deps: BTreeMap::new(),
            compat: BTreeMap::new(),
        }
    }

    /// Map a version specifier to a commit (or another specifier).
    #[must_use]
    pub fn version(mut self, spec: &str, commit: &str) -> Self {
        self.vers.insert(
            Version::parse(spec).unwrap().to_string(),
            commit.to_string(),
        );
        self
    }

    /// Declare that `ver` of this repo depends on `repo` at `reqs`.
    #[must_use]
    pub fn dep(mut self, ver: &str, repo: &str, reqs: &str) -> Self {
        self.deps
            .entry(Version::parse(ver).unwrap().numeric())
            .or_default()
            .push(RepoReq {
                repo: repo.to_string(),
                reqs: VerReq::parse_list(reqs).unwrap(),
            });
        self
    }

    /// Add a newt-compat row.
    #[must_use]
    pub fn compat(mut self, ver: &str, tool: &str, code: CompatCode) -> Self {
        let entry = (Version::parse(tool).unwrap(), code);
        let row = self
            .compat
            .entry(Version::parse(ver).unwrap().numeric())
            .or_default();
        row.push(entry);
        row.sort_by(|a, b| a.0.cmp_numeric(&b.0));
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> RepoDescriptor {
        RepoDescriptor::from_parts(self.name, self.url, self.vers, self.deps, self.compat)
    }
}

/// Builder for [`Package`].
#[derive(Debug)]
pub struct PkgBuilder {
    pkg: Package,
}

impl PkgBuilder {
    /// Start a lib package `name` owned by `repo`.
    #[must_use]
    pub fn new(repo: &str, name: &str) -> Self {
        Self {
            pkg: Package {
                name: PkgName::parse(name).unwrap().resolve(repo),
                typ: PackageType::Lib,
                deps: Vec::new(),
                apis: Vec::new(),
                req_apis: Vec::new(),
                cflags: Vec::new(),
                aflags: Vec::new(),
                lflags: Vec::new(),
                init: BTreeMap::new(),
                down: BTreeMap::new(),
                syscfg_defs: Vec::new(),
                syscfg_vals: Vec::new(),
                logs: Vec::new(),
            },
        }
    }

    /// Set the package type.
    #[must_use]
    pub fn typ(mut self, typ: PackageType) -> Self {
        self.pkg.typ = typ;
        self
    }

    /// Unconditional dependency.
    #[must_use]
    pub fn dep(mut self, name: &str) -> Self {
        self.pkg.deps.push(PkgDep {
            name: PkgName::parse(name).unwrap(),
            expr: None,
        });
        self
    }

    /// Gated dependency.
    #[must_use]
    pub fn dep_if(mut self, name: &str, expr: &str) -> Self {
        self.pkg.deps.push(PkgDep {
            name: PkgName::parse(name).unwrap(),
            expr: Some(Expr::parse(expr).unwrap()),
        });
        self
    }

    /// Unconditional provided API.
    #[must_use]
    pub fn api(self, name: &str) -> Self {
        self.api_full(name, None, 0)
    }

    /// Gated provided API.
    #[must_use]
    pub fn api_if(self, name: &str, expr: &str) -> Self {
        self.api_full(name, Some(expr), 0)
    }

    /// Weight-preferred provided API.
    #[must_use]
    pub fn api_weighted(self, name: &str, weight: i64) -> Self {
        self.api_full(name, None, weight)
    }

    fn api_full(mut self, name: &str, expr: Option<&str>, weight: i64) -> Self {
        self.pkg.apis.push(ApiDecl {
            name: name.to_string(),
            expr: expr.map(|e| Expr::parse(e).unwrap()),
            weight,
        });
        self
    }

    /// Unconditional required API.
    #[must_use]
    pub fn req_api(mut self, name: &str) -> Self {
        self.pkg.req_apis.push(ApiDecl {
            name: name.to_string(),
            expr: None,
            weight: 0,
        });
        self
    }

    /// Setting definition.
    #[must_use]
    pub fn def(mut self, name: &str, typ: SettingType, value: &str) -> Self {
        self.pkg.syscfg_defs.push(SettingDef::new(name, typ, value));
        self
    }

    /// Full setting definition.
    #[must_use]
    pub fn def_full(mut self, def: SettingDef) -> Self {
        self.pkg.syscfg_defs.push(def);
        self
    }

    /// Unconditional override.
    #[must_use]
    pub fn val(mut self, name: &str, value: &str) -> Self {
        self.pkg.syscfg_vals.push(OverrideVal {
            name: name.to_string(),
            value: value.to_string(),
            expr: None,
        });
        self
    }

    /// Gated override.
    #[must_use]
    pub fn val_if(mut self, name: &str, value: &str, expr: &str) -> Self {
        self.pkg.syscfg_vals.push(OverrideVal {
            name: name.to_string(),
            value: value.to_string(),
            expr: Some(Expr::parse(expr).unwrap()),
        });
        self
    }

    /// System-init entry.
    #[must_use]
    pub fn init(mut self, function: &str, stage: i64) -> Self {
        self.pkg.init.insert(function.to_string(), stage);
        self
    }

    /// System-shutdown entry.
    #[must_use]
    pub fn down(mut self, function: &str, stage: i64) -> Self {
        self.pkg.down.insert(function.to_string(), stage);
        self
    }

    /// Log declaration.
    #[must_use]
    pub fn log(mut self, name: &str, module: &str, level: &str) -> Self {
        self.pkg.logs.push(LogDecl {
            name: name.to_string(),
            module: module.to_string(),
            level: level.to_string(),
        });
        self
    }

    /// Compiler flags.
    #[must_use]
    pub fn cflags(mut self, flags: &[&str]) -> Self {
        self.pkg.cflags = flags.iter().map(ToString::to_string).collect();
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> Package {
        self.pkg
    }
}

/// Builder for [`Target`].
#[derive(Debug)]
pub struct TargetBuilder {
    pkg: PkgBuilder,
    app: Option<String>,
    bsp: String,
    loader: Option<String>,
    compiler: Option<String>,
    unittest: Option<String>,
    build_profile: String,
}

impl TargetBuilder {
    /// Start a target named `name` in `repo`, building for `bsp`.
    #[must_use]
    pub fn new(repo: &str, name: &str, bsp: &str) -> Self {
        Self {
            pkg: PkgBuilder::new(repo, name).typ(PackageType::Target),
            app: None,
            bsp: bsp.to_string(),
            loader: None,
            compiler: None,
            unittest: None,
            build_profile: "default".to_string(),
        }
    }

    /// Set the application package.
    #[must_use]
    pub fn app(mut self, name: &str) -> Self {
        self.app = Some(name.to_string());
        self
    }

    /// Set the loader package.
    #[must_use]
    pub fn loader(mut self, name: &str) -> Self {
        self.loader = Some(name.to_string());
        self
    }

    /// Set the compiler package.
    #[must_use]
    pub fn compiler(mut self, name: &str) -> Self {
        self.compiler = Some(name.to_string());
        self
    }

    /// Set the unit-test package.
    #[must_use]
    pub fn unittest(mut self, name: &str) -> Self {
        self.unittest = Some(name.to_string());
        self
    }

    /// Target-level override.
    #[must_use]
    pub fn val(mut self, name: &str, value: &str) -> Self {
        self.pkg = self.pkg.val(name, value);
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> Target {
        let parse = |s: &String| PkgName::parse(s).unwrap();
        Target {
            pkg: self.pkg.build(),
            app: self.app.as_ref().map(parse),
            bsp: PkgName::parse(&self.bsp).unwrap(),
            loader: self.loader.as_ref().map(parse),
            compiler: self.compiler.as_ref().map(parse),
            unittest: self.unittest.as_ref().map(parse),
            build_profile: self.build_profile,
        }
    }
}
