//! One package: identity, dependencies, APIs, flags, syscfg tables.
//!
//! A package is described by `pkg.yml` plus an optional adjacent
//! `syscfg.yml`. Dependency, API, and override entries may be gated:
//! a key of the form `pkg.deps.<expr>` applies its entries only when the
//! expression holds under the final syscfg.

use crate::error::Result;
use crate::types::PackageType;
use newt_core::{yaml, Expr, PkgName};
use newt_syscfg::{Restriction, SettingDef, SettingType};
use serde_yaml::Value;
use std::collections::BTreeMap;
use tracing::trace;

/// A dependency on another package, possibly gated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgDep {
    /// The depended-on package.
    pub name: PkgName,
    /// Gate; `None` means unconditional.
    pub expr: Option<Expr>,
}

/// A provided or required API, possibly gated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDecl {
    /// API identifier.
    pub name: String,
    /// Gate; `None` means unconditional.
    pub expr: Option<Expr>,
    /// Tie-breaker weight among multiple providers of the same API.
    pub weight: i64,
}

/// One `syscfg.vals` override, possibly gated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideVal {
    /// Setting name.
    pub name: String,
    /// Assigned value.
    pub value: String,
    /// Gate; `None` means unconditional.
    pub expr: Option<Expr>,
}

/// One `syscfg.logs` declaration. Module and level are setting names or
/// literals, resolved against the final syscfg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDecl {
    /// Log name.
    pub name: String,
    /// Module id: literal or setting reference.
    pub module: String,
    /// Level: literal or setting reference.
    pub level: String,
}

/// A loaded package.
#[derive(Debug, Clone)]
pub struct Package {
    /// Fully-qualified name.
    pub name: PkgName,
    /// Package type.
    pub typ: PackageType,
    /// Declared dependencies.
    pub deps: Vec<PkgDep>,
    /// APIs this package provides.
    pub apis: Vec<ApiDecl>,
    /// APIs this package requires.
    pub req_apis: Vec<ApiDecl>,
    /// Compiler flags.
    pub cflags: Vec<String>,
    /// Assembler flags.
    pub aflags: Vec<String>,
    /// Linker flags.
    pub lflags: Vec<String>,
    /// System-init functions: function name -> stage.
    pub init: BTreeMap<String, i64>,
    /// System-shutdown functions: function name -> stage.
    pub down: BTreeMap<String, i64>,
    /// Setting definitions from the adjacent `syscfg.yml`.
    pub syscfg_defs: Vec<SettingDef>,
    /// Setting overrides from the adjacent `syscfg.yml`.
    pub syscfg_vals: Vec<OverrideVal>,
    /// Log declarations from the adjacent `syscfg.yml`.
    pub logs: Vec<LogDecl>,
}

impl Package {
    /// Parse `pkg.yml` (and `syscfg.yml` when present) into a package
    /// owned by `repo`.
    pub fn from_yaml(repo: &str, pkg_doc: &Value, syscfg_doc: Option<&Value>) -> Result<Self> {
        let ctx = format!("@{repo}/pkg.yml");
        let root = yaml::as_mapping(pkg_doc, &ctx)?;

        let raw_name = yaml::require_str(root, "pkg.name", &ctx)?;
        let name = PkgName::parse(&raw_name)?.resolve(repo);
        let ctx = format!("{name}/pkg.yml");

        let typ = match yaml::str_field(root, "pkg.type", &ctx)? {
            Some(text) => text
                .parse::<PackageType>()
                .map_err(|e| newt_core::Error::bad_manifest(&ctx, e))?,
            None => PackageType::default(),
        };

        let mut pkg = Self {
            name,
            typ,
            deps: Vec::new(),
            apis: Vec::new(),
            req_apis: Vec::new(),
            cflags: yaml::string_list_field(root, "pkg.cflags", &ctx)?,
            aflags: yaml::string_list_field(root, "pkg.aflags", &ctx)?,
            lflags: yaml::string_list_field(root, "pkg.lflags", &ctx)?,
            init: stage_map(root, "pkg.init", &ctx)?,
            down: stage_map(root, "pkg.down", &ctx)?,
            syscfg_defs: Vec::new(),
            syscfg_vals: Vec::new(),
            logs: Vec::new(),
        };

        // Plain and gated entry lists. A key `pkg.deps.<expr>` gates its
        // entries on the expression.
        for (key, value) in root {
            let Some(key) = yaml::scalar_to_string(key) else {
                continue;
            };
            for (prefix, kind) in [
                ("pkg.deps", EntryKind::Dep),
                ("pkg.apis", EntryKind::Api),
                ("pkg.req_apis", EntryKind::ReqApi),
            ] {
                if key == prefix {
                    pkg.push_entries(kind, None, value, &ctx)?;
                } else if let Some(expr_text) = key.strip_prefix(&format!("{prefix}.")) {
                    let expr = Expr::parse(expr_text)?;
                    pkg.push_entries(kind, Some(expr), value, &ctx)?;
                }
            }
        }

        if let Some(doc) = syscfg_doc {
            pkg.parse_syscfg(doc)?;
        }

        trace!(pkg = %pkg.name, typ = %pkg.typ, deps = pkg.deps.len(), "parsed package");
        Ok(pkg)
    }

    fn push_entries(
        &mut self,
        kind: EntryKind,
        expr: Option<Expr>,
        value: &Value,
        ctx: &str,
    ) -> Result<()> {
        match kind {
            EntryKind::Dep => {
                for text in yaml::string_list(value, ctx)? {
                    self.deps.push(PkgDep {
                        name: PkgName::parse(&text)?,
                        expr: expr.clone(),
                    });
                }
            }
            EntryKind::Api | EntryKind::ReqApi => {
                let list = match kind {
                    EntryKind::Api => &mut self.apis,
                    _ => &mut self.req_apis,
                };
                for decl in api_list(value, expr.as_ref(), ctx)? {
                    list.push(decl);
                }
            }
        }
        Ok(())
    }

    fn parse_syscfg(&mut self, doc: &Value) -> Result<()> {
        let ctx = format!("{}/syscfg.yml", self.name);
        let root = yaml::as_mapping(doc, &ctx)?;

        if let Some(defs) = yaml::field(root, "syscfg.defs") {
            let defs = yaml::as_mapping(defs, &format!("{ctx}:syscfg.defs"))?;
            for (name, body) in defs {
                let name = yaml::scalar_to_string(name).ok_or_else(|| {
                    newt_core::Error::bad_manifest(&ctx, "non-scalar setting name")
                })?;
                self.syscfg_defs.push(parse_def(&name, body, &ctx)?);
            }
        }

        for (key, value) in root {
            let Some(key) = yaml::scalar_to_string(key) else {
                continue;
            };
            if key == "syscfg.vals" {
                self.push_vals(None, value, &ctx)?;
            } else if let Some(expr_text) = key.strip_prefix("syscfg.vals.") {
                let expr = Expr::parse(expr_text)?;
                self.push_vals(Some(expr), value, &ctx)?;
            }
        }

        if let Some(logs) = yaml::field(root, "syscfg.logs") {
            let logs = yaml::as_mapping(logs, &format!("{ctx}:syscfg.logs"))?;
            for (name, body) in logs {
                let name = yaml::scalar_to_string(name)
                    .ok_or_else(|| newt_core::Error::bad_manifest(&ctx, "non-scalar log name"))?;
                let body = yaml::as_mapping(body, &format!("{ctx}:syscfg.logs.{name}"))?;
                self.logs.push(LogDecl {
                    module: yaml::require_str(body, "module", &ctx)?,
                    level: yaml::require_str(body, "level", &ctx)?,
                    name,
                });
            }
        }

        Ok(())
    }

    fn push_vals(&mut self, expr: Option<Expr>, value: &Value, ctx: &str) -> Result<()> {
        let map = yaml::as_mapping(value, &format!("{ctx}:syscfg.vals"))?;
        for (name, val) in map {
            let name = yaml::scalar_to_string(name)
                .ok_or_else(|| newt_core::Error::bad_manifest(ctx, "non-scalar setting name"))?;
            let val = yaml::scalar_to_string(val).ok_or_else(|| {
                newt_core::Error::bad_manifest(ctx, format!("non-scalar value for {name}"))
            })?;
            self.syscfg_vals.push(OverrideVal {
                name,
                value: val,
                expr: expr.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum EntryKind {
    Dep,
    Api,
    ReqApi,
}

/// Parse an API list. Entries are either a plain identifier or a
/// one-key mapping `name: weight` for weight-preferred providers.
fn api_list(value: &Value, expr: Option<&Expr>, ctx: &str) -> Result<Vec<ApiDecl>> {
    let seq = match value {
        Value::Sequence(seq) => seq.clone(),
        other => vec![other.clone()],
    };

    let mut out = Vec::new();
    for item in seq {
        match item {
            Value::Mapping(map) => {
                for (name, weight) in &map {
                    let name = yaml::scalar_to_string(name).ok_or_else(|| {
                        newt_core::Error::bad_manifest(ctx, "non-scalar api name")
                    })?;
                    let weight = yaml::scalar_to_string(weight)
                        .and_then(|s| s.parse::<i64>().ok())
                        .ok_or_else(|| {
                            newt_core::Error::bad_manifest(
                                ctx,
                                format!("api {name}: weight must be an integer"),
                            )
                        })?;
                    out.push(ApiDecl {
                        name,
                        expr: expr.cloned(),
                        weight,
                    });
                }
            }
            other => {
                let name = yaml::scalar_to_string(&other)
                    .ok_or_else(|| newt_core::Error::bad_manifest(ctx, "non-scalar api entry"))?;
                out.push(ApiDecl {
                    name,
                    expr: expr.cloned(),
                    weight: 0,
                });
            }
        }
    }
    Ok(out)
}

/// Parse a `pkg.init` / `pkg.down` stage table.
fn stage_map(
    root: &serde_yaml::Mapping,
    key: &str,
    ctx: &str,
) -> Result<BTreeMap<String, i64>> {
    let Some(value) = yaml::field(root, key) else {
        return Ok(BTreeMap::new());
    };
    let map = yaml::as_mapping(value, &format!("{ctx}:{key}"))?;
    let mut out = BTreeMap::new();
    for (func, stage) in map {
        let func = yaml::scalar_to_string(func)
            .ok_or_else(|| newt_core::Error::bad_manifest(ctx, "non-scalar function name"))?;
        let stage = yaml::scalar_to_string(stage)
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| {
                newt_core::Error::bad_manifest(ctx, format!("{key}.{func}: stage must be an integer"))
            })?;
        out.insert(func, stage);
    }
    Ok(out)
}

/// Parse one `syscfg.defs` entry.
fn parse_def(name: &str, body: &Value, ctx: &str) -> Result<SettingDef> {
    let body = yaml::as_mapping(body, &format!("{ctx}:{name}"))?;

    let typ = match yaml::str_field(body, "type", ctx)? {
        Some(text) => SettingType::parse(&text).ok_or_else(|| {
            newt_core::Error::bad_manifest(ctx, format!("setting {name}: unknown type \"{text}\""))
        })?,
        None => SettingType::default(),
    };
    let value = yaml::str_field(body, "value", ctx)?.unwrap_or_default();
    let description = yaml::str_field(body, "description", ctx)?.unwrap_or_default();
    let deprecated = yaml::str_field(body, "deprecated", ctx)?
        .map_or(false, |v| v == "1" || v == "true");

    let mut restrictions = Vec::new();
    if let Some(list) = yaml::field(body, "restrictions") {
        for text in yaml::string_list(list, &format!("{ctx}:{name}.restrictions"))? {
            if text.trim() == "$notnull" {
                restrictions.push(Restriction::NotNull);
            } else {
                restrictions.push(Restriction::Expr(Expr::parse(&text)?));
            }
        }
    }

    Ok(SettingDef {
        name: name.to_string(),
        typ,
        value,
        description,
        restrictions,
        deprecated,
    })
}
