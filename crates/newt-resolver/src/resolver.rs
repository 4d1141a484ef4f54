//! Fix-point resolution of one target.
//!
//! Each round runs package expansion (gated dependencies evaluated under
//! the current syscfg), then syscfg recomputation. The loop ends when a
//! full round adds no package, records no new setting history entry, and
//! moves no value. Only then are API demands bound and failures decided;
//! an API that lacked a provider in an early round is not an error if a
//! later round pulled one in.

use crate::error::{ResolveError, Result};
use crate::resolution::{ApiBinding, LogEntry, Resolution, ResolvedPkg, StageFunc};
use newt_core::PkgName;
use newt_pkg::{Package, PackageType, PkgRegistry, Target};
use newt_repo::VersionMap;
use newt_syscfg::{AmbiguityPolicy, OverrideLevel, Syscfg};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Everything [`resolve_target`] needs.
#[derive(Debug)]
pub struct ResolveParams<'a> {
    /// The project's package registry.
    pub registry: &'a mut PkgRegistry,
    /// The target to resolve.
    pub target: &'a Target,
    /// Version map from repo resolution; carried into the
    /// [`Resolution`].
    pub version_map: VersionMap,
    /// Winner selection for ambiguous same-level overrides.
    pub policy: AmbiguityPolicy,
    /// Warnings accumulated by earlier stages (repo resolution).
    pub warnings: Vec<String>,
}

/// Safety net; the loop is monotone and converges far earlier.
const MAX_ROUNDS: usize = 1000;

/// Resolve one target to fix-point.
pub fn resolve_target(params: ResolveParams<'_>) -> Result<Resolution> {
    let ResolveParams {
        registry,
        target,
        version_map,
        policy,
        mut warnings,
    } = params;

    let mut syscfg = Syscfg::new(policy);
    let mut included: BTreeSet<String> = BTreeSet::new();
    let mut cache: BTreeMap<String, Package> = BTreeMap::new();

    // Seed set: app, BSP, optional loader, unit-test package, compiler.
    let seeds: Vec<&PkgName> = [
        target.app.as_ref(),
        Some(&target.bsp),
        target.loader.as_ref(),
        target.unittest.as_ref(),
        target.compiler.as_ref(),
    ]
    .into_iter()
    .flatten()
    .collect();

    for seed in seeds {
        let pkg = registry.get(seed)?.clone();
        include(&mut included, &mut cache, pkg);
    }

    // The target package's own overrides sit at the highest
    // user-controlled level; unit-test targets get TEST injected above
    // even that.
    let target_name = target.name().to_string();
    for val in &target.pkg.syscfg_vals {
        syscfg.add_override(
            &target_name,
            OverrideLevel::Target,
            &val.name,
            val.value.clone(),
            val.expr.clone(),
        );
    }
    if target.unittest.is_some() {
        syscfg.inject("TEST", "1");
    }

    let mut rounds = 0usize;
    loop {
        rounds += 1;
        if rounds > MAX_ROUNDS {
            warn!(rounds, "resolution did not converge; keeping last state");
            break;
        }

        let mut changed = false;

        // Syscfg contributions from every included package. Re-adding is
        // idempotent, so newly included packages are the only effect.
        for name in included.iter() {
            let pkg = &cache[name];
            changed |= syscfg
                .add_defs(name, &pkg.syscfg_defs)
                .map_err(ResolveError::Syscfg)?;
            let level = override_level(pkg.typ);
            for val in &pkg.syscfg_vals {
                changed |= syscfg.add_override(
                    name,
                    level,
                    &val.name,
                    val.value.clone(),
                    val.expr.clone(),
                );
            }
        }
        changed |= syscfg.reevaluate();

        // Expansion: follow dependencies whose gates hold right now.
        let snapshot: Vec<String> = included.iter().cloned().collect();
        for name in snapshot {
            let deps = cache[&name].deps.clone();
            for dep in deps {
                if !dep.expr.as_ref().map_or(true, |x| x.eval(&syscfg)) {
                    continue;
                }
                let resolved = dep.name.resolve(registry.local_repo()).to_string();
                if included.contains(&resolved) {
                    continue;
                }
                // Unknown packages are decided after convergence; the
                // gate that demands them may yet flip off.
                if let Some(pkg) = registry.lookup(&dep.name) {
                    let pkg = pkg.clone();
                    include(&mut included, &mut cache, pkg);
                    changed = true;
                }
            }
        }

        if !changed {
            debug!(rounds, packages = included.len(), "fix-point reached");
            break;
        }
    }

    let mut errors: Vec<ResolveError> = Vec::new();

    // Unknown dependencies, judged under the final syscfg.
    for name in &included {
        for dep in &cache[name].deps {
            if !dep.expr.as_ref().map_or(true, |x| x.eval(&syscfg)) {
                continue;
            }
            let resolved = dep.name.resolve(registry.local_repo()).to_string();
            if !included.contains(&resolved) {
                errors.push(ResolveError::Pkg(newt_pkg::PkgError::UnknownPackage {
                    name: resolved,
                }));
            }
        }
    }

    // Syscfg validation.
    match syscfg.finalize() {
        Ok(report) => warnings.extend(report.warnings),
        Err(e) => errors.push(ResolveError::Syscfg(e)),
    }

    // API demands and providers, judged at fix-point.
    let api_bindings = bind_apis(&included, &cache, &syscfg, &mut errors);

    if !errors.is_empty() {
        return Err(ResolveError::from_list(errors));
    }

    let resolution = assemble(
        target,
        version_map,
        &included,
        &cache,
        &syscfg,
        api_bindings,
        warnings,
        registry.local_repo(),
    );
    info!(
        target = %resolution.target,
        packages = resolution.packages.len(),
        apis = resolution.api_bindings.len(),
        "target resolved"
    );
    Ok(resolution)
}

fn include(included: &mut BTreeSet<String>, cache: &mut BTreeMap<String, Package>, pkg: Package) {
    let name = pkg.name.to_string();
    if included.insert(name.clone()) {
        cache.insert(name, pkg);
    }
}

/// Which precedence level a package's overrides land at.
const fn override_level(typ: PackageType) -> OverrideLevel {
    match typ {
        PackageType::Bsp => OverrideLevel::Bsp,
        PackageType::App => OverrideLevel::App,
        PackageType::Target => OverrideLevel::Target,
        _ => OverrideLevel::Library,
    }
}

/// Match demanded APIs to providers; exactly one provider must survive
/// the tie-breakers.
fn bind_apis(
    included: &BTreeSet<String>,
    cache: &BTreeMap<String, Package>,
    syscfg: &Syscfg,
    errors: &mut Vec<ResolveError>,
) -> Vec<ApiBinding> {
    let active = |expr: &Option<newt_core::Expr>| {
        expr.as_ref().map_or(true, |x| x.eval(syscfg))
    };

    // api -> requirers
    let mut demands: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    // api -> (provider, weight, type)
    let mut providers: BTreeMap<String, Vec<(String, i64, PackageType)>> = BTreeMap::new();

    for name in included {
        let pkg = &cache[name];
        for req in &pkg.req_apis {
            if active(&req.expr) {
                demands
                    .entry(req.name.clone())
                    .or_default()
                    .insert(name.clone());
            }
        }
        for api in &pkg.apis {
            if active(&api.expr) {
                providers
                    .entry(api.name.clone())
                    .or_default()
                    .push((name.clone(), api.weight, pkg.typ));
            }
        }
    }

    let mut bindings = Vec::new();
    for (api, requirers) in demands {
        let mut candidates = providers.get(&api).cloned().unwrap_or_default();
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        if candidates.is_empty() {
            errors.push(ResolveError::ApiUnsatisfied {
                api,
                requirers: requirers.into_iter().collect(),
            });
            continue;
        }

        let provider = if candidates.len() == 1 {
            candidates.remove(0).0
        } else {
            // Highest weight wins; among tied weights a single loader
            // package wins; otherwise the demand is ambiguous.
            let top = candidates.iter().map(|c| c.1).max().unwrap_or(0);
            let mut best: Vec<&(String, i64, PackageType)> =
                candidates.iter().filter(|c| c.1 == top).collect();
            if best.len() > 1 {
                let loaders: Vec<&(String, i64, PackageType)> = best
                    .iter()
                    .copied()
                    .filter(|c| c.2 == PackageType::Loader)
                    .collect();
                if loaders.len() == 1 {
                    best = vec![loaders[0]];
                }
            }
            if best.len() != 1 {
                errors.push(ResolveError::ApiAmbiguous {
                    api,
                    providers: candidates.into_iter().map(|c| c.0).collect(),
                });
                continue;
            }
            best[0].0.clone()
        };

        bindings.push(ApiBinding {
            api,
            provider,
            requirers: requirers.into_iter().collect(),
        });
    }
    bindings
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    target: &Target,
    version_map: VersionMap,
    included: &BTreeSet<String>,
    cache: &BTreeMap<String, Package>,
    syscfg: &Syscfg,
    api_bindings: Vec<ApiBinding>,
    warnings: Vec<String>,
    local_repo: &str,
) -> Resolution {
    let packages: Vec<ResolvedPkg> = included
        .iter()
        .map(|name| {
            let pkg = &cache[name];
            ResolvedPkg {
                name: name.clone(),
                typ: pkg.typ,
                cflags: pkg.cflags.clone(),
                aflags: pkg.aflags.clone(),
                lflags: pkg.lflags.clone(),
            }
        })
        .collect();

    let mut sysinit = Vec::new();
    let mut sysdown = Vec::new();
    let mut log_config = Vec::new();
    let mut dep_edges = Vec::new();

    for name in included {
        let pkg = &cache[name];
        for (function, &stage) in &pkg.init {
            sysinit.push(StageFunc {
                stage,
                function: function.clone(),
                package: name.clone(),
            });
        }
        for (function, &stage) in &pkg.down {
            sysdown.push(StageFunc {
                stage,
                function: function.clone(),
                package: name.clone(),
            });
        }
        for log in &pkg.logs {
            log_config.push(LogEntry {
                name: log.name.clone(),
                module: resolve_ref(&log.module, syscfg),
                level: resolve_ref(&log.level, syscfg),
            });
        }
        for dep in &pkg.deps {
            if !dep.expr.as_ref().map_or(true, |x| x.eval(syscfg)) {
                continue;
            }
            let dependee = dep.name.resolve(local_repo).to_string();
            if included.contains(&dependee) {
                dep_edges.push((name.clone(), dependee));
            }
        }
    }

    sysinit.sort_by(|a, b| (a.stage, &a.function).cmp(&(b.stage, &b.function)));
    sysdown.sort_by(|a, b| (a.stage, &a.function).cmp(&(b.stage, &b.function)));
    log_config.sort_by(|a, b| a.name.cmp(&b.name));
    dep_edges.sort();
    dep_edges.dedup();

    let syscfg_history: BTreeMap<String, Vec<newt_syscfg::HistoryEntry>> = syscfg
        .setting_names()
        .map(|name| {
            (
                name.to_string(),
                syscfg.history(name).unwrap_or(&[]).to_vec(),
            )
        })
        .collect();

    Resolution {
        target: target.name().to_string(),
        version_map,
        packages,
        api_bindings,
        syscfg: syscfg.values().clone(),
        syscfg_history,
        sysinit,
        sysdown,
        log_config,
        warnings,
        dep_edges,
    }
}

/// A log's module/level field either names a setting or is a literal.
fn resolve_ref(value: &str, syscfg: &Syscfg) -> String {
    syscfg
        .value(value)
        .map_or_else(|| value.to_string(), str::to_string)
}
