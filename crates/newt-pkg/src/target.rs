//! Targets: packages of type `target` carrying the build tuple.

use crate::error::{PkgError, Result};
use crate::package::Package;
use crate::types::PackageType;
use newt_core::{yaml, PkgName};
use serde_yaml::Value;

/// A build target: application + BSP + optional loader + build profile,
/// plus the target's own overrides (carried in [`Target::pkg`]).
#[derive(Debug, Clone)]
pub struct Target {
    /// The underlying package; its `syscfg_vals` are the
    /// target-precedence overrides.
    pub pkg: Package,
    /// Application package. Absent only for pure unit-test targets.
    pub app: Option<PkgName>,
    /// Board-support package.
    pub bsp: PkgName,
    /// Boot loader, when the image is split.
    pub loader: Option<PkgName>,
    /// Compiler package; always part of the seed set when named.
    pub compiler: Option<PkgName>,
    /// Unit-test package, for test targets.
    pub unittest: Option<PkgName>,
    /// Build profile, e.g. `debug` or `optimized`.
    pub build_profile: String,
}

impl Target {
    /// Parse a target's `pkg.yml` (+ optional `syscfg.yml`).
    pub fn from_yaml(repo: &str, pkg_doc: &Value, syscfg_doc: Option<&Value>) -> Result<Self> {
        let pkg = Package::from_yaml(repo, pkg_doc, syscfg_doc)?;
        if pkg.typ != PackageType::Target {
            return Err(newt_core::Error::bad_manifest(
                format!("{}/pkg.yml", pkg.name),
                format!("expected a target package, found type {}", pkg.typ),
            )
            .into());
        }

        let ctx = format!("{}/pkg.yml", pkg.name);
        let root = yaml::as_mapping(pkg_doc, &ctx)?;

        let name_field = |key: &str| -> Result<Option<PkgName>> {
            match yaml::field(root, key) {
                None => Ok(None),
                Some(v) => {
                    let text = yaml::scalar_to_string(v).ok_or_else(|| {
                        newt_core::Error::bad_manifest(&ctx, format!("{key} is not a scalar"))
                    })?;
                    if text.is_empty() {
                        return Ok(None);
                    }
                    Ok(Some(PkgName::parse(&text)?.resolve(repo)))
                }
            }
        };

        let app = name_field("target.app")?;
        let bsp = name_field("target.bsp")?.ok_or_else(|| PkgError::Core(
            newt_core::Error::missing_field("target.bsp", &ctx),
        ))?;
        let loader = name_field("target.loader")?;
        let compiler = name_field("target.compiler")?;
        let unittest = name_field("target.unittest")?;

        if app.is_none() && unittest.is_none() {
            return Err(newt_core::Error::missing_field("target.app", &ctx).into());
        }

        let build_profile = yaml::str_field(root, "target.build_profile", &ctx)?
            .unwrap_or_else(|| "default".to_string());

        Ok(Self {
            pkg,
            app,
            bsp,
            loader,
            compiler,
            unittest,
            build_profile,
        })
    }

    /// Fully-qualified target name.
    #[must_use]
    pub fn name(&self) -> &PkgName {
        &self.pkg.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BLINKY: &str = r#"
pkg.name: targets/blink_nrf
pkg.type: target
target.app: "apps/blinky"
target.bsp: "@core/hw/bsp/nrf52dk"
target.build_profile: debug
"#;

    fn parse(s: &str) -> Result<Target> {
        let doc: Value = serde_yaml::from_str(s).unwrap();
        Target::from_yaml("project", &doc, None)
    }

    #[test]
    fn parses_build_tuple() {
        let target = parse(BLINKY).unwrap();
        assert_eq!(target.name().to_string(), "@project/targets/blink_nrf");
        assert_eq!(target.app.as_ref().unwrap().to_string(), "@project/apps/blinky");
        assert_eq!(target.bsp.to_string(), "@core/hw/bsp/nrf52dk");
        assert_eq!(target.build_profile, "debug");
        assert!(target.loader.is_none());
    }

    #[test]
    fn non_target_package_rejected() {
        let err = parse("pkg.name: apps/blinky\npkg.type: app\n").unwrap_err();
        assert!(err.to_string().contains("expected a target"));
    }

    #[test]
    fn bsp_is_required() {
        let err = parse(
            "pkg.name: targets/t\npkg.type: target\ntarget.app: apps/a\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("target.bsp"));
    }

    #[test]
    fn unittest_target_needs_no_app() {
        let target = parse(
            r#"
pkg.name: targets/unit
pkg.type: target
target.bsp: "@core/hw/bsp/native"
target.unittest: "sys/log/test"
"#,
        )
        .unwrap();
        assert!(target.app.is_none());
        assert!(target.unittest.is_some());
    }

    #[test]
    fn app_or_unittest_required() {
        let err = parse(
            "pkg.name: targets/t\npkg.type: target\ntarget.bsp: hw/bsp/native\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("target.app"));
    }

    #[test]
    fn default_build_profile() {
        let target = parse(
            "pkg.name: targets/t\npkg.type: target\ntarget.app: a\ntarget.bsp: b\n",
        )
        .unwrap();
        assert_eq!(target.build_profile, "default");
    }
}
