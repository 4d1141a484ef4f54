//! End-to-end target resolution against in-memory packages.

use newt_pkg::{PackageType, PkgRegistry};
use newt_resolver::{resolve_target, ResolveError, ResolveParams};
use newt_syscfg::{AmbiguityPolicy, SettingType};
use newt_test_utils::{PkgBuilder, TargetBuilder};
use pretty_assertions::assert_eq;

fn base_registry() -> PkgRegistry {
    let mut reg = PkgRegistry::new("project");
    reg.insert(
        PkgBuilder::new("core", "hw/bsp/native")
            .typ(PackageType::Bsp)
            .build(),
    )
    .unwrap();
    reg.insert(
        PkgBuilder::new("project", "apps/blinky")
            .typ(PackageType::App)
            .build(),
    )
    .unwrap();
    reg
}

fn resolve(
    reg: &mut PkgRegistry,
    target: &newt_pkg::Target,
) -> Result<newt_resolver::Resolution, ResolveError> {
    resolve_target(ResolveParams {
        registry: reg,
        target,
        version_map: newt_repo::VersionMap::new(),
        policy: AmbiguityPolicy::FirstSeen,
        warnings: Vec::new(),
    })
}

fn blinky_target() -> newt_pkg::Target {
    TargetBuilder::new("project", "targets/blink", "@core/hw/bsp/native")
        .app("apps/blinky")
        .build()
}

#[test]
fn seed_set_is_closed_over_dependencies() {
    let mut reg = base_registry();
    reg.insert(PkgBuilder::new("core", "kernel/os").build())
        .unwrap();
    reg.insert(
        PkgBuilder::new("project", "apps/blinky2")
            .typ(PackageType::App)
            .dep("@core/kernel/os")
            .build(),
    )
    .unwrap();

    let target = TargetBuilder::new("project", "targets/t", "@core/hw/bsp/native")
        .app("apps/blinky2")
        .build();
    let resolution = resolve(&mut reg, &target).unwrap();

    let names: Vec<&str> = resolution.packages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "@core/hw/bsp/native",
            "@core/kernel/os",
            "@project/apps/blinky2",
        ]
    );
}

/// Syscfg override precedence: lib definition, BSP override, target
/// override; the target wins and the history holds all three entries.
#[test]
fn syscfg_override_precedence() {
    let mut reg = PkgRegistry::new("project");
    reg.insert(
        PkgBuilder::new("core", "sys/lib")
            .def("FOO", SettingType::Int, "10")
            .build(),
    )
    .unwrap();
    reg.insert(
        PkgBuilder::new("core", "hw/bsp/native")
            .typ(PackageType::Bsp)
            .val("FOO", "20")
            .build(),
    )
    .unwrap();
    reg.insert(
        PkgBuilder::new("project", "apps/blinky")
            .typ(PackageType::App)
            .dep("@core/sys/lib")
            .build(),
    )
    .unwrap();

    let target = TargetBuilder::new("project", "targets/blink", "@core/hw/bsp/native")
        .app("apps/blinky")
        .val("FOO", "30")
        .build();

    let resolution = resolve(&mut reg, &target).unwrap();
    assert_eq!(resolution.syscfg["FOO"], "30");

    let history = &resolution.syscfg_history["FOO"];
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].value, "10");
    assert_eq!(history[1].value, "20");
    assert_eq!(history[2].value, "30");
    assert!(resolution.warnings.is_empty());
}

/// API binding follows syscfg-gated provision: with LOG_FULL on, only
/// log_full advertises the api; off, only log_stub does.
#[test]
fn api_binding_tracks_syscfg_gate() {
    let build_registry = || {
        let mut reg = PkgRegistry::new("project");
        reg.insert(
            PkgBuilder::new("core", "hw/bsp/native")
                .typ(PackageType::Bsp)
                .build(),
        )
        .unwrap();
        reg.insert(
            PkgBuilder::new("core", "sys/log/full")
                .api_if("log", "LOG_FULL")
                .def("LOG_FULL", SettingType::Bool, "0")
                .build(),
        )
        .unwrap();
        reg.insert(
            PkgBuilder::new("core", "sys/log/stub")
                .api_if("log", "!LOG_FULL")
                .build(),
        )
        .unwrap();
        reg.insert(
            PkgBuilder::new("project", "apps/logger")
                .typ(PackageType::App)
                .dep("@core/sys/log/full")
                .dep("@core/sys/log/stub")
                .req_api("log")
                .build(),
        )
        .unwrap();
        reg
    };

    let on = TargetBuilder::new("project", "targets/on", "@core/hw/bsp/native")
        .app("apps/logger")
        .val("LOG_FULL", "1")
        .build();
    let mut reg = build_registry();
    let resolution = resolve(&mut reg, &on).unwrap();
    assert_eq!(resolution.provider_of("log"), Some("@core/sys/log/full"));

    let off = TargetBuilder::new("project", "targets/off", "@core/hw/bsp/native")
        .app("apps/logger")
        .build();
    let mut reg = build_registry();
    let resolution = resolve(&mut reg, &off).unwrap();
    assert_eq!(resolution.provider_of("log"), Some("@core/sys/log/stub"));
}

/// A dependency gated on a setting that only joins with a later package
/// is picked up by a later round.
#[test]
fn conditional_dep_requires_fix_point() {
    let mut reg = base_registry();
    reg.insert(
        PkgBuilder::new("core", "sys/log")
            .def("LOG_FCB", SettingType::Bool, "1")
            .build(),
    )
    .unwrap();
    reg.insert(PkgBuilder::new("core", "fs/fcb").build()).unwrap();
    reg.insert(
        PkgBuilder::new("project", "apps/store")
            .typ(PackageType::App)
            .dep("@core/sys/log")
            .dep_if("@core/fs/fcb", "LOG_FCB")
            .build(),
    )
    .unwrap();

    let target = TargetBuilder::new("project", "targets/t", "@core/hw/bsp/native")
        .app("apps/store")
        .build();
    let resolution = resolve(&mut reg, &target).unwrap();
    assert!(resolution.contains("@core/fs/fcb"));
}

/// A gate that stays off keeps both the dependency and its absence out
/// of the error report.
#[test]
fn gated_off_dep_may_be_missing() {
    let mut reg = base_registry();
    reg.insert(
        PkgBuilder::new("project", "apps/opt")
            .typ(PackageType::App)
            .dep_if("@ghost/not/loaded", "NEVER_SET")
            .build(),
    )
    .unwrap();

    let target = TargetBuilder::new("project", "targets/t", "@core/hw/bsp/native")
        .app("apps/opt")
        .build();
    assert!(resolve(&mut reg, &target).is_ok());
}

#[test]
fn unknown_dep_is_fatal() {
    let mut reg = base_registry();
    reg.insert(
        PkgBuilder::new("project", "apps/broken")
            .typ(PackageType::App)
            .dep("@ghost/not/loaded")
            .build(),
    )
    .unwrap();

    let target = TargetBuilder::new("project", "targets/t", "@core/hw/bsp/native")
        .app("apps/broken")
        .build();
    let err = resolve(&mut reg, &target).unwrap_err();
    assert!(err.to_string().contains("@ghost/not/loaded"));
}

#[test]
fn unsatisfied_api_is_fatal_only_at_fix_point() {
    let mut reg = base_registry();
    reg.insert(
        PkgBuilder::new("project", "apps/needy")
            .typ(PackageType::App)
            .req_api("shell")
            .build(),
    )
    .unwrap();

    let target = TargetBuilder::new("project", "targets/t", "@core/hw/bsp/native")
        .app("apps/needy")
        .build();
    let err = resolve(&mut reg, &target).unwrap_err();
    match err {
        ResolveError::ApiUnsatisfied { api, requirers } => {
            assert_eq!(api, "shell");
            assert_eq!(requirers, vec!["@project/apps/needy"]);
        }
        other => panic!("expected ApiUnsatisfied, got {other}"),
    }
}

#[test]
fn ambiguous_api_reports_all_providers() {
    let mut reg = base_registry();
    reg.insert(PkgBuilder::new("core", "a/one").api("shell").build())
        .unwrap();
    reg.insert(PkgBuilder::new("core", "a/two").api("shell").build())
        .unwrap();
    reg.insert(
        PkgBuilder::new("project", "apps/x")
            .typ(PackageType::App)
            .dep("@core/a/one")
            .dep("@core/a/two")
            .req_api("shell")
            .build(),
    )
    .unwrap();

    let target = TargetBuilder::new("project", "targets/t", "@core/hw/bsp/native")
        .app("apps/x")
        .build();
    let err = resolve(&mut reg, &target).unwrap_err();
    match err {
        ResolveError::ApiAmbiguous { api, providers } => {
            assert_eq!(api, "shell");
            assert_eq!(providers, vec!["@core/a/one", "@core/a/two"]);
        }
        other => panic!("expected ApiAmbiguous, got {other}"),
    }
}

/// Weight breaks provider ties; a lone loader-type provider breaks an
/// exact weight tie.
#[test]
fn api_tie_breakers() {
    let mut reg = base_registry();
    reg.insert(
        PkgBuilder::new("core", "a/preferred")
            .api_weighted("shell", 1)
            .build(),
    )
    .unwrap();
    reg.insert(PkgBuilder::new("core", "a/other").api("shell").build())
        .unwrap();
    reg.insert(
        PkgBuilder::new("project", "apps/x")
            .typ(PackageType::App)
            .dep("@core/a/preferred")
            .dep("@core/a/other")
            .req_api("shell")
            .build(),
    )
    .unwrap();

    let target = TargetBuilder::new("project", "targets/t", "@core/hw/bsp/native")
        .app("apps/x")
        .build();
    let resolution = resolve(&mut reg, &target).unwrap();
    assert_eq!(resolution.provider_of("shell"), Some("@core/a/preferred"));

    // Loader tie-break.
    let mut reg = base_registry();
    reg.insert(
        PkgBuilder::new("core", "boot/loader")
            .typ(PackageType::Loader)
            .api("flash")
            .build(),
    )
    .unwrap();
    reg.insert(PkgBuilder::new("core", "sys/flash").api("flash").build())
        .unwrap();
    reg.insert(
        PkgBuilder::new("project", "apps/y")
            .typ(PackageType::App)
            .dep("@core/boot/loader")
            .dep("@core/sys/flash")
            .req_api("flash")
            .build(),
    )
    .unwrap();
    let target = TargetBuilder::new("project", "targets/u", "@core/hw/bsp/native")
        .app("apps/y")
        .build();
    let resolution = resolve(&mut reg, &target).unwrap();
    assert_eq!(resolution.provider_of("flash"), Some("@core/boot/loader"));
}

#[test]
fn unittest_target_injects_test_setting() {
    let mut reg = base_registry();
    reg.insert(
        PkgBuilder::new("core", "sys/testutil")
            .typ(PackageType::Unittest)
            .def("TEST", SettingType::Bool, "0")
            .build(),
    )
    .unwrap();

    let target = TargetBuilder::new("project", "targets/unit", "@core/hw/bsp/native")
        .unittest("@core/sys/testutil")
        .build();
    let resolution = resolve(&mut reg, &target).unwrap();
    assert_eq!(resolution.syscfg["TEST"], "1");
}

#[test]
fn stage_tables_are_sorted() {
    let mut reg = base_registry();
    reg.insert(
        PkgBuilder::new("core", "sys/b")
            .init("sys_b_init", 200)
            .down("sys_b_down", 10)
            .build(),
    )
    .unwrap();
    reg.insert(
        PkgBuilder::new("core", "sys/a")
            .init("sys_a_init", 100)
            .init("sys_a_late", 200)
            .build(),
    )
    .unwrap();
    reg.insert(
        PkgBuilder::new("project", "apps/staged")
            .typ(PackageType::App)
            .dep("@core/sys/a")
            .dep("@core/sys/b")
            .build(),
    )
    .unwrap();

    let target = TargetBuilder::new("project", "targets/t", "@core/hw/bsp/native")
        .app("apps/staged")
        .build();
    let resolution = resolve(&mut reg, &target).unwrap();

    let order: Vec<(&str, i64)> = resolution
        .sysinit
        .iter()
        .map(|f| (f.function.as_str(), f.stage))
        .collect();
    assert_eq!(
        order,
        vec![("sys_a_init", 100), ("sys_a_late", 200), ("sys_b_init", 200)]
    );
    assert_eq!(resolution.sysdown[0].function, "sys_b_down");
}

#[test]
fn log_config_resolves_setting_references() {
    let mut reg = base_registry();
    reg.insert(
        PkgBuilder::new("core", "sys/log")
            .def("DFLT_LOG_MOD", SettingType::Int, "1")
            .def("DFLT_LOG_LVL", SettingType::Int, "3")
            .log("DFLT_LOG", "DFLT_LOG_MOD", "DFLT_LOG_LVL")
            .build(),
    )
    .unwrap();
    reg.insert(
        PkgBuilder::new("project", "apps/logs")
            .typ(PackageType::App)
            .dep("@core/sys/log")
            .build(),
    )
    .unwrap();

    let target = TargetBuilder::new("project", "targets/t", "@core/hw/bsp/native")
        .app("apps/logs")
        .build();
    let resolution = resolve(&mut reg, &target).unwrap();
    assert_eq!(resolution.log_config.len(), 1);
    assert_eq!(resolution.log_config[0].module, "1");
    assert_eq!(resolution.log_config[0].level, "3");
}

/// Running the resolver twice on identical inputs yields identical
/// output.
#[test]
fn resolver_is_deterministic() {
    let run = || {
        let mut reg = base_registry();
        reg.insert(
            PkgBuilder::new("core", "sys/log")
                .def("LOG_LEVEL", SettingType::Int, "0")
                .api("log")
                .build(),
        )
        .unwrap();
        reg.insert(
            PkgBuilder::new("project", "apps/d")
                .typ(PackageType::App)
                .dep("@core/sys/log")
                .req_api("log")
                .build(),
        )
        .unwrap();
        let target = TargetBuilder::new("project", "targets/t", "@core/hw/bsp/native")
            .app("apps/d")
            .val("LOG_LEVEL", "2")
            .build();
        let resolution = resolve(&mut reg, &target).unwrap();
        (
            resolution
                .packages
                .iter()
                .map(|p| p.name.clone())
                .collect::<Vec<_>>(),
            resolution.syscfg.clone(),
            resolution.forward_graph(),
            resolution.warnings.clone(),
        )
    };
    assert_eq!(run(), run());
}

/// Feeding a resolution's settled overrides back in does not change the
/// outcome.
#[test]
fn fix_point_is_idempotent() {
    let build = |extra_target_vals: &[(String, String)]| {
        let mut reg = base_registry();
        reg.insert(
            PkgBuilder::new("core", "sys/conf")
                .def("A", SettingType::Int, "1")
                .def("B", SettingType::Int, "0")
                .build(),
        )
        .unwrap();
        reg.insert(
            PkgBuilder::new("project", "apps/f")
                .typ(PackageType::App)
                .dep("@core/sys/conf")
                .build(),
        )
        .unwrap();
        let mut target = TargetBuilder::new("project", "targets/t", "@core/hw/bsp/native")
            .app("apps/f")
            .val("B", "5");
        for (name, value) in extra_target_vals {
            target = target.val(name, value);
        }
        let target = target.build();
        let mut reg2 = reg;
        resolve(&mut reg2, &target).unwrap()
    };

    let first = build(&[]);
    // Materialise the final map back in as target overrides.
    let materialised: Vec<(String, String)> = first
        .syscfg
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let second = build(&materialised);

    assert_eq!(first.syscfg, second.syscfg);
    let names = |r: &newt_resolver::Resolution| {
        r.packages.iter().map(|p| p.name.clone()).collect::<Vec<_>>()
    };
    assert_eq!(names(&first), names(&second));
}
