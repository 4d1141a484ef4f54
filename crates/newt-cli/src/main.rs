//! `newt`: build and package management for embedded firmware
//! projects.

mod project;

use anyhow::Result;
use clap::{Parser, Subcommand};
use newt_installer::{AssumeYes, Installer, TermConfirmer};
use newt_resolver::{resolve_target, ResolveParams};
use newt_syscfg::AmbiguityPolicy;
use newt_vcs::GitCli;
use owo_colors::OwoColorize;
use project::Project;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "newt", version, about = "Embedded firmware build and package tool")]
struct Cli {
    /// Project directory (defaults to the working directory).
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clone the repos the project depends on, at resolved versions.
    Install {
        /// Re-checkout repos that are already installed.
        #[arg(long)]
        force: bool,
        /// Apply without confirmation.
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Move installed repos to the newest satisfying versions.
    Upgrade {
        /// Proceed even if a repo has local modifications.
        #[arg(long)]
        force: bool,
        /// Apply without confirmation.
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Fetch each repo and pin it back to the resolved commit.
    Sync {
        /// Proceed even if a repo has local modifications.
        #[arg(long)]
        force: bool,
        /// Apply without confirmation.
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Show per-repo status.
    Info {
        /// Fetch before reporting, so staleness reflects the remote.
        #[arg(long)]
        remote: bool,
    },
    /// Resolve a target and print its configuration.
    Resolve {
        /// Target name.
        target: String,
    },
    /// Print a target's dependency graph.
    Deps {
        /// Target name.
        target: String,
        /// Print the reverse graph instead.
        #[arg(long)]
        reverse: bool,
        /// Restrict the view to these packages.
        #[arg(long)]
        filter: Vec<String>,
    },
    /// Print a target's syscfg, with per-setting history.
    Syscfg {
        /// Target name.
        target: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project = Project::load(&cli.project)?;
    let git = GitCli::new();

    match cli.command {
        Command::Install { force, yes } => {
            let project = project.ensure_manifests(&git)?;
            let resolution = project.resolve_repos()?;
            print_warnings(&resolution.warnings);
            let report = run_installer(&project, &git, &resolution.version_map, yes, |i, ask| {
                i.install(force, ask)
            })?;
            print_report(&report);
        }
        Command::Upgrade { force, yes } => {
            let project = project.ensure_manifests(&git)?;
            let resolution = project.resolve_repos()?;
            print_warnings(&resolution.warnings);
            let report = run_installer(&project, &git, &resolution.version_map, yes, |i, ask| {
                i.upgrade(force, ask)
            })?;
            print_report(&report);
        }
        Command::Sync { force, yes } => {
            let resolution = project.resolve_repos()?;
            print_warnings(&resolution.warnings);
            let report = run_installer(&project, &git, &resolution.version_map, yes, |i, ask| {
                i.sync(force, ask)
            })?;
            print_report(&report);
        }
        Command::Info { remote } => {
            let resolution = project.resolve_repos()?;
            let installer = make_installer(&project, &git, &resolution.version_map);
            for line in installer.info(remote)? {
                println!("{line}");
            }
        }
        Command::Resolve { target } => {
            let resolution = resolve(&project, &target)?;
            print_warnings(&resolution.warnings);
            println!("target: {}", resolution.target);
            for (repo, ver) in &resolution.version_map {
                println!("repo {repo}: {ver}");
            }
            for pkg in &resolution.packages {
                println!("pkg {} ({})", pkg.name, pkg.typ);
            }
            for binding in &resolution.api_bindings {
                println!("api {} -> {}", binding.api, binding.provider);
            }
        }
        Command::Deps {
            target,
            reverse,
            filter,
        } => {
            let resolution = resolve(&project, &target)?;
            let text = if !filter.is_empty() {
                let filter: Vec<String> = filter
                    .iter()
                    .map(|f| project.qualify(f))
                    .collect::<Result<_>>()?;
                resolution.filtered_graph(&filter)
            } else if reverse {
                resolution.reverse_graph()
            } else {
                resolution.forward_graph()
            };
            println!("{text}");
        }
        Command::Syscfg { target } => {
            let resolution = resolve(&project, &target)?;
            print_warnings(&resolution.warnings);
            for (name, value) in &resolution.syscfg {
                println!("{name}: {value}");
                if let Some(history) = resolution.syscfg_history.get(name) {
                    for entry in history {
                        println!("    {entry}");
                    }
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("newt={default}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn resolve(project: &Project, target: &str) -> Result<newt_resolver::Resolution> {
    let repos = project.resolve_repos()?;
    let target = project.load_target(target)?;
    let mut registry = project.registry();
    Ok(resolve_target(ResolveParams {
        registry: &mut registry,
        target: &target,
        version_map: repos.version_map,
        policy: AmbiguityPolicy::FirstSeen,
        warnings: repos.warnings,
    })?)
}

fn make_installer<'a>(
    project: &'a Project,
    git: &'a GitCli,
    version_map: &'a newt_repo::VersionMap,
) -> Installer<'a> {
    static YES: AssumeYes = AssumeYes;
    Installer::new(
        git,
        &YES,
        project.repos_root(),
        project.descriptors(),
        version_map,
        Project::tool_version(),
    )
}

fn run_installer(
    project: &Project,
    git: &GitCli,
    version_map: &newt_repo::VersionMap,
    yes: bool,
    op: impl Fn(&Installer<'_>, bool) -> newt_installer::Result<newt_installer::InstallReport>,
) -> Result<newt_installer::InstallReport> {
    let confirm = TermConfirmer;
    let assume = AssumeYes;
    let confirmer: &dyn newt_installer::Confirmer = if yes { &assume } else { &confirm };
    let installer = Installer::new(
        git,
        confirmer,
        project.repos_root(),
        project.descriptors(),
        version_map,
        Project::tool_version(),
    );
    Ok(op(&installer, !yes)?)
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("{} {warning}", "warning:".yellow().bold());
    }
}

fn print_report(report: &newt_installer::InstallReport) {
    print_warnings(&report.warnings);
    if report.actions.is_empty() {
        println!("nothing to do");
    } else if report.performed {
        for action in &report.actions {
            println!("{action}");
        }
    } else {
        println!("{}", "cancelled".yellow());
    }
}
