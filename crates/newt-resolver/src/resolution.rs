//! The immutable product of resolving one target.

use newt_repo::VersionMap;
use newt_syscfg::HistoryEntry;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::BTreeMap;

use newt_pkg::PackageType;

/// One package in the closed set, with what the build stages need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPkg {
    /// Fully-qualified name.
    pub name: String,
    /// Package type.
    pub typ: PackageType,
    /// Compiler flags.
    pub cflags: Vec<String>,
    /// Assembler flags.
    pub aflags: Vec<String>,
    /// Linker flags.
    pub lflags: Vec<String>,
}

/// One API bound to its provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBinding {
    /// API identifier.
    pub api: String,
    /// The single provider.
    pub provider: String,
    /// Packages requiring the API, sorted.
    pub requirers: Vec<String>,
}

/// One system-init or system-shutdown function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFunc {
    /// Stage number; lower runs earlier.
    pub stage: i64,
    /// C function name.
    pub function: String,
    /// Declaring package.
    pub package: String,
}

/// One resolved log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Log name.
    pub name: String,
    /// Resolved module id.
    pub module: String,
    /// Resolved level.
    pub level: String,
}

/// Everything the downstream build stages need, frozen.
#[derive(Debug)]
pub struct Resolution {
    /// The resolved target's qualified name.
    pub target: String,
    /// Final repo version map.
    pub version_map: VersionMap,
    /// The closed package set, sorted by name.
    pub packages: Vec<ResolvedPkg>,
    /// API bindings, sorted by API name.
    pub api_bindings: Vec<ApiBinding>,
    /// Flat setting map.
    pub syscfg: BTreeMap<String, String>,
    /// Per-setting override history.
    pub syscfg_history: BTreeMap<String, Vec<HistoryEntry>>,
    /// System-init table, sorted by stage then function.
    pub sysinit: Vec<StageFunc>,
    /// System-shutdown table, sorted by stage then function.
    pub sysdown: Vec<StageFunc>,
    /// Log configuration, sorted by log name.
    pub log_config: Vec<LogEntry>,
    /// Aggregated warnings, in discovery order.
    pub warnings: Vec<String>,
    /// Active dependency edges `(dependent, dependee)`, sorted.
    pub(crate) dep_edges: Vec<(String, String)>,
}

impl Resolution {
    /// Look up a resolved package.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&ResolvedPkg> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Whether a package is part of the closed set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.package(name).is_some()
    }

    /// The provider bound to an API.
    #[must_use]
    pub fn provider_of(&self, api: &str) -> Option<&str> {
        self.api_bindings
            .iter()
            .find(|b| b.api == api)
            .map(|b| b.provider.as_str())
    }

    /// Forward dependency view: one line per package listing what it
    /// depends on.
    #[must_use]
    pub fn forward_graph(&self) -> String {
        self.render_graph(Direction::Outgoing, None)
    }

    /// Reverse dependency view: one line per package listing what
    /// depends on it.
    #[must_use]
    pub fn reverse_graph(&self) -> String {
        self.render_graph(Direction::Incoming, None)
    }

    /// Forward view restricted to the given packages.
    #[must_use]
    pub fn filtered_graph(&self, only: &[String]) -> String {
        self.render_graph(Direction::Outgoing, Some(only))
    }

    fn render_graph(&self, direction: Direction, only: Option<&[String]>) -> String {
        let (graph, indices) = self.build_graph();

        let mut lines = Vec::new();
        for pkg in &self.packages {
            if let Some(filter) = only {
                if !filter.contains(&pkg.name) {
                    continue;
                }
            }
            let Some(&idx) = indices.get(&pkg.name) else {
                continue;
            };
            let mut neighbors: Vec<&str> = graph
                .edges_directed(idx, direction)
                .map(|e| {
                    let other = match direction {
                        Direction::Outgoing => e.target(),
                        Direction::Incoming => e.source(),
                    };
                    graph[other].as_str()
                })
                .collect();
            neighbors.sort_unstable();
            neighbors.dedup();

            let arrow = match direction {
                Direction::Outgoing => "->",
                Direction::Incoming => "<-",
            };
            if neighbors.is_empty() {
                lines.push(format!("{} {arrow} (none)", pkg.name));
            } else {
                lines.push(format!("{} {arrow} {}", pkg.name, neighbors.join(", ")));
            }
        }
        lines.join("\n")
    }

    fn build_graph(&self) -> (DiGraph<String, ()>, BTreeMap<String, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut indices = BTreeMap::new();
        for pkg in &self.packages {
            let idx = graph.add_node(pkg.name.clone());
            indices.insert(pkg.name.clone(), idx);
        }
        for (from, to) in &self.dep_edges {
            if let (Some(&a), Some(&b)) = (indices.get(from), indices.get(to)) {
                graph.add_edge(a, b, ());
            }
        }
        (graph, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolution() -> Resolution {
        let mk = |name: &str, typ: PackageType| ResolvedPkg {
            name: name.to_string(),
            typ,
            cflags: vec![],
            aflags: vec![],
            lflags: vec![],
        };
        Resolution {
            target: "@project/targets/t".to_string(),
            version_map: VersionMap::new(),
            packages: vec![
                mk("@core/kernel/os", PackageType::Lib),
                mk("@core/sys/log", PackageType::Lib),
                mk("@project/apps/blinky", PackageType::App),
            ],
            api_bindings: vec![ApiBinding {
                api: "log".to_string(),
                provider: "@core/sys/log".to_string(),
                requirers: vec!["@project/apps/blinky".to_string()],
            }],
            syscfg: BTreeMap::new(),
            syscfg_history: BTreeMap::new(),
            sysinit: vec![],
            sysdown: vec![],
            log_config: vec![],
            warnings: vec![],
            dep_edges: vec![
                (
                    "@project/apps/blinky".to_string(),
                    "@core/kernel/os".to_string(),
                ),
                (
                    "@project/apps/blinky".to_string(),
                    "@core/sys/log".to_string(),
                ),
                (
                    "@core/sys/log".to_string(),
                    "@core/kernel/os".to_string(),
                ),
            ],
        }
    }

    #[test]
    fn forward_view() {
        let text = resolution().forward_graph();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "@core/kernel/os -> (none)",
                "@core/sys/log -> @core/kernel/os",
                "@project/apps/blinky -> @core/kernel/os, @core/sys/log",
            ]
        );
    }

    #[test]
    fn reverse_view() {
        let text = resolution().reverse_graph();
        assert!(text.contains("@core/kernel/os <- @core/sys/log, @project/apps/blinky"));
    }

    #[test]
    fn filtered_view() {
        let text = resolution().filtered_graph(&["@core/sys/log".to_string()]);
        assert_eq!(text, "@core/sys/log -> @core/kernel/os");
    }

    #[test]
    fn accessors() {
        let r = resolution();
        assert!(r.contains("@core/sys/log"));
        assert!(!r.contains("@ghost/pkg"));
        assert_eq!(r.provider_of("log"), Some("@core/sys/log"));
        assert_eq!(r.provider_of("shell"), None);
    }

    #[test]
    fn graph_views_are_deterministic() {
        let a = resolution().forward_graph();
        let b = resolution().forward_graph();
        assert_eq!(a, b);
    }
}
