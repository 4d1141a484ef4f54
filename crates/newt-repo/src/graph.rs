//! The repo dependency graph.
//!
//! Nodes are the project root, every `(repo, version)` pair, and one
//! dependee node per repo; edges run from a dependent to the dependee's
//! repo node and carry the version-requirement list. The graph is built
//! once per resolution and read many times.

use newt_core::version::NumericVersion;
use newt_core::{VerReq, Version};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::BTreeMap;

use crate::descriptor::RepoDescriptor;
use crate::project::RequirementMap;

/// A node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepNode {
    /// The project manifest.
    Root,
    /// One published version of a repo.
    RepoVer {
        /// Repo name.
        repo: String,
        /// The version.
        ver: Version,
    },
    /// A depended-on repo; incoming edges are the constraints on it.
    Repo(String),
}

/// A constraint recorded in the graph: who imposes it, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// `project.yml` or `repo@version`.
    pub source: String,
    /// `None` for the root (always in force); otherwise the `(repo,
    /// version)` pair that must be selected for the constraint to apply.
    pub selector: Option<(String, Version)>,
    /// Requirement list on the dependee.
    pub reqs: Vec<VerReq>,
}

/// The dependency graph of one resolution.
#[derive(Debug)]
pub struct DepGraph {
    graph: DiGraph<DepNode, Vec<VerReq>>,
    root: NodeIndex,
    repo_nodes: BTreeMap<String, NodeIndex>,
    ver_nodes: BTreeMap<(String, NumericVersion), NodeIndex>,
}

impl DepGraph {
    /// Build the graph: one root edge per project-manifest requirement,
    /// then one edge per `(repo, version)` declared dependency.
    #[must_use]
    pub fn build(
        requirements: &RequirementMap,
        descriptors: &BTreeMap<String, RepoDescriptor>,
    ) -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(DepNode::Root);
        let mut this = Self {
            graph,
            root,
            repo_nodes: BTreeMap::new(),
            ver_nodes: BTreeMap::new(),
        };

        for (repo, reqs) in requirements {
            let dependee = this.repo_node(repo);
            this.graph.add_edge(this.root, dependee, reqs.clone());
        }

        for (name, desc) in descriptors {
            if desc.is_local() {
                continue;
            }
            for ver in desc.versions() {
                let from = this.ver_node(name, &ver);
                for dep in desc.deps_for(&ver) {
                    let dependee = this.repo_node(&dep.repo);
                    this.graph.add_edge(from, dependee, dep.reqs.clone());
                }
            }
        }

        this
    }

    fn repo_node(&mut self, repo: &str) -> NodeIndex {
        if let Some(&idx) = self.repo_nodes.get(repo) {
            return idx;
        }
        let idx = self.graph.add_node(DepNode::Repo(repo.to_string()));
        self.repo_nodes.insert(repo.to_string(), idx);
        idx
    }

    fn ver_node(&mut self, repo: &str, ver: &Version) -> NodeIndex {
        let key = (repo.to_string(), ver.numeric());
        if let Some(&idx) = self.ver_nodes.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(DepNode::RepoVer {
            repo: repo.to_string(),
            ver: ver.clone(),
        });
        self.ver_nodes.insert(key, idx);
        idx
    }

    /// Every repo that appears as a dependee.
    #[must_use]
    pub fn dependee_repos(&self) -> Vec<&str> {
        // BTreeMap order keeps this deterministic.
        self.repo_nodes.keys().map(String::as_str).collect()
    }

    /// All constraints on a repo, sorted by source label.
    #[must_use]
    pub fn constraints_on(&self, repo: &str) -> Vec<Constraint> {
        let Some(&dependee) = self.repo_nodes.get(repo) else {
            return Vec::new();
        };

        let mut out: Vec<Constraint> = self
            .graph
            .edges_directed(dependee, Direction::Incoming)
            .map(|edge| {
                let (source, selector) = match &self.graph[edge.source()] {
                    DepNode::Root => ("project.yml".to_string(), None),
                    DepNode::RepoVer { repo, ver } => (
                        format!("{repo}@{ver}"),
                        Some((repo.clone(), ver.clone())),
                    ),
                    DepNode::Repo(name) => (name.clone(), None),
                };
                Constraint {
                    source,
                    selector,
                    reqs: edge.weight().clone(),
                }
            })
            .collect();
        out.sort_by(|a, b| a.source.cmp(&b.source));
        out
    }

    /// The repos one `(repo, version)` pair constrains, sorted.
    #[must_use]
    pub fn dependees_of(&self, repo: &str, ver: &Version) -> Vec<&str> {
        let Some(&idx) = self.ver_nodes.get(&(repo.to_string(), ver.numeric())) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|e| match &self.graph[e.target()] {
                DepNode::Repo(name) => Some(name.as_str()),
                _ => None,
            })
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Node count, for diagnostics.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}
