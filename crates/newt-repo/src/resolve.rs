//! Repo resolution: pick one version of every repo such that the project
//! manifest and every selected version's own dependencies are satisfied
//! simultaneously.
//!
//! The search is a cursor sweep over the version matrix: prune the
//! matrix against the constraints that are unconditionally in force,
//! then walk the remaining Cartesian product in row-major order and
//! return the first combination with no conflicting repo. A failed sweep
//! reports the combination with the fewest conflicts, each conflict
//! naming every contributing `(dependent, requirement)` pair.

use crate::descriptor::RepoDescriptor;
use crate::error::{Conflict, ConflictKind, Contributor, RepoError, Result};
use crate::graph::{Constraint, DepGraph};
use crate::matrix::VersionMatrix;
use crate::project::RequirementMap;
use newt_core::{VerReq, Version};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// The resolved versions: repo name -> version (commit attached).
pub type VersionMap = BTreeMap<String, Version>;

/// Successful repo resolution.
#[derive(Debug, Clone)]
pub struct RepoResolution {
    /// One version per non-local repo.
    pub version_map: VersionMap,
    /// Non-fatal findings, e.g. assumed versions for bare commit pins.
    pub warnings: Vec<String>,
}

/// Resolve the project's requirement map against the loaded descriptors.
pub fn resolve(
    requirements: &RequirementMap,
    descriptors: &BTreeMap<String, RepoDescriptor>,
) -> Result<RepoResolution> {
    let mut warnings = Vec::new();

    // Every repo the project names must have a descriptor.
    for repo in requirements.keys() {
        if !descriptors.contains_key(repo) {
            return Err(RepoError::UnknownRepo { name: repo.clone() });
        }
    }

    // Commit-form requirements pin their repo outright and bypass
    // version ordering.
    let mut pinned: VersionMap = BTreeMap::new();
    for (repo, reqs) in requirements {
        for req in reqs {
            if let VerReq::Commit(hash) = req {
                let desc = &descriptors[repo];
                let known = desc
                    .versions()
                    .into_iter()
                    .find(|v| v.commit.as_deref() == Some(hash.as_str()));
                let ver = match known {
                    Some(v) => v,
                    None => {
                        warnings.push(format!(
                            "repo {repo} pinned to commit {hash}; assumed version 0.0.0"
                        ));
                        Version::unspecified().with_commit(hash.clone())
                    }
                };
                pinned.insert(repo.clone(), ver);
            }
        }
    }

    // Illegal root requirements are reported before any search runs.
    for (repo, reqs) in requirements {
        if pinned.contains_key(repo) {
            continue;
        }
        let ordered: Vec<VerReq> = reqs
            .iter()
            .filter(|r| matches!(r, VerReq::Version { .. }))
            .cloned()
            .collect();
        let available = descriptors[repo].versions();
        if !available.iter().any(|v| v.satisfies(&ordered)) {
            return Err(RepoError::RootUnsatisfiable {
                repo: repo.clone(),
                reqs: ordered,
                available,
            });
        }
    }

    let graph = DepGraph::build(requirements, descriptors);

    // Dependee repos referenced by some version's dependency list must
    // also be known.
    for repo in graph.dependee_repos() {
        if !descriptors.contains_key(repo) {
            return Err(RepoError::UnknownRepo {
                name: repo.to_string(),
            });
        }
    }

    let mut matrix = VersionMatrix::new();
    for (name, desc) in descriptors {
        if desc.is_local() || pinned.contains_key(name) {
            continue;
        }
        matrix.add_row(name.clone(), desc.versions());
    }

    prune(&mut matrix, &graph, &pinned, descriptors)?;

    debug!(
        rows = matrix.rows().len(),
        combinations = matrix.combination_count(),
        graph_nodes = graph.node_count(),
        pinned = pinned.len(),
        "repo search starting"
    );

    search(&matrix, &graph, &pinned, descriptors).map(|version_map| RepoResolution {
        version_map,
        warnings,
    })
}

/// Prune the matrix against constraints that are unconditionally in
/// force: the project manifest's, the pinned repos', and, recursively,
/// those of any row reduced to a single version.
///
/// Constraints are read off the dep-graph's edges; as a row shrinks to
/// one candidate, that version's outgoing edges activate and its
/// dependees re-enter the worklist.
fn prune(
    matrix: &mut VersionMatrix,
    graph: &DepGraph,
    pinned: &VersionMap,
    descriptors: &BTreeMap<String, RepoDescriptor>,
) -> Result<()> {
    let mut queue: Vec<String> = graph
        .dependee_repos()
        .into_iter()
        .map(str::to_string)
        .collect();

    while let Some(dependee) = queue.pop() {
        if pinned.contains_key(&dependee) {
            continue;
        }
        let active = active_constraints(graph, &dependee, matrix, pinned);
        if active.is_empty() {
            continue;
        }

        let removed = matrix.prune(&dependee, |v| {
            active.iter().all(|c| v.satisfies(&c.reqs))
        });
        trace!(%dependee, removed, constraints = active.len(), "pruned");

        let Some(row) = matrix.row(&dependee) else {
            continue;
        };
        if row.is_exhausted() {
            // Contributors are the active constraints that reject at
            // least one version the repo actually publishes.
            let available = descriptors
                .get(&dependee)
                .map(RepoDescriptor::versions)
                .unwrap_or_default();
            let mut contributors: Vec<Contributor> = active
                .into_iter()
                .filter(|c| available.iter().any(|v| !v.satisfies(&c.reqs)))
                .map(|c| Contributor {
                    source: c.source,
                    reqs: c.reqs,
                })
                .collect();
            contributors.sort_by(|a, b| a.source.cmp(&b.source));
            return Err(RepoError::VersionConflict {
                conflicts: vec![Conflict {
                    repo: dependee,
                    kind: ConflictKind::Isolated,
                    contributors,
                }],
            });
        }
        // A row newly down to one version makes that version's own
        // edges unconditional; its dependees need another pass.
        if removed > 0 && row.versions().len() == 1 {
            let only = row.versions()[0].clone();
            for next in graph.dependees_of(&dependee, &only) {
                queue.push(next.to_string());
            }
        }
    }

    Ok(())
}

/// The constraints on a repo that are unconditionally in force: the
/// project root's, and those of dependents fixed to a single version,
/// either pinned or with a matrix row down to one candidate.
fn active_constraints(
    graph: &DepGraph,
    dependee: &str,
    matrix: &VersionMatrix,
    pinned: &VersionMap,
) -> Vec<Constraint> {
    graph
        .constraints_on(dependee)
        .into_iter()
        .filter(|c| match &c.selector {
            None => true,
            Some((repo, ver)) => {
                pinned
                    .get(repo)
                    .map_or(false, |p| p.numeric() == ver.numeric())
                    || matrix.row(repo).map_or(false, |row| {
                        row.versions().len() == 1
                            && row.versions()[0].numeric() == ver.numeric()
                    })
            }
        })
        .map(|mut c| {
            // Commit-form requirements are handled by pinning.
            c.reqs.retain(|r| matches!(r, VerReq::Version { .. }));
            c
        })
        .filter(|c| !c.reqs.is_empty())
        .collect()
}

/// Sweep the matrix for a perfect combination; report the best-seen
/// conflict set if there is none.
fn search(
    matrix: &VersionMatrix,
    graph: &DepGraph,
    pinned: &VersionMap,
    descriptors: &BTreeMap<String, RepoDescriptor>,
) -> Result<VersionMap> {
    let mut matrix = matrix.clone();
    matrix.reset();

    let mut best: Option<Vec<Conflict>> = None;

    loop {
        let mut combination = matrix.current();
        for (repo, ver) in pinned {
            combination.insert(repo.clone(), ver.clone());
        }

        let conflicts = conflicts_in(&combination, graph, pinned, descriptors);
        if conflicts.is_empty() {
            debug!(repos = combination.len(), "perfect version map found");
            return Ok(combination);
        }
        if best.as_ref().map_or(true, |b| conflicts.len() < b.len()) {
            best = Some(conflicts);
        }

        if !matrix.increment() {
            break;
        }
    }

    Err(RepoError::VersionConflict {
        conflicts: best.unwrap_or_default(),
    })
}

/// Which repos in this combination fail some active constraint, and who
/// constrained them. Constraints come off the dep-graph's edges: the
/// root's are always in force (except on pinned repos, where the commit
/// pin bypasses version ordering), a dependent's only while its version
/// is the selected one.
fn conflicts_in(
    combination: &VersionMap,
    graph: &DepGraph,
    pinned: &VersionMap,
    descriptors: &BTreeMap<String, RepoDescriptor>,
) -> Vec<Conflict> {
    let mut out = Vec::new();

    for dependee in graph.dependee_repos() {
        let Some(chosen) = combination.get(dependee) else {
            continue;
        };
        let active: Vec<Constraint> = graph
            .constraints_on(dependee)
            .into_iter()
            .filter(|c| match &c.selector {
                None => !pinned.contains_key(dependee),
                Some((repo, ver)) => combination
                    .get(repo)
                    .map_or(false, |sel| sel.numeric() == ver.numeric()),
            })
            .collect();

        if active.iter().all(|c| chosen.satisfies(&c.reqs)) {
            continue;
        }
        // A constraint contributed when it rejects at least one of the
        // contested repo's available versions; a constraint every
        // version satisfies is irrelevant and stays unreported.
        let available = descriptors
            .get(dependee)
            .map(RepoDescriptor::versions)
            .unwrap_or_default();
        let contributors: Vec<Contributor> = active
            .into_iter()
            .filter(|c| {
                !chosen.satisfies(&c.reqs) || available.iter().any(|v| !v.satisfies(&c.reqs))
            })
            .map(|c| Contributor {
                source: c.source,
                reqs: c.reqs,
            })
            .collect();
        out.push(Conflict {
            repo: dependee.to_string(),
            kind: ConflictKind::Search,
            contributors,
        });
    }
    out
}
