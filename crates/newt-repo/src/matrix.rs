//! The version matrix: one row per non-local repo, versions sorted
//! newest first, with an evaluation cursor per row.
//!
//! The search sweeps the Cartesian product of the rows in row-major
//! order by advancing the cursors like an odometer.

use newt_core::Version;
use std::collections::BTreeMap;

/// One matrix row.
#[derive(Debug, Clone)]
pub struct MatrixRow {
    /// The repo this row tracks.
    pub repo: String,
    /// Candidate versions, newest first.
    versions: Vec<Version>,
    /// Evaluation cursor into `versions`.
    cursor: usize,
}

impl MatrixRow {
    /// Currently selected version, if the row is non-empty.
    #[must_use]
    pub fn current(&self) -> Option<&Version> {
        self.versions.get(self.cursor)
    }

    /// Remaining candidate versions.
    #[must_use]
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// True once pruning removed every candidate.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Ordered collection of rows; row order is repo-name order so sweeps
/// are deterministic.
#[derive(Debug, Clone, Default)]
pub struct VersionMatrix {
    rows: Vec<MatrixRow>,
}

impl VersionMatrix {
    /// Create an empty matrix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row. Versions are sorted newest-first regardless of input
    /// order; rows stay sorted by repo name.
    pub fn add_row(&mut self, repo: impl Into<String>, mut versions: Vec<Version>) {
        versions.sort_by(|a, b| b.cmp_numeric(a));
        self.rows.push(MatrixRow {
            repo: repo.into(),
            versions,
            cursor: 0,
        });
        self.rows.sort_by(|a, b| a.repo.cmp(&b.repo));
    }

    /// All rows, in repo-name order.
    #[must_use]
    pub fn rows(&self) -> &[MatrixRow] {
        &self.rows
    }

    /// Look up a row by repo name.
    #[must_use]
    pub fn row(&self, repo: &str) -> Option<&MatrixRow> {
        self.rows.iter().find(|r| r.repo == repo)
    }

    /// Remove versions of `repo` that fail `keep`. Returns how many were
    /// removed.
    pub fn prune<F>(&mut self, repo: &str, mut keep: F) -> usize
    where
        F: FnMut(&Version) -> bool,
    {
        let Some(row) = self.rows.iter_mut().find(|r| r.repo == repo) else {
            return 0;
        };
        let before = row.versions.len();
        row.versions.retain(|v| keep(v));
        row.cursor = 0;
        before - row.versions.len()
    }

    /// Advance the cursors to the next combination, odometer style.
    /// Returns `false` once every combination has been visited.
    pub fn increment(&mut self) -> bool {
        for row in self.rows.iter_mut().rev() {
            if row.versions.is_empty() {
                continue;
            }
            if row.cursor + 1 < row.versions.len() {
                row.cursor += 1;
                return true;
            }
            row.cursor = 0;
        }
        false
    }

    /// Reset every cursor to the newest version.
    pub fn reset(&mut self) {
        for row in &mut self.rows {
            row.cursor = 0;
        }
    }

    /// Snapshot the current combination as a version map.
    #[must_use]
    pub fn current(&self) -> BTreeMap<String, Version> {
        self.rows
            .iter()
            .filter_map(|r| r.current().map(|v| (r.repo.clone(), v.clone())))
            .collect()
    }

    /// Number of combinations left to sweep.
    #[must_use]
    pub fn combination_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| !r.versions.is_empty())
            .map(|r| r.versions.len())
            .product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vers(triples: &[(u64, u64, u64)]) -> Vec<Version> {
        triples.iter().map(|&(a, b, c)| Version::new(a, b, c)).collect()
    }

    #[test]
    fn rows_sorted_by_name_versions_descending() {
        let mut m = VersionMatrix::new();
        m.add_row("zephyr", vers(&[(1, 0, 0), (2, 0, 0)]));
        m.add_row("core", vers(&[(1, 1, 0), (1, 0, 0)]));
        assert_eq!(m.rows()[0].repo, "core");
        assert_eq!(m.rows()[1].repo, "zephyr");
        assert_eq!(
            m.rows()[1].versions()[0].numeric(),
            Version::new(2, 0, 0).numeric()
        );
    }

    #[test]
    fn odometer_sweep_covers_product() {
        let mut m = VersionMatrix::new();
        m.add_row("a", vers(&[(2, 0, 0), (1, 0, 0)]));
        m.add_row("b", vers(&[(1, 1, 0), (1, 0, 0)]));

        let mut combos = vec![m.current()];
        while m.increment() {
            combos.push(m.current());
        }
        assert_eq!(combos.len(), 4);
        // First combination is the newest of everything.
        assert_eq!(combos[0]["a"].numeric(), Version::new(2, 0, 0).numeric());
        assert_eq!(combos[0]["b"].numeric(), Version::new(1, 1, 0).numeric());
        // Last row varies fastest.
        assert_eq!(combos[1]["a"].numeric(), Version::new(2, 0, 0).numeric());
        assert_eq!(combos[1]["b"].numeric(), Version::new(1, 0, 0).numeric());
    }

    #[test]
    fn prune_removes_and_reports() {
        let mut m = VersionMatrix::new();
        m.add_row("a", vers(&[(2, 0, 0), (1, 5, 0), (1, 0, 0)]));
        let removed = m.prune("a", |v| v.major < 2);
        assert_eq!(removed, 1);
        assert_eq!(m.row("a").unwrap().versions().len(), 2);
        assert_eq!(m.prune("missing", |_| true), 0);
    }

    #[test]
    fn exhausted_row() {
        let mut m = VersionMatrix::new();
        m.add_row("a", vers(&[(1, 0, 0)]));
        m.prune("a", |_| false);
        assert!(m.row("a").unwrap().is_exhausted());
        assert_eq!(m.row("a").unwrap().current(), None);
    }

    #[test]
    fn single_row_sweep_terminates() {
        let mut m = VersionMatrix::new();
        m.add_row("a", vers(&[(1, 1, 0), (1, 0, 0)]));
        let mut count = 1;
        while m.increment() {
            count += 1;
        }
        assert_eq!(count, 2);
        // The sweep wraps back to the newest combination.
        assert_eq!(
            m.current()["a"].numeric(),
            Version::new(1, 1, 0).numeric()
        );
    }
}
