//! A scripted VCS for installer tests.
//!
//! Every operation is recorded; repo state (head, dirty, detached) is
//! configured up front and mutated the way the real git driver would.

use newt_vcs::{DirtyState, Result, Vcs, VcsError};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct RepoState {
    head: String,
    dirty: DirtyState,
    detached: bool,
}

#[derive(Debug, Default)]
struct Inner {
    repos: BTreeMap<PathBuf, RepoState>,
    /// Scripted ref resolutions; an unscripted ref resolves to itself.
    refs: BTreeMap<String, String>,
    ops: Vec<String>,
    fail_clone: bool,
}

/// Scripted in-memory VCS.
#[derive(Debug, Default)]
pub struct MockVcs {
    inner: RefCell<Inner>,
}

impl MockVcs {
    /// Empty filesystem: nothing installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already-installed repo.
    pub fn with_repo(self, path: impl Into<PathBuf>, head: &str, dirty: DirtyState, detached: bool) -> Self {
        self.inner.borrow_mut().repos.insert(
            path.into(),
            RepoState {
                head: head.to_string(),
                dirty,
                detached,
            },
        );
        self
    }

    /// Make subsequent clones fail.
    pub fn failing_clone(self) -> Self {
        self.inner.borrow_mut().fail_clone = true;
        self
    }

    /// Script what `latest_matching` resolves a ref to, modelling a
    /// branch or tag that moved upstream.
    pub fn with_ref(self, reference: &str, commit: &str) -> Self {
        self.inner
            .borrow_mut()
            .refs
            .insert(reference.to_string(), commit.to_string());
        self
    }

    /// Every operation performed, in order.
    #[must_use]
    pub fn ops(&self) -> Vec<String> {
        self.inner.borrow().ops.clone()
    }

    /// Whether a repo exists at `path`.
    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        self.inner.borrow().repos.contains_key(path)
    }

    fn record(&self, op: String) {
        self.inner.borrow_mut().ops.push(op);
    }

    fn with_state<T>(&self, path: &Path, f: impl FnOnce(&mut RepoState) -> T) -> Result<T> {
        let mut inner = self.inner.borrow_mut();
        match inner.repos.get_mut(path) {
            Some(state) => Ok(f(state)),
            None => Err(VcsError::NotRepository {
                path: path.to_path_buf(),
            }),
        }
    }
}

impl Vcs for MockVcs {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        self.record(format!("clone {url} -> {}", dest.display()));
        if self.inner.borrow().fail_clone {
            return Err(VcsError::CommandFailed {
                command: format!("git clone {url}"),
                stderr: "scripted failure".to_string(),
            });
        }
        self.inner.borrow_mut().repos.insert(
            dest.to_path_buf(),
            RepoState {
                head: "HEAD".to_string(),
                dirty: DirtyState::Clean,
                detached: false,
            },
        );
        Ok(())
    }

    fn checkout(&self, dest: &Path, commit: &str) -> Result<()> {
        self.record(format!("checkout {} @ {commit}", dest.display()));
        self.with_state(dest, |state| {
            state.head = commit.to_string();
            state.detached = true;
        })
    }

    fn dirty_state(&self, dest: &Path) -> Result<DirtyState> {
        self.with_state(dest, |state| state.dirty)
    }

    fn current_hash(&self, dest: &Path) -> Result<String> {
        self.with_state(dest, |state| state.head.clone())
    }

    fn is_detached(&self, dest: &Path) -> Result<bool> {
        self.with_state(dest, |state| state.detached)
    }

    fn fetch(&self, dest: &Path) -> Result<()> {
        self.record(format!("fetch {}", dest.display()));
        self.with_state(dest, |_| ())
    }

    fn latest_matching(&self, dest: &Path, reference: &str) -> Result<String> {
        self.record(format!("rev-list {} {reference}", dest.display()));
        self.with_state(dest, |_| ())?;
        let inner = self.inner.borrow();
        Ok(inner
            .refs
            .get(reference)
            .cloned()
            .unwrap_or_else(|| reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_operations() {
        let vcs = MockVcs::new();
        vcs.clone_repo("https://example.com/a.git", Path::new("/repos/a"))
            .unwrap();
        vcs.checkout(Path::new("/repos/a"), "c1").unwrap();

        assert_eq!(
            vcs.ops(),
            vec![
                "clone https://example.com/a.git -> /repos/a",
                "checkout /repos/a @ c1",
            ]
        );
        assert_eq!(vcs.current_hash(Path::new("/repos/a")).unwrap(), "c1");
        assert!(vcs.is_detached(Path::new("/repos/a")).unwrap());
    }

    #[test]
    fn missing_repo_errors() {
        let vcs = MockVcs::new();
        assert!(vcs.dirty_state(Path::new("/nope")).is_err());
    }

    #[test]
    fn scripted_dirty_state() {
        let vcs = MockVcs::new().with_repo("/repos/b", "c9", DirtyState::UntrackedFiles, true);
        assert_eq!(
            vcs.dirty_state(Path::new("/repos/b")).unwrap(),
            DirtyState::UntrackedFiles
        );
    }

    #[test]
    fn ref_resolution() {
        let vcs = MockVcs::new()
            .with_repo("/repos/c", "c1", DirtyState::Clean, true)
            .with_ref("mainline", "c7");
        assert_eq!(
            vcs.latest_matching(Path::new("/repos/c"), "mainline").unwrap(),
            "c7"
        );
        // Unscripted refs resolve to themselves.
        assert_eq!(
            vcs.latest_matching(Path::new("/repos/c"), "v1_tag").unwrap(),
            "v1_tag"
        );
    }
}
