//! Path reconciliation between diff-relative paths and analyzer identifiers.
//!
//! The diff reports paths relative to the repository root; analyzed per-file
//! data is keyed by paths relative to a source root (package/class style).
//! Reconciliation resolves each changed file against the configured source
//! roots, in order, and re-keys it; files under no root cannot be attributed
//! to any analyzed tree and are dropped with a diagnostic.

use log::{debug, warn};
use std::path::{Component, Path, PathBuf};

use crate::diff::ChangedLineMap;

pub struct PathReconciler {
    repo_root: PathBuf,
    source_roots: Vec<PathBuf>,
}

impl PathReconciler {
    pub fn new(repo_root: &Path, source_roots: &[PathBuf]) -> Self {
        Self {
            repo_root: normalize(repo_root),
            source_roots: source_roots.iter().map(|r| normalize(r)).collect(),
        }
    }

    /// Re-key a changed-line map into analyzer space, dropping files that
    /// match no configured source root.
    pub fn reconcile(&self, changed: &ChangedLineMap) -> ChangedLineMap {
        let mut reconciled = ChangedLineMap::new();
        for (diff_path, lines) in changed {
            match self.resolve(diff_path) {
                Some(identifier) => {
                    debug!("reconciled path: '{diff_path}' -> '{identifier}'");
                    reconciled.insert(identifier, lines.clone());
                }
                None => {
                    warn!(
                        "no source root matches changed file '{diff_path}'; \
                         it will not appear in the incremental report"
                    );
                }
            }
        }
        reconciled
    }

    /// Map one repository-relative path to its source-root-relative
    /// identifier. First configured root wins.
    pub fn resolve(&self, diff_path: &str) -> Option<String> {
        let absolute = normalize(&self.repo_root.join(diff_path));
        self.source_roots.iter().find_map(|root| {
            absolute
                .strip_prefix(root)
                .ok()
                .map(slash_normalized)
                .filter(|id| !id.is_empty())
        })
    }
}

/// Lexical normalization: fold `.` and `..` without touching the filesystem,
/// so reconciliation stays a pure function.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(Component::ParentDir);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn slash_normalized(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn reconciler(repo: &str, roots: &[&str]) -> PathReconciler {
        let roots: Vec<PathBuf> = roots.iter().map(PathBuf::from).collect();
        PathReconciler::new(Path::new(repo), &roots)
    }

    #[test]
    fn test_resolves_under_configured_root() {
        let r = reconciler("/repo", &["/repo/app/src/main/java"]);
        assert_eq!(
            r.resolve("app/src/main/java/com/x/Y.java").as_deref(),
            Some("com/x/Y.java")
        );
    }

    #[test]
    fn test_first_matching_root_wins() {
        let r = reconciler(
            "/repo",
            &["/repo/core/src", "/repo/core/src/main"],
        );
        assert_eq!(
            r.resolve("core/src/main/a/B.java").as_deref(),
            Some("main/a/B.java")
        );
    }

    #[test]
    fn test_unmatched_path_dropped() {
        let r = reconciler("/repo", &["/repo/app/src/main/java"]);
        assert_eq!(r.resolve("tools/scripts/Build.java"), None);

        let mut changed = ChangedLineMap::new();
        changed.insert(
            "tools/scripts/Build.java".to_string(),
            BTreeSet::from([1, 2]),
        );
        assert!(r.reconcile(&changed).is_empty());
    }

    #[test]
    fn test_reconcile_preserves_line_sets() {
        let r = reconciler("/repo", &["/repo/src/main/java"]);
        let mut changed = ChangedLineMap::new();
        changed.insert("src/main/java/com/x/Y.java".to_string(), BTreeSet::from([5, 6]));

        let reconciled = r.reconcile(&changed);
        assert_eq!(reconciled["com/x/Y.java"], BTreeSet::from([5, 6]));
    }

    #[test]
    fn test_dot_segments_folded() {
        let r = reconciler("/repo", &["/repo/src"]);
        assert_eq!(
            r.resolve("./src/../src/com/A.java").as_deref(),
            Some("com/A.java")
        );
    }
}
