//! Source and class root discovery under an application checkout.
//!
//! Applications without explicitly configured directories get their roots
//! discovered by walking the checkout for directories whose normalized
//! relative path ends with a configured suffix (`src/main/java`,
//! `target/classes`, ...). The traversal is iterative and lazy; callers that
//! only need the first few candidates never pay for the full walk.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lazily yield every directory under `root` whose path relative to `root`
/// ends with `suffix` (matched on whole path components).
pub fn candidate_roots<'a>(
    root: &'a Path,
    suffix: &'a str,
) -> impl Iterator<Item = PathBuf> + 'a {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(move |entry| {
            let rel = entry.path().strip_prefix(root).ok()?;
            if suffix_matches(rel, suffix) {
                Some(entry.into_path())
            } else {
                None
            }
        })
}

/// Collect every discovered root, sorted for deterministic configuration.
pub fn find_roots(root: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = candidate_roots(root, suffix).collect();
    roots.sort();
    roots
}

fn suffix_matches(rel: &Path, suffix: &str) -> bool {
    let rel: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    let suffix: Vec<&str> = suffix.split('/').filter(|s| !s.is_empty()).collect();
    if suffix.is_empty() || rel.len() < suffix.len() {
        return false;
    }
    rel[rel.len() - suffix.len()..]
        .iter()
        .zip(&suffix)
        .all(|(a, b)| a.as_ref() == *b)
}
