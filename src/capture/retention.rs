//! Retention pruning of a scope's capture population.
//!
//! Merged and unmerged captures form separate pools: keep the `keep` most
//! recently modified unmerged files and `max(1, keep / 2)` merged files.
//! Deletion is best-effort cleanup, never a correctness requirement.

use log::{info, warn};
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use super::{list_merged_captures, list_unmerged_captures, CaptureFile};
use crate::errors::Result;

/// What a prune pass did to one scope.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    pub deleted_unmerged: usize,
    pub deleted_merged: usize,
    pub failed_deletes: usize,
}

/// Apply the retention policy to one scope directory. A missing directory is
/// a no-op, not an error.
pub fn prune_scope(scope_dir: &Path, keep: usize) -> Result<PruneOutcome> {
    if !scope_dir.is_dir() {
        warn!(
            "capture directory for prune not found: {}",
            scope_dir.display()
        );
        return Ok(PruneOutcome::default());
    }

    let mut outcome = PruneOutcome::default();

    let unmerged = list_unmerged_captures(scope_dir)?;
    let (deleted, failed) = prune_pool(unmerged, keep);
    outcome.deleted_unmerged = deleted;
    outcome.failed_deletes += failed;

    let keep_merged = (keep / 2).max(1);
    let merged = list_merged_captures(scope_dir)?;
    let (deleted, failed) = prune_pool(merged, keep_merged);
    outcome.deleted_merged = deleted;
    outcome.failed_deletes += failed;

    info!(
        "pruned {} ({} unmerged, {} merged deleted, {} failures)",
        scope_dir.display(),
        outcome.deleted_unmerged,
        outcome.deleted_merged,
        outcome.failed_deletes
    );
    Ok(outcome)
}

/// Delete everything past the `keep` most recently modified captures in one
/// pool. Returns (deleted, failed).
fn prune_pool(mut captures: Vec<CaptureFile>, keep: usize) -> (usize, usize) {
    if captures.len() <= keep {
        return (0, 0);
    }
    // Newest first by filesystem modification time; file name as a
    // deterministic tie-break.
    captures.sort_by_key(|c| {
        (
            std::cmp::Reverse(modified_time(c)),
            c.file_name(),
        )
    });

    let mut deleted = 0;
    let mut failed = 0;
    for stale in &captures[keep..] {
        match fs::remove_file(&stale.path) {
            Ok(()) => {
                info!("deleted old capture: {}", stale.path.display());
                deleted += 1;
            }
            Err(e) => {
                warn!("failed to delete capture {}: {}", stale.path.display(), e);
                failed += 1;
            }
        }
    }
    (deleted, failed)
}

fn modified_time(capture: &CaptureFile) -> SystemTime {
    fs::metadata(&capture.path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
