//! Merging the capture population of one scope into a single snapshot.

use log::{debug, info};
use std::path::{Path, PathBuf};

use super::exec::{read_capture, write_capture, ExecutionData};
use super::{fresh_timestamp, list_unmerged_captures, merged_file_name, CaptureFile};
use crate::errors::{CollectorError, Result};

/// Result of a merge: the snapshot, the capture file backing it, and whether
/// a new merged artifact was written.
#[derive(Debug)]
pub struct MergeOutcome {
    pub data: ExecutionData,
    pub capture_path: PathBuf,
    pub input_count: usize,
    pub artifact_created: bool,
}

/// Merge every unmerged capture in a scope directory.
///
/// Zero files is `NotFound`. A single file is read and used as-is; no merge
/// runs and no artifact is written. With more files the union snapshot is
/// persisted under a fresh timestamp.
pub fn merge_scope_captures(scope_dir: &Path) -> Result<MergeOutcome> {
    let captures = list_unmerged_captures(scope_dir)?;
    if captures.is_empty() {
        return Err(CollectorError::not_found(format!(
            "no capture files in {}",
            scope_dir.display()
        )));
    }

    info!(
        "merging {} capture file(s) in {}",
        captures.len(),
        scope_dir.display()
    );

    if let [only] = captures.as_slice() {
        debug!("single capture, skipping merge: {}", only.file_name());
        return Ok(MergeOutcome {
            data: read_capture(&only.path)?,
            capture_path: only.path.clone(),
            input_count: 1,
            artifact_created: false,
        });
    }

    let data = merge_capture_files(&captures)?;
    let merged_path = scope_dir.join(merged_file_name(&fresh_timestamp()));
    write_capture(&merged_path, &data)?;
    info!("merged capture written: {}", merged_path.display());

    Ok(MergeOutcome {
        data,
        capture_path: merged_path,
        input_count: captures.len(),
        artifact_created: true,
    })
}

/// Union a list of capture files in order. The probe union is commutative and
/// idempotent, so the ordering only affects log output.
pub fn merge_capture_files(captures: &[CaptureFile]) -> Result<ExecutionData> {
    let mut data = ExecutionData::new();
    for capture in captures {
        debug!("merging capture: {}", capture.file_name());
        let piece = read_capture(&capture.path)?;
        data.merge(&piece)?;
    }
    Ok(data)
}
