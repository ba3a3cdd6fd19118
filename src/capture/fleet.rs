//! Fleet-wide merging of one collection round's per-node captures.
//!
//! Downstream report generation only ever reads "the latest capture in a
//! scope". Without a fleet merge, a report after a multi-node collection
//! would silently reflect a single node's coverage.

use log::info;
use std::path::PathBuf;

use super::exec::write_capture;
use super::merge::merge_capture_files;
use super::{fresh_timestamp, sanitize_node_id, CaptureFile, CAPTURE_EXTENSION, MERGED_PREFIX};
use crate::errors::{CollectorError, Result};

/// Merge the captures collected from multiple nodes in one round.
///
/// Returns the merged artifact's capture, or `None` when only one node
/// contributed, since its file already is the fleet-wide state. The merged
/// filename embeds every contributing node id for traceability.
pub fn merge_fleet_captures(node_captures: &[CaptureFile]) -> Result<Option<CaptureFile>> {
    match node_captures {
        [] => Err(CollectorError::not_found(
            "no node captures to fleet-merge",
        )),
        [_single] => Ok(None),
        captures => {
            let data = merge_capture_files(captures)?;
            let dir = captures[0]
                .path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_default();
            let path = dir.join(fleet_file_name(captures, &fresh_timestamp()));
            write_capture(&path, &data)?;
            info!(
                "fleet merge of {} node captures written: {}",
                captures.len(),
                path.display()
            );
            Ok(Some(CaptureFile::from_path(path)))
        }
    }
}

/// `cov_merged_<id>-<id>-..._<timestamp>.cap`, node ids sanitized so the
/// timestamp stays the only `\d{8}_\d{6}_\d{3}` token in the name.
fn fleet_file_name(captures: &[CaptureFile], timestamp: &str) -> String {
    let mut ids: Vec<String> = captures
        .iter()
        .map(|c| {
            c.node_id
                .as_deref()
                .map(sanitize_node_id)
                .unwrap_or_else(|| "unknown".to_string())
        })
        .collect();
    ids.sort();
    ids.dedup();
    format!(
        "{MERGED_PREFIX}_{}_{timestamp}.{CAPTURE_EXTENSION}",
        ids.join("-")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::exec::{read_capture, ClassRecord, ExecutionData};
    use crate::capture::{extract_timestamp, list_merged_captures, node_file_name};
    use std::path::Path;
    use tempfile::TempDir;

    fn write_node_capture(dir: &Path, node_id: &str, ts: &str, probes: &[bool]) -> CaptureFile {
        let mut data = ExecutionData::new();
        data.add_class(ClassRecord {
            class_id: 9,
            name: "com/x/Fleet".into(),
            probes: probes.to_vec(),
        })
        .unwrap();
        let path = dir.join(node_file_name(node_id, ts));
        write_capture(&path, &data).unwrap();
        CaptureFile::from_path(path)
    }

    #[test]
    fn test_single_node_produces_no_artifact() {
        let dir = TempDir::new().unwrap();
        let only = write_node_capture(dir.path(), "n1", "20240101_000000_000", &[true]);
        assert!(merge_fleet_captures(&[only]).unwrap().is_none());
        assert!(list_merged_captures(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_zero_nodes_is_not_found() {
        assert!(matches!(
            merge_fleet_captures(&[]),
            Err(CollectorError::NotFound(_))
        ));
    }

    #[test]
    fn test_fleet_merge_unions_and_names_nodes() {
        let dir = TempDir::new().unwrap();
        let a = write_node_capture(dir.path(), "10.0.0.1", "20240101_000000_000", &[true, false]);
        let b = write_node_capture(dir.path(), "10.0.0.2", "20240101_000000_001", &[false, true]);

        let merged = merge_fleet_captures(&[a, b]).unwrap().unwrap();
        assert!(merged.merged);
        let name = merged.file_name();
        assert!(name.contains("10-0-0-1"));
        assert!(name.contains("10-0-0-2"));
        // The embedded timestamp is the fresh one, not a node timestamp.
        assert_eq!(extract_timestamp(&name), merged.timestamp);

        let data = read_capture(&merged.path).unwrap();
        assert_eq!(data.class(9).unwrap().probes, vec![true, true]);
    }

    #[test]
    fn test_fleet_artifact_counts_as_merged_pool() {
        let dir = TempDir::new().unwrap();
        let a = write_node_capture(dir.path(), "n1", "20240101_000000_000", &[true]);
        let b = write_node_capture(dir.path(), "n2", "20240101_000000_001", &[false]);
        merge_fleet_captures(&[a, b]).unwrap().unwrap();
        assert_eq!(list_merged_captures(dir.path()).unwrap().len(), 1);
    }
}
