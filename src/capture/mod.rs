//! Capture files on durable storage: naming, timestamps, and selection.
//!
//! A scope (application, optional cluster, tag) owns one directory of capture
//! files. Filenames carry a fixed-width timestamp so lexicographic order on
//! the extracted token equals chronological order:
//!
//! - unmerged: `cov_<timestamp>.cap`
//! - per-node: `cov_<nodeId>_<timestamp>.cap`
//! - merged:   `cov_merged_[<ids>_]<timestamp>.cap`

pub mod exec;
pub mod fleet;
pub mod merge;
pub mod retention;

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::Result;

pub const CAPTURE_PREFIX: &str = "cov";
pub const MERGED_PREFIX: &str = "cov_merged";
pub const CAPTURE_EXTENSION: &str = "cap";

/// `yyyyMMdd_HHmmss_SSS`; fixed width, zero padded.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

static TIMESTAMP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(\d{8}_\d{6}_\d{3})").unwrap());

/// A capture file plus the identity bits extracted from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFile {
    pub path: PathBuf,
    /// Empty when the filename carries no parseable timestamp; such files
    /// sort as earliest.
    pub timestamp: String,
    pub node_id: Option<String>,
    pub merged: bool,
}

impl CaptureFile {
    pub fn from_path(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let timestamp = extract_timestamp(&name);
        let merged = name.starts_with(&format!("{MERGED_PREFIX}_"));
        let node_id = if merged {
            None
        } else {
            extract_node_id(&name, &timestamp)
        };
        Self {
            path,
            timestamp,
            node_id,
            merged,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Ordering key: timestamp first, full file name as the documented
    /// tie-break for identical timestamps.
    fn sort_key(&self) -> (String, String) {
        (self.timestamp.clone(), self.file_name())
    }
}

/// Current wall-clock time in the capture filename format.
pub fn fresh_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Pull the `yyyyMMdd_HHmmss_SSS` token out of a filename, empty if absent.
pub fn extract_timestamp(file_name: &str) -> String {
    TIMESTAMP_PATTERN
        .captures(file_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Node id of a per-node capture: whatever sits between the prefix and the
/// timestamp in `cov_<nodeId>_<timestamp>.cap`.
fn extract_node_id(file_name: &str, timestamp: &str) -> Option<String> {
    if timestamp.is_empty() {
        return None;
    }
    let prefix = format!("{CAPTURE_PREFIX}_");
    let rest = file_name.strip_prefix(&prefix)?;
    let node = rest.strip_suffix(&format!("{timestamp}.{CAPTURE_EXTENSION}"))?;
    let node = node.strip_suffix('_')?;
    if node.is_empty() {
        None
    } else {
        Some(node.to_string())
    }
}

/// Node identifiers embedded in filenames keep only ASCII alphanumerics so
/// the timestamp stays the only `\d{8}_\d{6}_\d{3}` token in a name.
pub fn sanitize_node_id(node_id: &str) -> String {
    node_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

pub fn unmerged_file_name(timestamp: &str) -> String {
    format!("{CAPTURE_PREFIX}_{timestamp}.{CAPTURE_EXTENSION}")
}

pub fn node_file_name(node_id: &str, timestamp: &str) -> String {
    format!("{CAPTURE_PREFIX}_{node_id}_{timestamp}.{CAPTURE_EXTENSION}")
}

pub fn merged_file_name(timestamp: &str) -> String {
    format!("{MERGED_PREFIX}_{timestamp}.{CAPTURE_EXTENSION}")
}

/// The capture directory for a scope: `<root>/<app>[/<cluster>]/<tag>`.
pub fn scope_directory(
    dump_root: &Path,
    app_name: &str,
    cluster_name: Option<&str>,
    tag: &str,
) -> PathBuf {
    let base = dump_root.join(app_name);
    match cluster_name {
        Some(cluster) if !cluster.is_empty() => base.join(cluster).join(tag),
        _ => base.join(tag),
    }
}

fn is_capture_name(name: &str) -> bool {
    name.ends_with(&format!(".{CAPTURE_EXTENSION}"))
}

fn is_merged_name(name: &str) -> bool {
    name.starts_with(&format!("{MERGED_PREFIX}_")) && is_capture_name(name)
}

/// All capture files in a scope directory, sorted oldest to newest. A missing
/// directory yields an empty list.
pub fn list_captures(dir: &Path) -> Result<Vec<CaptureFile>> {
    list_filtered(dir, |_| true)
}

/// Only the unmerged captures (individual and per-node collections).
pub fn list_unmerged_captures(dir: &Path) -> Result<Vec<CaptureFile>> {
    list_filtered(dir, |name| !is_merged_name(name))
}

/// Only the merged artifacts.
pub fn list_merged_captures(dir: &Path) -> Result<Vec<CaptureFile>> {
    list_filtered(dir, is_merged_name)
}

fn list_filtered(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<CaptureFile>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut captures = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_capture_name(&name) && keep(&name) {
            captures.push(CaptureFile::from_path(path));
        }
    }
    captures.sort_by_key(CaptureFile::sort_key);
    Ok(captures)
}

/// The most recent capture in a scope by embedded timestamp, merged or not.
pub fn latest_capture(dir: &Path) -> Result<Option<CaptureFile>> {
    Ok(list_captures(dir)?.into_iter().next_back())
}
