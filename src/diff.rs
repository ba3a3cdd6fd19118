//! Changed-line extraction from zero-context diff output.
//!
//! `git diff --unified=0` reports each hunk's first changed line in the new
//! revision; every following `+` line (until the next header or file marker)
//! is a consecutive new-file line. The parser is a pure function over the
//! diff text so it tests without a git binary.

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::process::Command;

use crate::errors::{CollectorError, Result};

/// File identifier (repository-relative, forward slashes) to 1-based changed
/// line numbers in the new revision.
pub type ChangedLineMap = BTreeMap<String, BTreeSet<u32>>;

static FILE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+\+\+\s+b/(.+)$").unwrap());
static HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@\s+-\d+(?:,\d+)?\s+\+(\d+)(?:,\d+)?\s+@@").unwrap());

/// Extracts the changed-line map for one revision pair, restricted to files
/// with a configured extension.
pub struct DiffExtractor {
    source_extension: String,
}

impl DiffExtractor {
    pub fn new(source_extension: impl Into<String>) -> Self {
        Self {
            source_extension: source_extension.into(),
        }
    }

    /// Run the diff tool in `repo_dir` and parse its output.
    ///
    /// Exit status 0 (no differences) and 1 (differences found) are both
    /// success; anything else is an external-tool failure.
    pub fn changed_lines(
        &self,
        repo_dir: &Path,
        base_ref: &str,
        new_ref: &str,
    ) -> Result<ChangedLineMap> {
        if !repo_dir.is_dir() {
            return Err(CollectorError::not_found(format!(
                "repository directory does not exist: {}",
                repo_dir.display()
            )));
        }

        let range = format!("{base_ref}..{new_ref}");
        let pathspec = format!("*.{}", self.source_extension);
        debug!(
            "running: git diff --unified=0 {range} -- {pathspec} (in {})",
            repo_dir.display()
        );

        let output = Command::new("git")
            .args(["diff", "--unified=0", &range, "--", &pathspec])
            .current_dir(repo_dir)
            .output()?;

        match output.status.code() {
            Some(0) | Some(1) => {}
            Some(code) => {
                return Err(CollectorError::external_tool("git diff", code.to_string()));
            }
            None => {
                return Err(CollectorError::external_tool("git diff", "killed by signal"));
            }
        }

        let map = self.parse_diff_output(&String::from_utf8_lossy(&output.stdout));
        info!(
            "diff {range}: {} changed file(s), {} changed line(s)",
            map.len(),
            map.values().map(BTreeSet::len).sum::<usize>()
        );
        Ok(map)
    }

    /// Parse zero-context diff text into a changed-line map. Empty input is
    /// an empty map, a valid outcome.
    pub fn parse_diff_output(&self, output: &str) -> ChangedLineMap {
        let suffix = format!(".{}", self.source_extension);
        let mut map: ChangedLineMap = BTreeMap::new();
        let mut current_file: Option<String> = None;
        let mut cursor: Option<u32> = None;

        for line in output.lines() {
            if let Some(caps) = FILE_MARKER.captures(line) {
                let path = caps[1].replace('\\', "/");
                if path.ends_with(&suffix) {
                    debug!("tracking diff for file: {path}");
                    current_file = Some(path);
                } else {
                    current_file = None;
                }
                cursor = None;
                continue;
            }

            let Some(file) = current_file.as_ref() else {
                continue;
            };

            if let Some(caps) = HUNK_HEADER.captures(line) {
                // The header reports the first changed line in the new
                // revision; it is not itself a line of code.
                cursor = caps[1].parse::<u32>().ok();
                continue;
            }

            if line.starts_with('+') {
                if let Some(n) = cursor {
                    map.entry(file.clone()).or_default().insert(n);
                    cursor = Some(n + 1);
                }
            }
            // '-' lines describe the old revision and carry no new-file
            // line number.
        }

        map.retain(|_, lines| !lines.is_empty());
        map
    }
}
