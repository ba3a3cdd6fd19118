//! Report data model, serialized as the persisted JSON artifact.

use serde::{Deserialize, Serialize};

/// Classification of one changed line, a pure function of its instruction
/// counters. Branch data is never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineCoverageStatus {
    Covered,
    PartiallyCovered,
    NotCovered,
}

impl LineCoverageStatus {
    /// `missed == 0 && covered > 0` is covered; both positive is partial;
    /// no covered instructions is uncovered.
    pub fn classify(covered_instructions: u32, missed_instructions: u32) -> Self {
        if covered_instructions > 0 {
            if missed_instructions == 0 {
                Self::Covered
            } else {
                Self::PartiallyCovered
            }
        } else {
            Self::NotCovered
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineCoverageDetail {
    pub line_number: u32,
    pub status: LineCoverageStatus,
    pub covered_instructions: u32,
    pub missed_instructions: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverageSummary {
    pub total_changed_lines_in_file: usize,
    pub covered: usize,
    pub not_covered: usize,
    pub partially_covered: usize,
}

/// Coverage of one changed file; present only when at least one changed line
/// intersects the analyzed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverage {
    pub file_path: String,
    pub summary: FileCoverageSummary,
    pub changed_line_details: Vec<LineCoverageDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallCoverageStats {
    pub changed_lines: u64,
    pub covered_lines: u64,
    pub uncovered_lines: u64,
    pub partially_covered_lines: u64,
    pub coverage_percentage: f64,
}

impl OverallCoverageStats {
    pub fn record(&mut self, status: LineCoverageStatus) {
        self.changed_lines += 1;
        match status {
            LineCoverageStatus::Covered => self.covered_lines += 1,
            LineCoverageStatus::PartiallyCovered => self.partially_covered_lines += 1,
            LineCoverageStatus::NotCovered => self.uncovered_lines += 1,
        }
    }

    /// Partially covered lines weigh 0.5. Rounded to two decimals for the
    /// artifact.
    pub fn recalculate_percentage(&mut self) {
        self.coverage_percentage = if self.changed_lines == 0 {
            0.0
        } else {
            let raw = (self.covered_lines as f64 + 0.5 * self.partially_covered_lines as f64)
                / self.changed_lines as f64
                * 100.0;
            (raw * 100.0).round() / 100.0
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalCoverageReport {
    pub app_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    pub tag: String,
    pub base_ref: String,
    pub new_ref: String,
    pub report_timestamp: String,
    pub report_path: String,
    pub overall_stats: OverallCoverageStats,
    pub files: Vec<FileCoverage>,
}
