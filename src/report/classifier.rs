//! Cross-referencing changed lines against analyzed per-line counters.

use log::debug;

use super::model::{
    FileCoverage, FileCoverageSummary, LineCoverageDetail, LineCoverageStatus,
    OverallCoverageStats,
};
use crate::analyzer::AnalyzedCoverage;
use crate::diff::ChangedLineMap;

/// Build per-file coverage plus the aggregate for every changed file that
/// intersects the analyzed data.
///
/// Changed files whose lines never appear in the analyzed line set are
/// omitted (typically changes outside reachable code, such as comments or
/// imports), and changed lines missing from the analyzed set contribute to neither the
/// details nor the aggregate.
pub fn classify_changed_lines(
    changed: &ChangedLineMap,
    analyzed: &AnalyzedCoverage,
) -> (Vec<FileCoverage>, OverallCoverageStats) {
    let mut files = Vec::new();
    let mut overall = OverallCoverageStats::default();

    for (file_path, changed_lines) in changed {
        let Some(line_counters) = analyzed.get(file_path) else {
            debug!("changed file '{file_path}' not present in analyzed data");
            continue;
        };

        let mut summary = FileCoverageSummary {
            total_changed_lines_in_file: changed_lines.len(),
            ..Default::default()
        };
        let mut details = Vec::new();

        for &line in changed_lines {
            let Some(counters) = line_counters.get(&line) else {
                continue;
            };
            let status = LineCoverageStatus::classify(counters.covered, counters.missed);
            match status {
                LineCoverageStatus::Covered => summary.covered += 1,
                LineCoverageStatus::PartiallyCovered => summary.partially_covered += 1,
                LineCoverageStatus::NotCovered => summary.not_covered += 1,
            }
            overall.record(status);
            details.push(LineCoverageDetail {
                line_number: line,
                status,
                covered_instructions: counters.covered,
                missed_instructions: counters.missed,
            });
        }

        if !details.is_empty() {
            files.push(FileCoverage {
                file_path: file_path.clone(),
                summary,
                changed_line_details: details,
            });
        }
    }

    overall.recalculate_percentage();
    (files, overall)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::LineInstructions;
    use std::collections::{BTreeMap, BTreeSet};

    fn analyzed_file(lines: &[(u32, u32, u32)]) -> BTreeMap<u32, LineInstructions> {
        lines
            .iter()
            .map(|&(nr, covered, missed)| (nr, LineInstructions { covered, missed }))
            .collect()
    }

    #[test]
    fn test_classifies_and_aggregates() {
        let mut changed = ChangedLineMap::new();
        changed.insert("com/x/Y.java".into(), BTreeSet::from([5, 6, 7]));
        let mut analyzed = AnalyzedCoverage::new();
        analyzed.insert(
            "com/x/Y.java".into(),
            analyzed_file(&[(5, 3, 0), (6, 1, 2), (7, 0, 5)]),
        );

        let (files, overall) = classify_changed_lines(&changed, &analyzed);
        assert_eq!(files.len(), 1);
        let file = &files[0];
        assert_eq!(file.summary.covered, 1);
        assert_eq!(file.summary.partially_covered, 1);
        assert_eq!(file.summary.not_covered, 1);
        assert_eq!(file.summary.total_changed_lines_in_file, 3);
        assert_eq!(file.changed_line_details[0].status, LineCoverageStatus::Covered);

        assert_eq!(overall.changed_lines, 3);
        assert_eq!(overall.coverage_percentage, 50.0);
    }

    #[test]
    fn test_file_without_intersection_omitted() {
        let mut changed = ChangedLineMap::new();
        changed.insert("com/x/Y.java".into(), BTreeSet::from([100, 101]));
        let mut analyzed = AnalyzedCoverage::new();
        analyzed.insert("com/x/Y.java".into(), analyzed_file(&[(5, 1, 0)]));

        let (files, overall) = classify_changed_lines(&changed, &analyzed);
        assert!(files.is_empty());
        assert_eq!(overall.changed_lines, 0);
        assert_eq!(overall.coverage_percentage, 0.0);
    }

    #[test]
    fn test_file_absent_from_analysis_omitted() {
        let mut changed = ChangedLineMap::new();
        changed.insert("com/x/Gone.java".into(), BTreeSet::from([1]));
        let (files, overall) = classify_changed_lines(&changed, &AnalyzedCoverage::new());
        assert!(files.is_empty());
        assert_eq!(overall.changed_lines, 0);
    }

    #[test]
    fn test_unmatched_changed_lines_excluded_from_details() {
        let mut changed = ChangedLineMap::new();
        changed.insert("A.java".into(), BTreeSet::from([1, 2, 3]));
        let mut analyzed = AnalyzedCoverage::new();
        analyzed.insert("A.java".into(), analyzed_file(&[(2, 1, 0)]));

        let (files, overall) = classify_changed_lines(&changed, &analyzed);
        assert_eq!(files[0].changed_line_details.len(), 1);
        // The summary still reports every changed line in the file.
        assert_eq!(files[0].summary.total_changed_lines_in_file, 3);
        assert_eq!(overall.changed_lines, 1);
    }

    #[test]
    fn test_multiple_files_accumulate() {
        let mut changed = ChangedLineMap::new();
        changed.insert("A.java".into(), BTreeSet::from([1]));
        changed.insert("B.java".into(), BTreeSet::from([2]));
        let mut analyzed = AnalyzedCoverage::new();
        analyzed.insert("A.java".into(), analyzed_file(&[(1, 1, 0)]));
        analyzed.insert("B.java".into(), analyzed_file(&[(2, 0, 4)]));

        let (files, overall) = classify_changed_lines(&changed, &analyzed);
        assert_eq!(files.len(), 2);
        assert_eq!(overall.changed_lines, 2);
        assert_eq!(overall.covered_lines, 1);
        assert_eq!(overall.uncovered_lines, 1);
        assert_eq!(overall.coverage_percentage, 50.0);
    }
}
