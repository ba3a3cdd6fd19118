//! End-to-end incremental report generation.
//!
//! Diff extraction and path reconciliation produce the changed-line map;
//! capture selection feeds the analyzer; classification joins both sides;
//! the result is persisted as `incremental_coverage.json`.

use chrono::Local;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use super::classifier::classify_changed_lines;
use super::model::{IncrementalCoverageReport, OverallCoverageStats};
use crate::analyzer::CoverageAnalyzer;
use crate::capture::merge::merge_scope_captures;
use crate::capture::{fresh_timestamp, latest_capture};
use crate::config::CoverageConfig;
use crate::diff::DiffExtractor;
use crate::errors::{CollectorError, Result};
use crate::reconcile::PathReconciler;

/// Report timestamps: `yyyyMMdd_HHmmssSSS`.
const REPORT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S%3f";
const REPORT_FILE_NAME: &str = "incremental_coverage.json";

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub app_name: String,
    pub cluster_name: Option<String>,
    pub tag: String,
    pub base_ref: String,
    pub new_ref: String,
    /// Explicit capture file; wins over both merge-all and latest.
    pub capture_path: Option<PathBuf>,
    /// Merge every unmerged capture in the scope before analysis.
    pub merge_all: bool,
}

pub struct ReportGenerator<'a> {
    config: &'a CoverageConfig,
    analyzer: &'a dyn CoverageAnalyzer,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(config: &'a CoverageConfig, analyzer: &'a dyn CoverageAnalyzer) -> Self {
        Self { config, analyzer }
    }

    pub fn generate(&self, request: &ReportRequest) -> Result<IncrementalCoverageReport> {
        info!(
            "generating incremental report for app: {}, tag: {}, {}..{}",
            request.app_name, request.tag, request.base_ref, request.new_ref
        );

        let resolved = self
            .config
            .resolve_application(&request.app_name, &request.tag);
        let repo = &resolved.repo_path;
        if !repo.join(".git").exists() {
            return Err(CollectorError::not_found(format!(
                "git repository for app '{}' not found at {}",
                request.app_name,
                repo.display()
            )));
        }

        let extractor = DiffExtractor::new(&self.config.source_extension);
        let changed = extractor.changed_lines(repo, &request.base_ref, &request.new_ref)?;
        let reconciler = PathReconciler::new(repo, &resolved.source_roots);
        let reconciled = reconciler.reconcile(&changed);

        let report_dir = self.report_directory(request);
        if reconciled.is_empty() {
            info!(
                "no changed {} files matched between {} and {}; writing empty report",
                self.config.source_extension, request.base_ref, request.new_ref
            );
            let report = assemble_report(request, Vec::new(), OverallCoverageStats::default());
            return persist_report(report, &report_dir);
        }

        let capture = self.choose_capture(request)?;
        let analyzed = self.analyzer.analyze(&capture, &resolved.class_roots)?;
        let (files, overall) = classify_changed_lines(&reconciled, &analyzed);
        let report = assemble_report(request, files, overall);
        persist_report(report, &report_dir)
    }

    /// Capture precedence: explicit path, then merge-all, then latest by
    /// embedded timestamp.
    fn choose_capture(&self, request: &ReportRequest) -> Result<PathBuf> {
        if let Some(path) = &request.capture_path {
            if !path.is_file() {
                return Err(CollectorError::not_found(format!(
                    "specified capture file does not exist: {}",
                    path.display()
                )));
            }
            info!("using specified capture: {}", path.display());
            return Ok(path.clone());
        }

        let scope_dir = self.config.scope_dir(
            &request.app_name,
            request.cluster_name.as_deref(),
            &request.tag,
        );
        if request.merge_all {
            Ok(merge_scope_captures(&scope_dir)?.capture_path)
        } else {
            latest_capture(&scope_dir)?
                .map(|c| c.path)
                .ok_or_else(|| {
                    CollectorError::not_found(format!(
                        "no capture file for app: {}, tag: {}",
                        request.app_name, request.tag
                    ))
                })
        }
    }

    fn report_directory(&self, request: &ReportRequest) -> PathBuf {
        let base = self.config.report_output_directory.join(&request.app_name);
        let base = match request.cluster_name.as_deref() {
            Some(cluster) if !cluster.is_empty() => base.join(cluster),
            _ => base,
        };
        base.join(&request.tag)
            .join("incremental")
            .join(format!("incremental_{}", fresh_timestamp()))
    }
}

/// Pure assembly of the report value; path and persistence happen in
/// `persist_report`.
pub fn assemble_report(
    request: &ReportRequest,
    files: Vec<super::model::FileCoverage>,
    overall_stats: OverallCoverageStats,
) -> IncrementalCoverageReport {
    IncrementalCoverageReport {
        app_name: request.app_name.clone(),
        cluster_name: request.cluster_name.clone(),
        tag: request.tag.clone(),
        base_ref: request.base_ref.clone(),
        new_ref: request.new_ref.clone(),
        report_timestamp: Local::now().format(REPORT_TIMESTAMP_FORMAT).to_string(),
        report_path: String::new(),
        overall_stats,
        files,
    }
}

/// Write the JSON artifact and record its absolute path in the report.
pub fn persist_report(
    mut report: IncrementalCoverageReport,
    report_dir: &Path,
) -> Result<IncrementalCoverageReport> {
    fs::create_dir_all(report_dir)?;
    let file_path = report_dir.join(REPORT_FILE_NAME);
    let absolute = std::path::absolute(&file_path)?;
    report.report_path = absolute.to_string_lossy().replace('\\', "/");

    let json = serde_json::to_string_pretty(&report).map_err(|e| {
        CollectorError::parse(format!("failed to serialize report: {e}"))
    })?;
    fs::write(&file_path, json)?;
    info!("incremental report written: {}", absolute.display());
    Ok(report)
}

/// Convenience used by tests and the CLI to re-read a persisted artifact.
pub fn read_report(path: &Path) -> Result<IncrementalCoverageReport> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| CollectorError::parse_with_path(format!("malformed report: {e}"), path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request() -> ReportRequest {
        ReportRequest {
            app_name: "billing".into(),
            cluster_name: None,
            tag: "v1".into(),
            base_ref: "main".into(),
            new_ref: "feature".into(),
            capture_path: None,
            merge_all: false,
        }
    }

    #[test]
    fn test_persist_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let report = assemble_report(&request(), Vec::new(), OverallCoverageStats::default());
        let persisted = persist_report(report, dir.path()).unwrap();

        assert!(persisted.report_path.ends_with("incremental_coverage.json"));
        let reread = read_report(Path::new(&persisted.report_path)).unwrap();
        assert_eq!(reread, persisted);
    }

    #[test]
    fn test_empty_report_has_zeroed_stats() {
        let report = assemble_report(&request(), Vec::new(), OverallCoverageStats::default());
        assert_eq!(report.overall_stats.changed_lines, 0);
        assert_eq!(report.overall_stats.coverage_percentage, 0.0);
        assert!(report.files.is_empty());
        assert!(!report.report_timestamp.is_empty());
    }

    #[test]
    fn test_missing_capture_scope_is_not_found() {
        let mut config = CoverageConfig::default();
        config.dump_directory = PathBuf::from("/nonexistent/captures");
        struct NeverAnalyzer;
        impl CoverageAnalyzer for NeverAnalyzer {
            fn analyze(
                &self,
                _: &Path,
                _: &[PathBuf],
            ) -> Result<crate::analyzer::AnalyzedCoverage> {
                unreachable!("capture selection must fail first")
            }
        }
        let generator = ReportGenerator::new(&config, &NeverAnalyzer);
        let err = generator.choose_capture(&request()).unwrap_err();
        assert!(matches!(err, CollectorError::NotFound(_)));
    }

    #[test]
    fn test_explicit_capture_must_exist() {
        let config = CoverageConfig::default();
        struct NeverAnalyzer;
        impl CoverageAnalyzer for NeverAnalyzer {
            fn analyze(
                &self,
                _: &Path,
                _: &[PathBuf],
            ) -> Result<crate::analyzer::AnalyzedCoverage> {
                unreachable!()
            }
        }
        let generator = ReportGenerator::new(&config, &NeverAnalyzer);
        let mut req = request();
        req.capture_path = Some(PathBuf::from("/nonexistent/cov.cap"));
        let err = generator.choose_capture(&req).unwrap_err();
        assert!(matches!(err, CollectorError::NotFound(_)));
    }
}
