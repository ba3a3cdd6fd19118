//! End-to-end incremental report generation against a real git checkout,
//! with a stubbed analyzer standing in for the external counter source.

use deltacov::analyzer::{AnalyzedCoverage, CoverageAnalyzer, LineInstructions};
use deltacov::capture::exec::{ClassRecord, ExecutionData};
use deltacov::capture::unmerged_file_name;
use deltacov::config::{ApplicationConfig, CoverageConfig};
use deltacov::errors::Result;
use deltacov::report::{ReportGenerator, ReportRequest};
use deltacov::write_capture;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(repo: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args([
            "-c",
            "user.name=deltacov-test",
            "-c",
            "user.email=deltacov@test",
        ])
        .args(args)
        .current_dir(repo)
        .status()
        .expect("git invocation");
    assert!(status.success(), "git {args:?} failed");
}

/// Fixed counters: line 2 covered, line 3 partial, line 4 uncovered.
struct StubAnalyzer;

impl CoverageAnalyzer for StubAnalyzer {
    fn analyze(&self, _capture: &Path, _class_roots: &[PathBuf]) -> Result<AnalyzedCoverage> {
        let mut lines = BTreeMap::new();
        lines.insert(2, LineInstructions { covered: 4, missed: 0 });
        lines.insert(3, LineInstructions { covered: 1, missed: 1 });
        lines.insert(4, LineInstructions { covered: 0, missed: 6 });
        let mut analyzed = AnalyzedCoverage::new();
        analyzed.insert("com/x/Y.java".to_string(), lines);
        Ok(analyzed)
    }
}

fn setup(base: &TempDir) -> (CoverageConfig, ReportRequest) {
    let repo = base.path().join("billing-v1");
    let source_root = repo.join("src/main/java");
    fs::create_dir_all(source_root.join("com/x")).unwrap();

    git(base.path(), &["init", "-q", "billing-v1"]);
    let file = source_root.join("com/x/Y.java");
    fs::write(&file, "class Y {\n}\n").unwrap();
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "-qm", "base"]);
    // Lines 2-4 are new in the second commit.
    fs::write(
        &file,
        "class Y {\n    int a() { return 1; }\n    int b() { return 2; }\n    int c() { return 3; }\n}\n",
    )
    .unwrap();
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "-qm", "change"]);

    let mut config = CoverageConfig::default();
    config.base_project_path = base.path().to_string_lossy().into_owned();
    config.dump_directory = base.path().join("captures");
    config.report_output_directory = base.path().join("reports");
    config.applications.insert(
        "billing".to_string(),
        ApplicationConfig {
            source_directories: vec!["src/main/java".to_string()],
            class_directories: vec!["target/classes".to_string()],
            ..Default::default()
        },
    );

    // One capture so latest-selection has something to pick.
    let mut data = ExecutionData::new();
    data.add_class(ClassRecord {
        class_id: 1,
        name: "com/x/Y".to_string(),
        probes: vec![true],
    })
    .unwrap();
    let scope = config.scope_dir("billing", None, "v1");
    write_capture(&scope.join(unmerged_file_name("20240101_000000_000")), &data).unwrap();

    let request = ReportRequest {
        app_name: "billing".to_string(),
        cluster_name: None,
        tag: "v1".to_string(),
        base_ref: "HEAD~1".to_string(),
        new_ref: "HEAD".to_string(),
        capture_path: None,
        merge_all: false,
    };
    (config, request)
}

#[test]
fn test_generate_report_for_changed_lines() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let base = TempDir::new().unwrap();
    let (config, request) = setup(&base);

    let generator = ReportGenerator::new(&config, &StubAnalyzer);
    let report = generator.generate(&request).unwrap();

    assert_eq!(report.app_name, "billing");
    assert_eq!(report.files.len(), 1);
    let file = &report.files[0];
    assert_eq!(file.file_path, "com/x/Y.java");
    assert_eq!(file.summary.covered, 1);
    assert_eq!(file.summary.partially_covered, 1);
    assert_eq!(file.summary.not_covered, 1);

    let stats = &report.overall_stats;
    assert_eq!(stats.changed_lines, 3);
    // (1 + 0.5) / 3 * 100
    assert_eq!(stats.coverage_percentage, 50.0);

    // The persisted artifact uses the wire field names.
    let raw = fs::read_to_string(&report.report_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["appName"], "billing");
    assert_eq!(json["baseRef"], "HEAD~1");
    assert_eq!(json["overallStats"]["changedLines"], 3);
    assert_eq!(json["files"][0]["summary"]["totalChangedLinesInFile"], 3);
    assert_eq!(json["files"][0]["changedLineDetails"][0]["status"], "COVERED");
}

#[test]
fn test_identical_revisions_yield_empty_report() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let base = TempDir::new().unwrap();
    let (config, mut request) = setup(&base);
    request.base_ref = "HEAD".to_string();

    let generator = ReportGenerator::new(&config, &StubAnalyzer);
    let report = generator.generate(&request).unwrap();

    assert!(report.files.is_empty());
    assert_eq!(report.overall_stats.changed_lines, 0);
    assert_eq!(report.overall_stats.coverage_percentage, 0.0);
    // Even the empty report is persisted.
    assert!(Path::new(&report.report_path).is_file());
}

#[test]
fn test_missing_repository_is_not_found() {
    let base = TempDir::new().unwrap();
    let mut config = CoverageConfig::default();
    config.base_project_path = base.path().to_string_lossy().into_owned();

    let generator = ReportGenerator::new(&config, &StubAnalyzer);
    let err = generator
        .generate(&ReportRequest {
            app_name: "ghost".to_string(),
            cluster_name: None,
            tag: "v9".to_string(),
            base_ref: "a".to_string(),
            new_ref: "b".to_string(),
            capture_path: None,
            merge_all: false,
        })
        .unwrap_err();
    assert!(matches!(err, deltacov::CollectorError::NotFound(_)));
}
