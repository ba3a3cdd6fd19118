//! Incremental (changed-lines) coverage report: model, classification,
//! generation.

pub mod classifier;
pub mod generator;
pub mod model;

pub use classifier::classify_changed_lines;
pub use generator::{ReportGenerator, ReportRequest};
pub use model::{
    FileCoverage, FileCoverageSummary, IncrementalCoverageReport, LineCoverageDetail,
    LineCoverageStatus, OverallCoverageStats,
};
