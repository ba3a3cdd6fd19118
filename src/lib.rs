// Export modules for library usage
pub mod analyzer;
pub mod capture;
pub mod cli;
pub mod collector;
pub mod config;
pub mod diff;
pub mod discovery;
pub mod errors;
pub mod reconcile;
pub mod report;

// Re-export commonly used types
pub use crate::analyzer::{AnalyzedCoverage, CoverageAnalyzer, LineInstructions, XmlReportAnalyzer};
pub use crate::capture::exec::{read_capture, write_capture, ExecutionData};
pub use crate::capture::merge::merge_scope_captures;
pub use crate::capture::retention::prune_scope;
pub use crate::capture::{latest_capture, CaptureFile};
pub use crate::collector::{MultiNodeCollector, StaticNodeDiscovery, TcpClientFactory};
pub use crate::config::CoverageConfig;
pub use crate::diff::{ChangedLineMap, DiffExtractor};
pub use crate::errors::{CollectorError, Result};
pub use crate::reconcile::PathReconciler;
pub use crate::report::{
    classify_changed_lines, IncrementalCoverageReport, LineCoverageStatus, ReportGenerator,
    ReportRequest,
};
