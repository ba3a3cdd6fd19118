//! Seam to the external coverage analyzer.
//!
//! The analyzer consumes a capture file plus class roots and produces
//! per-line instruction counters for every analyzed source file. How it
//! counts is its business; this module owns the invocation contract and the
//! parsing of the XML artifact it emits
//! (`report/package/sourcefile/line @nr @mi @ci`).

use log::{debug, info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::AnalyzerConfig;
use crate::errors::{CollectorError, Result};

/// Instruction counters for one source line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineInstructions {
    pub covered: u32,
    pub missed: u32,
}

/// Analyzer-relative file identifier to per-line counters.
pub type AnalyzedCoverage = BTreeMap<String, BTreeMap<u32, LineInstructions>>;

pub trait CoverageAnalyzer {
    fn analyze(&self, capture: &Path, class_roots: &[PathBuf]) -> Result<AnalyzedCoverage>;
}

/// Runs the configured analyzer command and parses the XML report it writes.
///
/// The command template carries `{capture}`, `{classes}` and `{output}`
/// placeholders; exit status 0 is the only success.
#[derive(Debug)]
pub struct XmlReportAnalyzer {
    command: String,
}

impl XmlReportAnalyzer {
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self> {
        let command = config.command.clone().ok_or_else(|| {
            CollectorError::configuration(
                "analyzer.command is not configured; it is required for report generation",
            )
        })?;
        Ok(Self { command })
    }
}

impl CoverageAnalyzer for XmlReportAnalyzer {
    fn analyze(&self, capture: &Path, class_roots: &[PathBuf]) -> Result<AnalyzedCoverage> {
        let output_path = std::env::temp_dir().join(format!(
            "deltacov_analysis_{}.xml",
            crate::capture::fresh_timestamp()
        ));
        let classes = class_roots
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(",");

        let argv: Vec<String> = self
            .command
            .split_whitespace()
            .map(|token| {
                token
                    .replace("{capture}", &capture.to_string_lossy())
                    .replace("{classes}", &classes)
                    .replace("{output}", &output_path.to_string_lossy())
            })
            .collect();
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| CollectorError::configuration("analyzer.command is empty"))?;

        debug!("running analyzer: {}", argv.join(" "));
        let status = Command::new(program).args(args).status()?;
        if !status.success() {
            return Err(CollectorError::external_tool(
                program.clone(),
                status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "killed by signal".to_string()),
            ));
        }

        let xml = std::fs::read(&output_path).map_err(|e| {
            CollectorError::parse_with_path(
                format!("analyzer produced no readable report: {e}"),
                &output_path,
            )
        })?;
        let analyzed = parse_line_report(&xml)?;
        info!(
            "analyzer reported {} source file(s)",
            analyzed.len()
        );
        if let Err(e) = std::fs::remove_file(&output_path) {
            warn!("failed to remove analyzer artifact {}: {e}", output_path.display());
        }
        Ok(analyzed)
    }
}

/// Parse the analyzer's XML artifact into per-line counters.
///
/// File identifiers join the enclosing package name to the sourcefile name
/// with a forward slash, matching the reconciler's output space.
pub fn parse_line_report(xml: &[u8]) -> Result<AnalyzedCoverage> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut analyzed = AnalyzedCoverage::new();
    let mut package = String::new();
    let mut source_file: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"package" => {
                    package = required_attr(&e, b"name")?;
                }
                b"sourcefile" => {
                    let name = required_attr(&e, b"name")?;
                    let identifier = if package.is_empty() {
                        name
                    } else {
                        format!("{package}/{name}")
                    };
                    analyzed.entry(identifier.clone()).or_default();
                    source_file = Some(identifier);
                }
                b"line" => {
                    if let Some(file) = source_file.as_ref() {
                        let nr: u32 = parse_attr(&e, b"nr")?;
                        let missed: u32 = parse_attr(&e, b"mi")?;
                        let covered: u32 = parse_attr(&e, b"ci")?;
                        analyzed
                            .entry(file.clone())
                            .or_default()
                            .insert(nr, LineInstructions { covered, missed });
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"sourcefile" => source_file = None,
                b"package" => package.clear(),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CollectorError::parse(format!(
                    "malformed analyzer report: {e}"
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(analyzed)
}

fn required_attr(element: &BytesStart<'_>, name: &[u8]) -> Result<String> {
    for attr in element.attributes() {
        let attr =
            attr.map_err(|e| CollectorError::parse(format!("malformed attribute: {e}")))?;
        if attr.key.local_name().as_ref() == name {
            return Ok(String::from_utf8_lossy(&attr.value).into_owned());
        }
    }
    Err(CollectorError::parse(format!(
        "missing attribute '{}' on <{}>",
        String::from_utf8_lossy(name),
        String::from_utf8_lossy(element.local_name().as_ref())
    )))
}

fn parse_attr(element: &BytesStart<'_>, name: &[u8]) -> Result<u32> {
    let raw = required_attr(element, name)?;
    raw.parse().map_err(|_| {
        CollectorError::parse(format!(
            "attribute '{}' is not a number: '{raw}'",
            String::from_utf8_lossy(name)
        ))
    })
}
