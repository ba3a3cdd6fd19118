//! Configuration loading and application path resolution.
//!
//! Configuration is read once from `deltacov.toml` and passed into each
//! component as an immutable value; nothing reads ambient global state.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery::find_roots;
use crate::errors::{CollectorError, Result};

pub const CONFIG_FILE_NAME: &str = "deltacov.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageConfig {
    /// Every application checkout lives under this path as `<app>-<tag>`.
    pub base_project_path: String,
    /// Root of the per-scope capture directories.
    pub dump_directory: PathBuf,
    /// Root of the per-scope report directories.
    pub report_output_directory: PathBuf,
    /// Extension of source files the diff is restricted to.
    pub source_extension: String,
    /// Unmerged captures kept per scope; merged keep `max(1, keep / 2)`.
    pub retention_keep: usize,
    /// Relative-path suffix that identifies a source root during discovery.
    pub source_root_suffix: String,
    /// Relative-path suffix that identifies a class root during discovery.
    pub class_root_suffix: String,
    /// Global fallback source roots (absolute), used when an application has
    /// neither explicit directories nor discoverable roots.
    pub source_directories: Vec<String>,
    /// Global fallback class roots (absolute).
    pub class_directories: Vec<String>,
    pub analyzer: AnalyzerConfig,
    pub applications: BTreeMap<String, ApplicationConfig>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            base_project_path: "~/project".to_string(),
            dump_directory: PathBuf::from("./capture-files"),
            report_output_directory: PathBuf::from("./coverage-reports"),
            source_extension: "java".to_string(),
            retention_keep: 10,
            source_root_suffix: "src/main/java".to_string(),
            class_root_suffix: "target/classes".to_string(),
            source_directories: Vec::new(),
            class_directories: Vec::new(),
            analyzer: AnalyzerConfig::default(),
            applications: BTreeMap::new(),
        }
    }
}

/// External analyzer invocation: a command template with `{capture}`,
/// `{classes}` and `{output}` placeholders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    pub command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApplicationConfig {
    pub agent_host: String,
    pub agent_port: u16,
    /// Source roots relative to the application root; empty means discover.
    pub source_directories: Vec<String>,
    /// Class roots relative to the application root; empty means discover.
    pub class_directories: Vec<String>,
    /// Known nodes for multi-node collection.
    pub nodes: Vec<NodeConfig>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            agent_host: "localhost".to_string(),
            agent_port: 6300,
            source_directories: Vec::new(),
            class_directories: Vec::new(),
            nodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub node_id: String,
    pub host: String,
    pub port: u16,
}

/// An application's paths after precedence resolution, ready for the
/// pipeline.
#[derive(Debug, Clone)]
pub struct ResolvedApplication {
    pub app_name: String,
    /// `<base_project_path>/<app>-<tag>`; the git repository checkout.
    pub repo_path: PathBuf,
    pub source_roots: Vec<PathBuf>,
    pub class_roots: Vec<PathBuf>,
}

impl CoverageConfig {
    /// Load from an explicit path, or from `deltacov.toml` in the working
    /// directory, or fall back to defaults when no file exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => {
                if !p.is_file() {
                    return Err(CollectorError::configuration(format!(
                        "config file does not exist: {}",
                        p.display()
                    )));
                }
                p.to_path_buf()
            }
            None => {
                let default = PathBuf::from(CONFIG_FILE_NAME);
                if !default.is_file() {
                    debug!("no {CONFIG_FILE_NAME} found, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        let contents = fs::read_to_string(&path)?;
        let config = parse_config(&contents)
            .map_err(|e| CollectorError::configuration(format!("{}: {e}", path.display())))?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn application(&self, app_name: &str) -> ApplicationConfig {
        self.applications.get(app_name).cloned().unwrap_or_default()
    }

    /// `base_project_path` with `~` expanded.
    pub fn base_path(&self) -> PathBuf {
        expand_home(&self.base_project_path)
    }

    /// The checkout directory for one application at one tag.
    pub fn app_root(&self, app_name: &str, tag: &str) -> PathBuf {
        let dir = if tag.is_empty() {
            app_name.to_string()
        } else {
            format!("{app_name}-{tag}")
        };
        self.base_path().join(dir)
    }

    /// The capture directory for a scope.
    pub fn scope_dir(&self, app_name: &str, cluster_name: Option<&str>, tag: &str) -> PathBuf {
        crate::capture::scope_directory(&self.dump_directory, app_name, cluster_name, tag)
    }

    /// Resolve an application's source and class roots.
    ///
    /// Precedence: explicit per-application directories (joined to the app
    /// root), then roots discovered under the app root by suffix, then the
    /// global absolute fallbacks.
    pub fn resolve_application(&self, app_name: &str, tag: &str) -> ResolvedApplication {
        let app_root = self.app_root(app_name, tag);
        let app_config = self.application(app_name);

        let explicit = !app_config.source_directories.is_empty()
            && !app_config.class_directories.is_empty();
        let (source_roots, class_roots) = if explicit {
            info!("application '{app_name}' uses configured roots under {}", app_root.display());
            (
                join_all(&app_root, &app_config.source_directories),
                join_all(&app_root, &app_config.class_directories),
            )
        } else {
            info!(
                "application '{app_name}' has no configured roots, scanning {}",
                app_root.display()
            );
            let discovered_sources = find_roots(&app_root, &self.source_root_suffix);
            let discovered_classes = find_roots(&app_root, &self.class_root_suffix);
            (
                fallback_if_empty(discovered_sources, &self.source_directories),
                fallback_if_empty(discovered_classes, &self.class_directories),
            )
        };

        ResolvedApplication {
            app_name: app_name.to_string(),
            repo_path: app_root,
            source_roots,
            class_roots,
        }
    }
}

/// Pure parse step, split from I/O the way the config loader keeps both
/// testable.
pub fn parse_config(contents: &str) -> std::result::Result<CoverageConfig, String> {
    toml::from_str::<CoverageConfig>(contents)
        .map_err(|e| format!("failed to parse {CONFIG_FILE_NAME}: {e}"))
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn join_all(root: &Path, rels: &[String]) -> Vec<PathBuf> {
    rels.iter().map(|rel| root.join(rel)).collect()
}

fn fallback_if_empty(found: Vec<PathBuf>, fallback: &[String]) -> Vec<PathBuf> {
    if found.is_empty() {
        fallback.iter().map(PathBuf::from).collect()
    } else {
        found
    }
}
