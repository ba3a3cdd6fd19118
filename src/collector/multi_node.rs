//! Fan-out collection and reset across every node of an application.
//!
//! Per-node attempts are independent, each writing its own capture file, so
//! they run on the rayon pool with no shared mutable state. Aggregation
//! (success/failure lists, fleet merge) happens only after every attempt
//! finished. Individual node failures are data, not errors; zero successes
//! out of a non-zero fleet is escalated.

use log::{error, info, warn};
use rayon::prelude::*;

use super::agent::AgentClientFactory;
use super::nodes::{NodeDiscovery, NodeInstance};
use crate::capture::exec::write_capture;
use crate::capture::fleet::merge_fleet_captures;
use crate::capture::{fresh_timestamp, node_file_name, sanitize_node_id, CaptureFile};
use crate::config::CoverageConfig;
use crate::errors::{CollectorError, Result};

#[derive(Debug)]
pub struct CollectionOutcome {
    pub app_name: String,
    pub cluster_name: Option<String>,
    pub tag: String,
    pub total_nodes: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub successful_captures: Vec<CaptureFile>,
    pub failed_nodes: Vec<String>,
    /// Present when more than one node contributed this round.
    pub fleet_capture: Option<CaptureFile>,
}

#[derive(Debug)]
pub struct ResetOutcome {
    pub app_name: String,
    pub cluster_name: Option<String>,
    pub total_nodes: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub failed_nodes: Vec<String>,
}

pub struct MultiNodeCollector<'a> {
    config: &'a CoverageConfig,
    discovery: &'a dyn NodeDiscovery,
    clients: &'a dyn AgentClientFactory,
}

impl<'a> MultiNodeCollector<'a> {
    pub fn new(
        config: &'a CoverageConfig,
        discovery: &'a dyn NodeDiscovery,
        clients: &'a dyn AgentClientFactory,
    ) -> Self {
        Self {
            config,
            discovery,
            clients,
        }
    }

    /// Collect a capture from every discovered node of one scope.
    pub fn collect_from_all_nodes(
        &self,
        app_name: &str,
        cluster_name: Option<&str>,
        tag: &str,
    ) -> Result<CollectionOutcome> {
        info!(
            "collecting coverage from all nodes, app: {app_name}, cluster: {}, tag: {tag}",
            cluster_name.unwrap_or("-")
        );

        let instances = self.discovery.instances(app_name, cluster_name)?;
        let total_nodes = instances.len();
        if instances.is_empty() {
            warn!("no application instances found for app: {app_name}");
            return Ok(CollectionOutcome {
                app_name: app_name.to_string(),
                cluster_name: cluster_name.map(String::from),
                tag: tag.to_string(),
                total_nodes: 0,
                success_count: 0,
                failed_count: 0,
                successful_captures: Vec::new(),
                failed_nodes: Vec::new(),
                fleet_capture: None,
            });
        }

        let scope_dir = self.config.scope_dir(app_name, cluster_name, tag);
        let results: Vec<std::result::Result<CaptureFile, String>> = instances
            .par_iter()
            .map(|instance| self.collect_from_node(instance, &scope_dir))
            .collect();

        let mut successful_captures = Vec::new();
        let mut failed_nodes = Vec::new();
        for result in results {
            match result {
                Ok(capture) => successful_captures.push(capture),
                Err(node_id) => failed_nodes.push(node_id),
            }
        }

        if successful_captures.is_empty() {
            return Err(CollectorError::external_tool(
                "coverage agents",
                format!("0 of {total_nodes} nodes delivered a capture"),
            ));
        }

        let fleet_capture = if successful_captures.len() > 1 {
            info!("merging {} node captures fleet-wide", successful_captures.len());
            merge_fleet_captures(&successful_captures)?
        } else {
            None
        };

        info!(
            "multi-node collection finished, success: {}, failed: {}",
            successful_captures.len(),
            failed_nodes.len()
        );

        Ok(CollectionOutcome {
            app_name: app_name.to_string(),
            cluster_name: cluster_name.map(String::from),
            tag: tag.to_string(),
            total_nodes,
            success_count: successful_captures.len(),
            failed_count: failed_nodes.len(),
            successful_captures,
            failed_nodes,
            fleet_capture,
        })
    }

    /// One node's attempt: dump over the wire, persist under the scope.
    /// Failures collapse to the node id; callers report them as data.
    fn collect_from_node(
        &self,
        instance: &NodeInstance,
        scope_dir: &std::path::Path,
    ) -> std::result::Result<CaptureFile, String> {
        info!(
            "collecting from node: {} ({}:{})",
            instance.node_id, instance.host, instance.port
        );
        let attempt = || -> Result<CaptureFile> {
            let data = self.clients.client(instance).request_dump()?;
            let path = scope_dir.join(node_file_name(
                &sanitize_node_id(&instance.node_id),
                &fresh_timestamp(),
            ));
            write_capture(&path, &data)?;
            Ok(CaptureFile::from_path(path))
        };
        attempt().map_err(|e| {
            error!("node {} collection failed: {e}", instance.node_id);
            instance.node_id.clone()
        })
    }

    /// Ask every discovered node to zero its probe data.
    pub fn reset_all_nodes(
        &self,
        app_name: &str,
        cluster_name: Option<&str>,
    ) -> Result<ResetOutcome> {
        info!(
            "resetting coverage on all nodes, app: {app_name}, cluster: {}",
            cluster_name.unwrap_or("-")
        );

        let instances = self.discovery.instances(app_name, cluster_name)?;
        let total_nodes = instances.len();

        let failed_nodes: Vec<String> = instances
            .par_iter()
            .filter_map(|instance| {
                match self.clients.client(instance).request_reset() {
                    Ok(()) => {
                        info!("node {} reset", instance.node_id);
                        None
                    }
                    Err(e) => {
                        error!("node {} reset failed: {e}", instance.node_id);
                        Some(instance.node_id.clone())
                    }
                }
            })
            .collect();

        Ok(ResetOutcome {
            app_name: app_name.to_string(),
            cluster_name: cluster_name.map(String::from),
            total_nodes,
            success_count: total_nodes - failed_nodes.len(),
            failed_count: failed_nodes.len(),
            failed_nodes,
        })
    }
}
