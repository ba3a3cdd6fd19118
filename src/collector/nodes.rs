//! Node discovery seam.
//!
//! A service registry would implement `NodeDiscovery`; the shipped
//! implementation reads the node list from configuration, falling back to
//! the application's single configured agent when no nodes are listed.

use crate::config::CoverageConfig;
use crate::errors::Result;

/// One running application instance exposing a coverage agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInstance {
    pub node_id: String,
    pub host: String,
    pub port: u16,
}

/// `Sync` so a discovery handle can sit in the collector while per-node
/// attempts fan out on the rayon pool.
pub trait NodeDiscovery: Sync {
    fn instances(&self, app_name: &str, cluster_name: Option<&str>) -> Result<Vec<NodeInstance>>;
}

/// Configuration-backed discovery.
pub struct StaticNodeDiscovery<'a> {
    config: &'a CoverageConfig,
}

impl<'a> StaticNodeDiscovery<'a> {
    pub fn new(config: &'a CoverageConfig) -> Self {
        Self { config }
    }
}

impl NodeDiscovery for StaticNodeDiscovery<'_> {
    fn instances(&self, app_name: &str, _cluster_name: Option<&str>) -> Result<Vec<NodeInstance>> {
        let app = self.config.application(app_name);
        if !app.nodes.is_empty() {
            return Ok(app
                .nodes
                .iter()
                .map(|n| NodeInstance {
                    node_id: n.node_id.clone(),
                    host: n.host.clone(),
                    port: n.port,
                })
                .collect());
        }
        // Single-agent fallback: the application's configured agent is the
        // whole fleet.
        Ok(vec![NodeInstance {
            node_id: format!("{}-{}", app.agent_host, app.agent_port),
            host: app.agent_host,
            port: app.agent_port,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApplicationConfig, NodeConfig};

    #[test]
    fn test_configured_nodes_returned() {
        let mut config = CoverageConfig::default();
        config.applications.insert(
            "billing".into(),
            ApplicationConfig {
                nodes: vec![
                    NodeConfig {
                        node_id: "bill-1".into(),
                        host: "10.0.0.7".into(),
                        port: 6400,
                    },
                    NodeConfig {
                        node_id: "bill-2".into(),
                        host: "10.0.0.8".into(),
                        port: 6400,
                    },
                ],
                ..Default::default()
            },
        );

        let discovery = StaticNodeDiscovery::new(&config);
        let instances = discovery.instances("billing", None).unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].node_id, "bill-1");
    }

    #[test]
    fn test_falls_back_to_single_agent() {
        let config = CoverageConfig::default();
        let discovery = StaticNodeDiscovery::new(&config);
        let instances = discovery.instances("anything", None).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].host, "localhost");
        assert_eq!(instances[0].port, 6300);
    }
}
