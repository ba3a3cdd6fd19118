//! Multi-node capture collection: node discovery, agent clients, and the
//! fan-out that aggregates per-node results into one outcome.

pub mod agent;
pub mod multi_node;
pub mod nodes;

pub use agent::{AgentClient, AgentClientFactory, TcpAgentClient, TcpClientFactory};
pub use multi_node::{CollectionOutcome, MultiNodeCollector, ResetOutcome};
pub use nodes::{NodeDiscovery, NodeInstance, StaticNodeDiscovery};
