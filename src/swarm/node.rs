//! Swarm node roles, naming and membership state

use serde::{Deserialize, Serialize};

/// Label carrying the owning cluster name on every container and network
pub const CLUSTER_NAME_LABEL: &str = "com.sind.cluster.name";

/// Label carrying the node role on every container
pub const CLUSTER_ROLE_LABEL: &str = "com.sind.cluster.role";

/// `key=value` label filter selecting the resources of one cluster
pub fn cluster_label_filter(cluster_name: &str) -> String {
    format!("{}={}", CLUSTER_NAME_LABEL, cluster_name)
}

/// Role a node container plays in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// First manager: initializes the swarm and exposes its daemon to the host
    Primary,
    /// Additional manager joining with the manager token
    Manager,
    /// Worker joining with the worker token
    Worker,
}

impl NodeRole {
    /// Value stored in the role label
    pub fn as_label(&self) -> &'static str {
        match self {
            NodeRole::Primary => "primary",
            NodeRole::Manager => "manager",
            NodeRole::Worker => "worker",
        }
    }

    /// Whether the node joins the swarm as a manager
    pub fn is_manager(&self) -> bool {
        matches!(self, NodeRole::Primary | NodeRole::Manager)
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

/// Role reported by the swarm for one of its members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Manager,
    Worker,
}

/// Node state as reported by the swarm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Node is down
    Down,
    /// Node is ready
    Ready,
    /// Node is disconnected
    Disconnected,
    /// Anything else the swarm reports, `unknown` included
    #[default]
    #[serde(other)]
    Unknown,
}

/// Swarm member, as returned by the node listing of a manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Member {
    #[serde(rename = "ID")]
    pub id: String,
    pub spec: MemberSpec,
    pub status: MemberStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemberSpec {
    pub role: MemberRole,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemberStatus {
    #[serde(default)]
    pub state: NodeState,
}

impl Member {
    /// Check if member is ready
    pub fn is_ready(&self) -> bool {
        self.status.state == NodeState::Ready
    }
}

/// Count ready members per role, returning `(managers, workers)`
pub fn count_ready_members(members: &[Member]) -> (usize, usize) {
    members
        .iter()
        .filter(|m| m.is_ready())
        .fold((0, 0), |(managers, workers), m| match m.spec.role {
            MemberRole::Manager => (managers + 1, workers),
            MemberRole::Worker => (managers, workers + 1),
        })
}

/// A provisioned node container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node role
    pub role: NodeRole,
    /// Container name, also its hostname
    pub name: String,
    /// Container ID assigned by the runtime
    pub id: String,
    /// Address of the node on the cluster network
    pub endpoint: String,
}

/// Deterministic container names for one role of one cluster
#[derive(Debug, Clone)]
pub struct NameGenerator {
    prefix: String,
    index: usize,
}

impl NameGenerator {
    /// Names of the form `<cluster>-manager-<n>`; shared by the primary and the other managers
    pub fn managers(cluster_name: &str) -> Self {
        Self {
            prefix: format!("{}-manager-", cluster_name),
            index: 0,
        }
    }

    /// Names of the form `<cluster>-worker-<n>`
    pub fn workers(cluster_name: &str) -> Self {
        Self {
            prefix: format!("{}-worker-", cluster_name),
            index: 0,
        }
    }

    /// Next name in the sequence
    pub fn next_name(&mut self) -> String {
        let name = format!("{}{}", self.prefix, self.index);
        self.index += 1;
        name
    }

    /// Take the next `count` names
    pub fn take(&mut self, count: usize) -> Vec<String> {
        (0..count).map(|_| self.next_name()).collect()
    }
}
