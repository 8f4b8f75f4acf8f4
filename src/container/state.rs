//! Container state as reported by the daemon

use super::config::HostPort;
use crate::swarm::node::{NodeRole, CLUSTER_NAME_LABEL, CLUSTER_ROLE_LABEL};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Container status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Container is created but not running
    Created,
    /// Container is running
    Running,
    /// Container is paused
    Paused,
    /// Container is restarting
    Restarting,
    /// Container is being removed
    Removing,
    /// Container has exited
    Exited,
    /// Container is in an error state
    Dead,
    /// Anything the daemon reports that we do not know about
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerStatus::Created => write!(f, "created"),
            ContainerStatus::Running => write!(f, "running"),
            ContainerStatus::Paused => write!(f, "paused"),
            ContainerStatus::Restarting => write!(f, "restarting"),
            ContainerStatus::Removing => write!(f, "removing"),
            ContainerStatus::Exited => write!(f, "exited"),
            ContainerStatus::Dead => write!(f, "dead"),
            ContainerStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Container list item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub state: ContainerStatus,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    /// Container name without the leading slash
    pub fn name(&self) -> &str {
        self.names
            .first()
            .map(|n| n.trim_start_matches('/'))
            .unwrap_or_default()
    }

    /// Cluster the container belongs to
    pub fn cluster_name(&self) -> Option<&str> {
        self.labels.get(CLUSTER_NAME_LABEL).map(String::as_str)
    }

    /// Role of the node the container hosts
    pub fn role(&self) -> Option<NodeRole> {
        match self.labels.get(CLUSTER_ROLE_LABEL).map(String::as_str) {
            Some("primary") => Some(NodeRole::Primary),
            Some("manager") => Some(NodeRole::Manager),
            Some("worker") => Some(NodeRole::Worker),
            _ => None,
        }
    }

    /// Short container ID
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(12)]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    #[serde(rename = "IPAddress", default)]
    pub ip_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkSettings {
    #[serde(default)]
    pub ports: HashMap<String, Option<Vec<HostPort>>>,
    #[serde(default)]
    pub networks: HashMap<String, NetworkEndpoint>,
}

/// Container inspect response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInspect {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub network_settings: NetworkSettings,
}

impl ContainerInspect {
    /// First host port a container port is published on
    pub fn host_port(&self, port_key: &str) -> Option<u16> {
        self.network_settings
            .ports
            .get(port_key)?
            .as_ref()?
            .first()?
            .host_port
            .parse()
            .ok()
    }

    /// IP address of the container on a network
    pub fn address_on(&self, network: &str) -> Option<&str> {
        self.network_settings
            .networks
            .get(network)
            .map(|n| n.ip_address.as_str())
            .filter(|ip| !ip.is_empty())
    }
}
