//! Swarm cluster record

use crate::docker::{DockerClient, DockerHost};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Address the primary listens on for swarm traffic
pub const SWARM_LISTEN_ADDR: &str = "0.0.0.0:2377";

/// Port other nodes join the primary on
pub const SWARM_PORT: u16 = 2377;

/// Port the embedded docker daemon of a node listens on
pub const DOCKER_DAEMON_PORT: &str = "2375/tcp";

/// Join tokens of a swarm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JoinTokens {
    pub worker: String,
    pub manager: String,
}

/// Swarm inspection, as returned by a manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SwarmInfo {
    #[serde(rename = "ID", default)]
    pub id: String,
    pub join_tokens: JoinTokens,
}

/// Swarm control endpoint, reachable from the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmEndpoint {
    pub host: String,
    pub port: u16,
}

impl SwarmEndpoint {
    /// `DOCKER_HOST` value pointing at the primary node daemon
    pub fn docker_host(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

/// Docker daemon hosting the cluster containers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerEndpoint {
    /// `DOCKER_HOST`-style address, e.g. `unix:///var/run/docker.sock`
    pub host: String,
}

/// A created cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster name
    pub name: String,
    /// Swarm control endpoint
    pub cluster: SwarmEndpoint,
    /// Host daemon endpoint
    pub host: DockerEndpoint,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Cluster {
    /// Client for the daemon hosting the node containers
    pub fn host_client(&self) -> Result<DockerClient> {
        DockerClient::new(DockerHost::parse(&self.host.host)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> Cluster {
        Cluster {
            name: "demo".to_string(),
            cluster: SwarmEndpoint {
                host: "localhost".to_string(),
                port: 32768,
            },
            host: DockerEndpoint {
                host: "unix:///var/run/docker.sock".to_string(),
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_swarm_docker_host() {
        assert_eq!(cluster().cluster.docker_host(), "tcp://localhost:32768");
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let cluster = cluster();
        let json = serde_json::to_string(&cluster).unwrap();
        let back: Cluster = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cluster);
    }

    #[test]
    fn test_swarm_info_from_api_payload() {
        let json = r#"{"ID": "abc", "JoinTokens": {"Worker": "SWMTKN-1-w", "Manager": "SWMTKN-1-m"}}"#;
        let info: SwarmInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.join_tokens.worker, "SWMTKN-1-w");
        assert_eq!(info.join_tokens.manager, "SWMTKN-1-m");
    }

    #[test]
    fn test_host_client_rejects_bad_host() {
        let mut cluster = cluster();
        cluster.host.host = "ftp://nope".to_string();
        assert!(cluster.host_client().is_err());
    }
}
