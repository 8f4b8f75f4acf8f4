//! Cluster specification and pre-flight validation

use crate::container::PortBinding;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default image used for swarm nodes
pub const DEFAULT_NODE_IMAGE: &str = "docker:18.09-dind";

/// Default cluster and network name
pub const DEFAULT_CLUSTER_NAME: &str = "sind_default";

/// Parameters of a cluster to create
///
/// Counts are signed so that a negative worker count coming from a caller is
/// representable and rejected by [`ClusterSpec::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Cluster name, prefix of every container name
    pub cluster_name: String,
    /// Name of the network to create
    pub network_name: String,
    /// Optional subnet of the network, e.g. `10.7.0.0/24`
    pub network_subnet: Option<String>,
    /// Number of managers, primary included
    pub managers: i64,
    /// Number of workers
    pub workers: i64,
    /// Node image; empty means [`DEFAULT_NODE_IMAGE`]
    pub image: String,
    /// Pull the image even if it is present locally
    pub pull_image: bool,
    /// Host port bindings applied to the primary node
    pub port_bindings: Vec<String>,
    /// Upper bound on concurrent tasks per fan-out step, unbounded when `None`
    pub parallelism: Option<usize>,
}

impl Default for ClusterSpec {
    fn default() -> Self {
        Self {
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            network_name: DEFAULT_CLUSTER_NAME.to_string(),
            network_subnet: None,
            managers: 1,
            workers: 0,
            image: DEFAULT_NODE_IMAGE.to_string(),
            pull_image: false,
            port_bindings: Vec::new(),
            parallelism: None,
        }
    }
}

impl ClusterSpec {
    /// Create a spec with one manager and no worker
    pub fn new(cluster_name: &str, network_name: &str) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            network_name: network_name.to_string(),
            ..Self::default()
        }
    }

    /// Set manager count
    pub fn managers(mut self, managers: i64) -> Self {
        self.managers = managers;
        self
    }

    /// Set worker count
    pub fn workers(mut self, workers: i64) -> Self {
        self.workers = workers;
        self
    }

    /// Set network subnet
    pub fn subnet(mut self, subnet: &str) -> Self {
        self.network_subnet = Some(subnet.to_string());
        self
    }

    /// Set node image
    pub fn image(mut self, image: &str) -> Self {
        self.image = image.to_string();
        self
    }

    /// Force pulling the node image
    pub fn pull_image(mut self, pull: bool) -> Self {
        self.pull_image = pull;
        self
    }

    /// Add a host port binding
    pub fn port(mut self, spec: &str) -> Self {
        self.port_bindings.push(spec.to_string());
        self
    }

    /// Bound the number of concurrent tasks per fan-out step
    pub fn parallelism(mut self, limit: usize) -> Self {
        self.parallelism = Some(limit);
        self
    }

    /// Check the spec before any side effect
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster_name.is_empty() {
            return Err(ConfigError::EmptyClusterName);
        }

        if self.network_name.is_empty() {
            return Err(ConfigError::EmptyNetworkName);
        }

        if self.managers < 1 {
            return Err(ConfigError::InvalidManagerCount);
        }

        if self.workers < 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }

        self.parsed_port_bindings()?;

        Ok(())
    }

    /// Image to run the nodes with
    pub fn image_name(&self) -> &str {
        if self.image.is_empty() {
            DEFAULT_NODE_IMAGE
        } else {
            &self.image
        }
    }

    /// Managers to provision besides the primary
    pub fn managers_to_run(&self) -> usize {
        usize::try_from(self.managers.saturating_sub(1)).unwrap_or(0)
    }

    /// Workers to provision
    pub fn workers_to_run(&self) -> usize {
        usize::try_from(self.workers).unwrap_or(0)
    }

    /// Parse the port binding specs
    pub fn parsed_port_bindings(&self) -> Result<Vec<PortBinding>, ConfigError> {
        self.port_bindings
            .iter()
            .map(|spec| PortBinding::parse(spec))
            .collect()
    }
}
