//! Docker Engine API
//!
//! The [`Runtime`] trait is everything the orchestrator needs from a
//! container runtime. [`DockerClient`] implements it against a real daemon
//! over a unix socket or plain TCP.

pub mod client;
pub mod host;

#[cfg(test)]
pub(crate) mod fake;

pub use client::DockerClient;
pub use host::DockerHost;

use crate::container::{ContainerConfig, ContainerInspect, ContainerSummary};
use crate::error::Result;
use crate::network::{NetworkConfig, NetworkSummary};
use crate::swarm::{Member, SwarmInfo};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Control API of a container runtime
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Address of the daemon
    fn host(&self) -> &DockerHost;

    /// Client for another daemon, e.g. one running inside a node container
    fn connect(&self, host: DockerHost) -> Result<Arc<dyn Runtime>>;

    /// Daemon liveness check
    async fn ping(&self) -> Result<()>;

    /// Whether an image matching the reference is present
    async fn image_exists(&self, reference: &str) -> Result<bool>;

    /// Pull an image, returning once the pull completed
    async fn pull_image(&self, reference: &str) -> Result<()>;

    /// Export images as a tarball written to `destination`, returning its size
    async fn save_images(&self, references: &[String], destination: &Path) -> Result<u64>;

    /// Create a network, returning its ID
    async fn create_network(&self, config: &NetworkConfig) -> Result<String>;

    /// List networks carrying a `key=value` label
    async fn list_networks(&self, label: &str) -> Result<Vec<NetworkSummary>>;

    /// Remove a network
    async fn remove_network(&self, id: &str) -> Result<()>;

    /// Create a container, returning its ID
    async fn create_container(&self, config: &ContainerConfig) -> Result<String>;

    /// Start a container
    async fn start_container(&self, id: &str) -> Result<()>;

    /// Inspect a container
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspect>;

    /// List containers carrying a `key=value` label, running ones only unless `all`
    async fn list_containers(&self, label: &str, all: bool) -> Result<Vec<ContainerSummary>>;

    /// Stop a container with the daemon default grace period
    async fn stop_container(&self, id: &str) -> Result<()>;

    /// Remove a container and its anonymous volumes, killing it if needed
    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Run a command in a container and wait for it, failing on non-zero exit
    async fn exec(&self, id: &str, cmd: &[String]) -> Result<String>;

    /// Extract a tar archive into a directory of a container
    async fn copy_to_container(&self, id: &str, destination: &str, archive: &Path) -> Result<()>;

    /// Initialize a swarm on this daemon, returning the node ID
    async fn init_swarm(&self, listen_addr: &str) -> Result<String>;

    /// Inspect the swarm this daemon manages
    async fn inspect_swarm(&self) -> Result<SwarmInfo>;

    /// List the members of the swarm this daemon manages
    async fn list_nodes(&self) -> Result<Vec<Member>>;
}
