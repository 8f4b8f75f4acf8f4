//! Container management module
//!
//! This module provides the node container configuration sent to the
//! daemon, the container state it reports back, and lifecycle management of
//! every container of a cluster.

pub mod config;
pub mod lifecycle;
pub mod state;

pub use config::{
    ContainerConfig, EndpointSettings, HostConfig, HostPort, NetworkingConfig, PortBinding,
    Protocol,
};
pub use lifecycle::ClusterManager;
pub use state::{
    ContainerInspect, ContainerStatus, ContainerSummary, NetworkEndpoint, NetworkSettings,
};
