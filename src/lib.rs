//! sind - Swarm in Docker
//!
//! sind creates Docker Swarm clusters out of Docker-in-Docker containers
//! running on a single Docker host. It provides:
//!
//! - Cluster provisioning (network plus primary, manager and worker nodes)
//! - Swarm bootstrap and concurrent node joins
//! - Image distribution from the host to every node
//! - Cluster lifecycle management (start, stop, delete)
//! - A file-backed store of created clusters

pub mod container;
pub mod docker;
pub mod error;
pub mod network;
pub mod orchestrator;
pub mod store;
pub mod swarm;

pub use error::{Result, SindError};
