//! Network module
//!
//! Shapes of the cluster network as sent to and returned by the daemon.

pub mod config;

pub use config::{IpamConfig, IpamPoolConfig, NetworkConfig, NetworkSummary};
