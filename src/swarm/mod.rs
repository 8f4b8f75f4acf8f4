//! Docker Swarm cluster model
//!
//! Cluster specification, node roles and naming, swarm membership as reported
//! by a manager, and the record of a created cluster.

pub mod cluster;
pub mod node;
pub mod spec;

pub use cluster::{Cluster, DockerEndpoint, JoinTokens, SwarmEndpoint, SwarmInfo};
pub use node::{Member, MemberRole, NameGenerator, NodeRecord, NodeRole, NodeState};
pub use spec::ClusterSpec;
