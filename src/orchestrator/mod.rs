//! Cluster orchestration
//!
//! Everything that drives a [`Runtime`](crate::docker::Runtime) through the
//! creation of a cluster or the distribution of images to it. A single
//! [`Scope`] bounds a whole call; concurrent steps run through [`fan_out`]
//! and waits go through [`poll_until`].

pub mod bootstrap;
pub mod fanout;
pub mod poll;
pub mod provision;
pub mod push;
pub mod scope;

pub use bootstrap::create_cluster;
pub use fanout::fan_out;
pub use poll::{poll_until, wait_cluster_ready, wait_daemon_ready, POLL_INTERVAL};
pub use provision::{provision, Topology};
pub use push::push_images;
pub use scope::Scope;
