//! Swarm bootstrap: initialize on the primary, join everybody else, wait

use super::fanout::fan_out;
use super::poll::{wait_cluster_ready, wait_daemon_ready};
use super::provision::{provision, Topology};
use super::scope::Scope;
use crate::docker::{DockerHost, Runtime};
use crate::error::{Result, SindError};
use crate::swarm::cluster::{DockerEndpoint, SWARM_LISTEN_ADDR, SWARM_PORT};
use crate::swarm::{Cluster, ClusterSpec, JoinTokens};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Create a swarm cluster and wait until it reports the requested topology
///
/// `runtime` is the daemon hosting the node containers. Nothing is cleaned
/// up on failure; deleting the cluster removes whatever was created.
pub async fn create_cluster(
    runtime: Arc<dyn Runtime>,
    spec: &ClusterSpec,
    scope: &Scope,
) -> Result<Cluster> {
    spec.validate()?;
    info!(
        "Creating cluster {} with {} managers and {} workers",
        spec.cluster_name, spec.managers, spec.workers
    );

    let topology = provision(&runtime, spec, scope).await?;

    let swarm = runtime
        .connect(DockerHost::Tcp {
            host: topology.swarm.host.clone(),
            port: topology.swarm.port,
        })
        .map_err(|e| SindError::connectivity("unable to connect to the swarm cluster", e))?;
    wait_daemon_ready(scope, swarm.as_ref())
        .await
        .map_err(|e| SindError::connectivity("unable to connect to the swarm cluster", e))?;

    let tokens = init_swarm(swarm.as_ref(), scope).await?;
    join_nodes(&runtime, &topology, &tokens, spec.parallelism, scope).await?;

    wait_cluster_ready(
        scope,
        swarm.as_ref(),
        spec.managers_to_run() + 1,
        spec.workers_to_run(),
    )
    .await
    .map_err(|e| SindError::convergence("unable to check swarm cluster", e))?;

    info!("Cluster {} is ready", spec.cluster_name);
    Ok(Cluster {
        name: spec.cluster_name.clone(),
        cluster: topology.swarm,
        host: DockerEndpoint {
            host: runtime.host().to_string(),
        },
        created_at: Utc::now(),
    })
}

/// Initialize the swarm on the primary and read back its join tokens
async fn init_swarm(swarm: &dyn Runtime, scope: &Scope) -> Result<JoinTokens> {
    let node_id = scope
        .run(swarm.init_swarm(SWARM_LISTEN_ADDR))
        .await
        .map_err(|e| SindError::bootstrap("unable to init the swarm", e))?;
    info!("Initialized swarm on primary node {}", node_id);

    let info = scope
        .run(swarm.inspect_swarm())
        .await
        .map_err(|e| SindError::bootstrap("unable to collect join tokens", e))?;
    Ok(info.join_tokens)
}

/// Join every node but the primary, concurrently
async fn join_nodes(
    runtime: &Arc<dyn Runtime>,
    topology: &Topology,
    tokens: &JoinTokens,
    parallelism: Option<usize>,
    scope: &Scope,
) -> Result<()> {
    let primary_addr = format!("{}:{}", topology.primary.endpoint, SWARM_PORT);
    let nodes: Vec<_> = topology.joining_nodes().cloned().collect();
    let count = nodes.len();

    fan_out(scope, parallelism, nodes, |_, node| {
        let runtime = Arc::clone(runtime);
        let token = if node.role.is_manager() {
            tokens.manager.clone()
        } else {
            tokens.worker.clone()
        };
        let cmd = join_command(&token, &primary_addr);
        async move { runtime.exec(&node.id, &cmd).await }
    })
    .await
    .map_err(|e| SindError::join("unable to build the cluster", e))?;

    info!("Joined {} nodes to the swarm", count);
    Ok(())
}

fn join_command(token: &str, primary_addr: &str) -> Vec<String> {
    ["docker", "swarm", "join", "--token", token, primary_addr]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
