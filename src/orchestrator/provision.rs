//! Creation of the cluster network and node containers

use super::fanout::fan_out;
use super::scope::Scope;
use crate::container::ContainerConfig;
use crate::docker::Runtime;
use crate::error::{Result, SindError};
use crate::network::NetworkConfig;
use crate::swarm::cluster::{SwarmEndpoint, DOCKER_DAEMON_PORT};
use crate::swarm::node::{CLUSTER_NAME_LABEL, CLUSTER_ROLE_LABEL};
use crate::swarm::{ClusterSpec, NameGenerator, NodeRecord, NodeRole};
use std::sync::Arc;
use tracing::{debug, info};

/// Containers and network making up a freshly provisioned cluster
#[derive(Debug, Clone)]
pub struct Topology {
    pub primary: NodeRecord,
    /// Managers other than the primary
    pub managers: Vec<NodeRecord>,
    pub workers: Vec<NodeRecord>,
    /// Primary node daemon, as published on the host
    pub swarm: SwarmEndpoint,
}

impl Topology {
    /// Every node but the primary, managers first
    pub fn joining_nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.managers.iter().chain(self.workers.iter())
    }
}

/// Make sure the node image is available on the host daemon
pub async fn ensure_image(runtime: &dyn Runtime, spec: &ClusterSpec, scope: &Scope) -> Result<()> {
    let image = spec.image_name();
    let present = match scope.run(runtime.image_exists(image)).await {
        Ok(present) => present,
        Err(e) => {
            debug!("unable to look up image {}: {}", image, e);
            false
        }
    };

    if present && !spec.pull_image {
        return Ok(());
    }

    info!("Pulling image {}", image);
    scope
        .run(runtime.pull_image(image))
        .await
        .map_err(|e| SindError::provisioning(format!("unable to pull the {} image", image), e))
}

/// Create the network and every node container, primary first
pub async fn provision(
    runtime: &Arc<dyn Runtime>,
    spec: &ClusterSpec,
    scope: &Scope,
) -> Result<Topology> {
    let port_bindings = spec.parsed_port_bindings()?;

    ensure_image(runtime.as_ref(), spec, scope).await?;

    let mut network = NetworkConfig::new(&spec.network_name)
        .label(CLUSTER_NAME_LABEL, &spec.cluster_name);
    if let Some(subnet) = &spec.network_subnet {
        network = network.subnet(subnet);
    }
    let network_id = scope
        .run(runtime.create_network(&network))
        .await
        .map_err(|e| SindError::provisioning("unable to create cluster network", e))?;
    info!("Created network {} ({})", spec.network_name, network_id);

    let base = ContainerConfig::new("", spec.image_name())
        .env("DOCKER_TLS_CERTDIR", "")
        .privileged(true)
        .label(CLUSTER_NAME_LABEL, &spec.cluster_name)
        .network(&spec.network_name, &network_id);

    let mut manager_names = NameGenerator::managers(&spec.cluster_name);
    let mut worker_names = NameGenerator::workers(&spec.cluster_name);
    let primary_name = manager_names.next_name();
    let mut others: Vec<(NodeRole, String)> = manager_names
        .take(spec.managers_to_run())
        .into_iter()
        .map(|name| (NodeRole::Manager, name))
        .collect();
    others.extend(
        worker_names
            .take(spec.workers_to_run())
            .into_iter()
            .map(|name| (NodeRole::Worker, name)),
    );

    let mut primary_config = base
        .renamed(&primary_name)
        .label(CLUSTER_ROLE_LABEL, NodeRole::Primary.as_label())
        .expose(DOCKER_DAEMON_PORT)
        .publish_all_ports(true);
    for binding in &port_bindings {
        primary_config = primary_config.bind(binding);
    }

    let (primary, swarm_port) = scope
        .run(run_primary(runtime.as_ref(), &primary_config, &spec.network_name))
        .await
        .map_err(|e| SindError::provisioning("unable to create the primary node", e))?;
    info!("Started primary node {}", primary.name);

    let swarm_port = swarm_port.ok_or_else(|| {
        SindError::connectivity(
            "unable to get the remote docker daemon port",
            SindError::PrimaryNodeNotBound,
        )
    })?;
    let swarm = SwarmEndpoint {
        host: runtime.host().published_host().to_string(),
        port: swarm_port,
    };

    let network_name = spec.network_name.clone();
    let nodes = fan_out(scope, spec.parallelism, others, |_, (role, name)| {
        let runtime = Arc::clone(runtime);
        let config = base
            .renamed(&name)
            .label(CLUSTER_ROLE_LABEL, role.as_label());
        let network_name = network_name.clone();
        async move { run_node(runtime.as_ref(), role, &config, &network_name).await }
    })
    .await
    .map_err(|e| SindError::provisioning("unable to create cluster nodes", e))?;

    let (managers, workers): (Vec<_>, Vec<_>) =
        nodes.into_iter().partition(|n| n.role.is_manager());
    info!(
        "Started {} manager and {} worker nodes",
        managers.len(),
        workers.len()
    );

    Ok(Topology {
        primary,
        managers,
        workers,
        swarm,
    })
}

/// Create, start and inspect the primary, returning its published daemon port
async fn run_primary(
    runtime: &dyn Runtime,
    config: &ContainerConfig,
    network: &str,
) -> Result<(NodeRecord, Option<u16>)> {
    let id = runtime.create_container(config).await?;
    runtime.start_container(&id).await?;
    let inspect = runtime.inspect_container(&id).await?;

    let record = NodeRecord {
        role: NodeRole::Primary,
        name: config.name.clone(),
        endpoint: inspect
            .address_on(network)
            .unwrap_or(&config.name)
            .to_string(),
        id,
    };
    Ok((record, inspect.host_port(DOCKER_DAEMON_PORT)))
}

async fn run_node(
    runtime: &dyn Runtime,
    role: NodeRole,
    config: &ContainerConfig,
    network: &str,
) -> Result<NodeRecord> {
    let id = runtime.create_container(config).await?;
    runtime.start_container(&id).await?;
    let inspect = runtime.inspect_container(&id).await?;
    debug!("Started {} node {}", role, config.name);

    Ok(NodeRecord {
        role,
        name: config.name.clone(),
        endpoint: inspect
            .address_on(network)
            .unwrap_or(&config.name)
            .to_string(),
        id,
    })
}
