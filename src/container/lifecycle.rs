//! Cluster container lifecycle management

use super::state::ContainerSummary;
use crate::docker::Runtime;
use crate::error::{Result, SindError};
use crate::orchestrator::{fan_out, Scope};
use crate::swarm::node::cluster_label_filter;
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle manager for the containers and network of one cluster
///
/// Resources are found through the cluster name label, so this works from
/// nothing but the cluster name. Operations are idempotent: resources
/// already in the requested state, or already gone, are skipped.
pub struct ClusterManager {
    runtime: Arc<dyn Runtime>,
    cluster_name: String,
}

impl ClusterManager {
    /// Create a new cluster manager
    pub fn new(runtime: Arc<dyn Runtime>, cluster_name: &str) -> Self {
        Self {
            runtime,
            cluster_name: cluster_name.to_string(),
        }
    }

    /// List cluster containers, running ones only unless `all`
    pub async fn list(&self, all: bool, scope: &Scope) -> Result<Vec<ContainerSummary>> {
        scope
            .run(
                self.runtime
                    .list_containers(&cluster_label_filter(&self.cluster_name), all),
            )
            .await
            .map_err(|e| SindError::lifecycle("unable to list cluster containers", e))
    }

    /// Start every container of the cluster
    pub async fn start(&self, scope: &Scope) -> Result<usize> {
        let ids = self.ids(true, scope).await?;
        let count = ids.len();

        fan_out(scope, None, ids, |_, id| {
            let runtime = Arc::clone(&self.runtime);
            async move {
                match runtime.start_container(&id).await {
                    Err(e) if e.is_not_modified() => {
                        debug!("container {} already started", id);
                        Ok(())
                    }
                    other => other,
                }
            }
        })
        .await
        .map_err(|e| SindError::lifecycle("unable to start cluster", e))?;

        info!("Started {} containers of cluster {}", count, self.cluster_name);
        Ok(count)
    }

    /// Stop every running container of the cluster
    pub async fn stop(&self, scope: &Scope) -> Result<usize> {
        let ids = self.ids(false, scope).await?;
        let count = ids.len();

        fan_out(scope, None, ids, |_, id| {
            let runtime = Arc::clone(&self.runtime);
            async move {
                match runtime.stop_container(&id).await {
                    Err(e) if e.is_not_modified() || e.is_not_found() => {
                        debug!("container {} already stopped", id);
                        Ok(())
                    }
                    other => other,
                }
            }
        })
        .await
        .map_err(|e| SindError::lifecycle("unable to stop cluster", e))?;

        info!("Stopped {} containers of cluster {}", count, self.cluster_name);
        Ok(count)
    }

    /// Remove every container of the cluster with its volumes, then its network
    pub async fn delete(&self, scope: &Scope) -> Result<()> {
        let ids = self.ids(true, scope).await?;
        let count = ids.len();

        fan_out(scope, None, ids, |_, id| {
            let runtime = Arc::clone(&self.runtime);
            async move {
                match runtime.remove_container(&id).await {
                    Err(e) if e.is_not_found() => Ok(()),
                    other => other,
                }
            }
        })
        .await
        .map_err(|e| SindError::lifecycle("unable to remove cluster containers", e))?;
        info!("Removed {} containers of cluster {}", count, self.cluster_name);

        let label = cluster_label_filter(&self.cluster_name);
        let networks = scope
            .run(self.runtime.list_networks(&label))
            .await
            .map_err(|e| SindError::lifecycle("unable to list cluster networks", e))?;

        for network in networks {
            match scope.run(self.runtime.remove_network(&network.id)).await {
                Ok(()) => info!("Removed network {}", network.name),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    return Err(SindError::lifecycle(
                        format!("unable to remove network {}", network.name),
                        e,
                    ))
                }
            }
        }

        Ok(())
    }

    async fn ids(&self, all: bool, scope: &Scope) -> Result<Vec<String>> {
        Ok(self
            .list(all, scope)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect())
    }
}
