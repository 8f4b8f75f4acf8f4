//! Docker Engine API client
//!
//! Drives a daemon through bollard, over a unix socket or TCP depending on
//! the [`DockerHost`], with every request pinned to API version 1.39.

use super::host::DockerHost;
use super::Runtime;
use crate::container::{ContainerConfig, ContainerInspect, ContainerSummary};
use crate::error::{Result, SindError};
use crate::network::{NetworkConfig, NetworkSummary};
use crate::swarm::{Member, SwarmInfo};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    NetworkingConfig, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
    UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{EndpointSettings, HostConfig, Ipam, IpamConfig, PortBinding};
use bollard::network::{CreateNetworkOptions, ListNetworksOptions};
use bollard::node::ListNodesOptions;
use bollard::swarm::InitSwarmOptions;
use bollard::{ClientVersion, Docker};
use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Engine API version every request is pinned to
pub const API_VERSION: ClientVersion = ClientVersion {
    major_version: 1,
    minor_version: 39,
};

/// Seconds a single request may take before bollard gives up on it
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Interval between two inspections of an exec that is still running
const EXEC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Docker daemon client
#[derive(Debug, Clone)]
pub struct DockerClient {
    host: DockerHost,
    docker: Docker,
}

#[derive(Debug, Deserialize)]
struct Created {
    #[serde(rename = "Id")]
    id: String,
}

/// Exec inspection, reduced to what tells whether it finished and how
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExecStatus {
    #[serde(default)]
    running: bool,
    #[serde(default)]
    exit_code: Option<i64>,
}

impl DockerClient {
    pub fn new(host: DockerHost) -> Result<Self> {
        let docker = match &host {
            DockerHost::Unix(path) => Docker::connect_with_unix(
                &path.to_string_lossy(),
                REQUEST_TIMEOUT_SECS,
                &API_VERSION,
            ),
            DockerHost::Tcp { .. } => {
                Docker::connect_with_http(&host.to_string(), REQUEST_TIMEOUT_SECS, &API_VERSION)
            }
        }?;
        Ok(Self { host, docker })
    }

    /// Client for the daemon named by `DOCKER_HOST`
    pub fn from_env() -> Result<Self> {
        Self::new(DockerHost::from_env()?)
    }

    async fn exec_status(&self, exec_id: &str) -> Result<ExecStatus> {
        from_model(self.docker.inspect_exec(exec_id).await?)
    }
}

/// Read a bollard model back as one of our API types
///
/// Both sides name their fields after the Engine API, so they share a JSON shape.
fn from_model<M: Serialize, T: DeserializeOwned>(model: M) -> Result<T> {
    Ok(serde_json::from_value(serde_json::to_value(model)?)?)
}

/// `filters` selecting on a single `key=value` label
fn label_filter(label: &str) -> HashMap<&str, Vec<&str>> {
    HashMap::from([("label", vec![label])])
}

/// Create body of a node container
fn container_body(config: &ContainerConfig) -> Config<String> {
    let port_bindings = config
        .host_config
        .port_bindings
        .iter()
        .map(|(key, hosts)| {
            let bindings = hosts
                .iter()
                .map(|host| PortBinding {
                    host_ip: Some(host.host_ip.clone()),
                    host_port: Some(host.host_port.clone()),
                })
                .collect();
            (key.clone(), Some(bindings))
        })
        .collect();

    let endpoints_config = config
        .networking_config
        .endpoints_config
        .iter()
        .map(|(network, endpoint)| {
            let settings = EndpointSettings {
                network_id: Some(endpoint.network_id.clone()),
                ..Default::default()
            };
            (network.clone(), settings)
        })
        .collect();

    Config {
        hostname: Some(config.hostname.clone()),
        image: Some(config.image.clone()),
        env: Some(config.env.clone()),
        exposed_ports: Some(
            config
                .exposed_ports
                .iter()
                .map(|port| (port.clone(), HashMap::new()))
                .collect(),
        ),
        labels: Some(config.labels.clone().into_iter().collect()),
        host_config: Some(HostConfig {
            privileged: Some(config.host_config.privileged),
            publish_all_ports: Some(config.host_config.publish_all_ports),
            port_bindings: Some(port_bindings),
            ..Default::default()
        }),
        networking_config: Some(NetworkingConfig { endpoints_config }),
        ..Default::default()
    }
}

/// Create options of the cluster network
fn network_options(config: &NetworkConfig) -> CreateNetworkOptions<&str> {
    let pools = config.ipam.as_ref().map(|ipam| {
        ipam.config
            .iter()
            .map(|pool| IpamConfig {
                subnet: Some(pool.subnet.clone()),
                ..Default::default()
            })
            .collect()
    });

    CreateNetworkOptions {
        name: config.name.as_str(),
        check_duplicate: config.check_duplicate,
        driver: config.driver.as_str(),
        labels: config
            .labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect(),
        ipam: Ipam {
            config: pools,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Inspect an exec until it stops running, returning its exit code
///
/// The attach stream of an exec can close before the daemon records the
/// exit code, so a running exec is inspected again after an interval.
async fn wait_exec<F, Fut>(mut inspect: F) -> Result<i64>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ExecStatus>>,
{
    loop {
        match inspect().await? {
            ExecStatus {
                running: false,
                exit_code: Some(code),
            } => return Ok(code),
            ExecStatus {
                running: false,
                exit_code: None,
            } => {
                return Err(SindError::Stream(
                    "exec stopped without an exit code".to_string(),
                ))
            }
            ExecStatus { running: true, .. } => tokio::time::sleep(EXEC_POLL_INTERVAL).await,
        }
    }
}

#[async_trait]
impl Runtime for DockerClient {
    fn host(&self) -> &DockerHost {
        &self.host
    }

    fn connect(&self, host: DockerHost) -> Result<Arc<dyn Runtime>> {
        Ok(Arc::new(DockerClient::new(host)?))
    }

    async fn ping(&self) -> Result<()> {
        self.docker.ping().await?;
        Ok(())
    }

    async fn image_exists(&self, reference: &str) -> Result<bool> {
        match self.docker.inspect_image(reference).await {
            Ok(_) => Ok(true),
            Err(e) => match SindError::from(e) {
                e if e.is_not_found() => Ok(false),
                e => Err(e),
            },
        }
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        let options = CreateImageOptions {
            from_image: reference,
            ..Default::default()
        };
        let mut progress = Box::pin(self.docker.create_image(Some(options), None, None));

        while let Some(info) = progress.try_next().await? {
            if let Some(error) = info.error {
                return Err(SindError::Stream(error));
            }
            if let Some(status) = info.status {
                debug!("pull {}: {}", reference, status);
            }
        }
        Ok(())
    }

    async fn save_images(&self, references: &[String], destination: &Path) -> Result<u64> {
        let names: Vec<&str> = references.iter().map(String::as_str).collect();
        let mut chunks = Box::pin(self.docker.export_images(&names));

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        while let Some(chunk) = chunks.try_next().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    async fn create_network(&self, config: &NetworkConfig) -> Result<String> {
        let created: Created = from_model(self.docker.create_network(network_options(config)).await?)?;
        Ok(created.id)
    }

    async fn list_networks(&self, label: &str) -> Result<Vec<NetworkSummary>> {
        let options = ListNetworksOptions {
            filters: label_filter(label),
        };
        from_model(self.docker.list_networks(Some(options)).await?)
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        self.docker.remove_network(id).await?;
        Ok(())
    }

    async fn create_container(&self, config: &ContainerConfig) -> Result<String> {
        let options = CreateContainerOptions {
            name: config.name.as_str(),
            ..Default::default()
        };
        let created = self
            .docker
            .create_container(Some(options), container_body(config))
            .await?;
        Ok(created.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspect> {
        from_model(
            self.docker
                .inspect_container(id, None::<InspectContainerOptions>)
                .await?,
        )
    }

    async fn list_containers(&self, label: &str, all: bool) -> Result<Vec<ContainerSummary>> {
        let options = ListContainersOptions {
            all,
            filters: label_filter(label),
            ..Default::default()
        };
        from_model(self.docker.list_containers(Some(options)).await?)
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        self.docker
            .stop_container(id, None::<StopContainerOptions>)
            .await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        self.docker.remove_container(id, Some(options)).await?;
        Ok(())
    }

    async fn exec(&self, id: &str, cmd: &[String]) -> Result<String> {
        let options = CreateExecOptions {
            cmd: Some(cmd.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };
        let exec = self.docker.create_exec(id, options).await?;
        debug!("exec {} in {}: {}", exec.id, id, cmd.join(" "));

        let mut output = String::new();
        if let StartExecResults::Attached { output: mut stream, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = stream.try_next().await? {
                output.push_str(&chunk.to_string());
            }
        }

        let exec_id = exec.id.as_str();
        let exit_code = wait_exec(move || self.exec_status(exec_id)).await?;
        if exit_code != 0 {
            return Err(SindError::Exec {
                command: cmd.join(" "),
                exit_code,
                output,
            });
        }

        Ok(output)
    }

    async fn copy_to_container(&self, id: &str, destination: &str, archive: &Path) -> Result<()> {
        let options = UploadToContainerOptions {
            path: destination,
            ..Default::default()
        };
        let archive = tokio::fs::read(archive).await?;
        self.docker
            .upload_to_container(id, Some(options), bollard::body_full(archive.into()))
            .await?;
        Ok(())
    }

    async fn init_swarm(&self, listen_addr: &str) -> Result<String> {
        let options = InitSwarmOptions {
            listen_addr: listen_addr.to_string(),
            ..Default::default()
        };
        Ok(self.docker.init_swarm(options).await?)
    }

    async fn inspect_swarm(&self) -> Result<SwarmInfo> {
        from_model(self.docker.inspect_swarm().await?)
    }

    async fn list_nodes(&self) -> Result<Vec<Member>> {
        from_model(
            self.docker
                .list_nodes(None::<ListNodesOptions<String>>)
                .await?,
        )
    }
}
