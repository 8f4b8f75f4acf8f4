//! In-memory runtime recording every call, for orchestrator tests

use super::host::DockerHost;
use super::Runtime;
use crate::container::{
    ContainerConfig, ContainerInspect, ContainerStatus, ContainerSummary, HostPort,
    NetworkEndpoint, NetworkSettings,
};
use crate::error::{Result, SindError};
use crate::network::{NetworkConfig, NetworkSummary};
use crate::swarm::node::{MemberSpec, MemberStatus};
use crate::swarm::{JoinTokens, Member, MemberRole, NodeState, SwarmInfo};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub(crate) const MANAGER_TOKEN: &str = "SWMTKN-1-manager";
pub(crate) const WORKER_TOKEN: &str = "SWMTKN-1-worker";

/// Host port the fake publishes every exposed port of a publish-all container on
pub(crate) const PUBLISHED_PORT: u16 = 32768;

/// One recorded runtime call
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    /// Daemon the call was addressed to
    pub host: String,
    pub op: &'static str,
    pub arg: String,
}

#[derive(Debug, Clone)]
struct FakeContainer {
    index: usize,
    config: ContainerConfig,
    running: bool,
}

#[derive(Debug, Clone)]
struct Failure {
    op: &'static str,
    pattern: String,
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<Call>,
    images: HashSet<String>,
    containers: BTreeMap<String, FakeContainer>,
    networks: BTreeMap<String, NetworkConfig>,
    next_index: usize,
    failures: Vec<Failure>,
    ping_failures: usize,
    ready_after: usize,
    never_ready: bool,
    node_listings: usize,
    created: Vec<ContainerConfig>,
    swarm: Option<SwarmInfo>,
    members: Vec<Member>,
    archives: Vec<(String, Vec<String>)>,
}

/// Runtime backed by shared in-memory state
///
/// Clients obtained through [`Runtime::connect`] share the state, so calls
/// made against a node daemon show up in the same call log.
#[derive(Clone)]
pub(crate) struct FakeRuntime {
    host: DockerHost,
    state: Arc<Mutex<FakeState>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            host: DockerHost::Unix("/var/run/docker.sock".into()),
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    pub fn with_image(self, reference: &str) -> Self {
        self.state.lock().unwrap().images.insert(reference.to_string());
        self
    }

    /// Fail every `op` call whose argument contains `pattern`
    pub fn fail(self, op: &'static str, pattern: &str) -> Self {
        self.state.lock().unwrap().failures.push(Failure {
            op,
            pattern: pattern.to_string(),
        });
        self
    }

    /// Fail the first `count` pings
    pub fn ping_failures(self, count: usize) -> Self {
        self.state.lock().unwrap().ping_failures = count;
        self
    }

    /// Report members as down for the first `count` node listings
    pub fn ready_after(self, count: usize) -> Self {
        self.state.lock().unwrap().ready_after = count;
        self
    }

    /// Never report members as ready
    pub fn never_ready(self) -> Self {
        self.state.lock().unwrap().never_ready = true;
        self
    }

    /// Add a container as if created by an earlier run
    pub fn add_container(&self, config: ContainerConfig, running: bool) -> String {
        let mut state = self.state.lock().unwrap();
        let index = state.next_index;
        state.next_index += 1;
        let id = format!("{:064x}", index + 1);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                index,
                config,
                running,
            },
        );
        id
    }

    /// Add a network as if created by an earlier run
    pub fn add_network(&self, config: NetworkConfig) -> String {
        let mut state = self.state.lock().unwrap();
        let id = format!("net{}", state.networks.len());
        state.networks.insert(id.clone(), config);
        id
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Arguments of every call of one kind, in call order
    pub fn calls_to(&self, op: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.op == op)
            .map(|c| c.arg)
            .collect()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls_to(op).len()
    }

    /// Names of the containers that still exist
    pub fn container_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.containers.values().map(|c| c.config.name.clone()).collect()
    }

    /// Configuration of every container created through the runtime, in call order
    pub fn created_containers(&self) -> Vec<ContainerConfig> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn networks(&self) -> Vec<NetworkConfig> {
        self.state.lock().unwrap().networks.values().cloned().collect()
    }

    pub fn network_count(&self) -> usize {
        self.state.lock().unwrap().networks.len()
    }

    /// Entry names of every archive copied so far, per container name
    pub fn archives(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().archives.clone()
    }

    fn record(&self, op: &'static str, arg: impl Into<String>) -> Result<()> {
        let arg = arg.into();
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            host: self.host.to_string(),
            op,
            arg: arg.clone(),
        });

        let injected = state
            .failures
            .iter()
            .any(|f| f.op == op && arg.contains(&f.pattern));
        if injected {
            return Err(SindError::Api {
                status: 500,
                message: format!("injected {} failure", op),
            });
        }
        Ok(())
    }

    fn container_name(&self, id: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .get(id)
            .map(|c| c.config.name.clone())
            .ok_or_else(|| not_found("container", id))
    }
}

fn not_found(kind: &str, id: &str) -> SindError {
    SindError::Api {
        status: 404,
        message: format!("No such {}: {}", kind, id),
    }
}

fn has_label(labels: impl IntoIterator<Item = (String, String)>, filter: &str) -> bool {
    let (key, value) = filter.split_once('=').unwrap_or((filter, ""));
    labels.into_iter().any(|(k, v)| k == key && v == value)
}

#[async_trait]
impl Runtime for FakeRuntime {
    fn host(&self) -> &DockerHost {
        &self.host
    }

    fn connect(&self, host: DockerHost) -> Result<Arc<dyn Runtime>> {
        Ok(Arc::new(FakeRuntime {
            host,
            state: Arc::clone(&self.state),
        }))
    }

    async fn ping(&self) -> Result<()> {
        self.record("ping", "")?;
        let mut state = self.state.lock().unwrap();
        if state.ping_failures > 0 {
            state.ping_failures -= 1;
            return Err(SindError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    async fn image_exists(&self, reference: &str) -> Result<bool> {
        self.record("image_exists", reference)?;
        Ok(self.state.lock().unwrap().images.contains(reference))
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        self.record("pull_image", reference)?;
        self.state.lock().unwrap().images.insert(reference.to_string());
        Ok(())
    }

    async fn save_images(&self, references: &[String], destination: &Path) -> Result<u64> {
        self.record("save_images", references.join(" "))?;
        {
            let state = self.state.lock().unwrap();
            if let Some(missing) = references.iter().find(|r| !state.images.contains(*r)) {
                return Err(not_found("image", missing));
            }
        }
        let content = format!("images: {}", references.join(","));
        tokio::fs::write(destination, &content).await?;
        Ok(content.len() as u64)
    }

    async fn create_network(&self, config: &NetworkConfig) -> Result<String> {
        self.record("create_network", config.name.as_str())?;
        let mut state = self.state.lock().unwrap();
        if state.networks.values().any(|n| n.name == config.name) {
            return Err(SindError::Api {
                status: 409,
                message: format!("network with name {} already exists", config.name),
            });
        }
        let id = format!("net{}", state.networks.len());
        state.networks.insert(id.clone(), config.clone());
        Ok(id)
    }

    async fn list_networks(&self, label: &str) -> Result<Vec<NetworkSummary>> {
        self.record("list_networks", label)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .networks
            .iter()
            .filter(|(_, n)| has_label(n.labels.clone(), label))
            .map(|(id, n)| NetworkSummary {
                id: id.clone(),
                name: n.name.clone(),
                labels: n.labels.clone().into_iter().collect(),
            })
            .collect())
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        self.record("remove_network", id)?;
        let mut state = self.state.lock().unwrap();
        state
            .networks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("network", id))
    }

    async fn create_container(&self, config: &ContainerConfig) -> Result<String> {
        self.record("create_container", config.name.as_str())?;
        if self.container_names().contains(&config.name) {
            return Err(SindError::Api {
                status: 409,
                message: format!("container name {} is already in use", config.name),
            });
        }
        self.state.lock().unwrap().created.push(config.clone());
        Ok(self.add_container(config.clone(), false))
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let name = self.container_name(id)?;
        self.record("start_container", name)?;
        let mut state = self.state.lock().unwrap();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| not_found("container", id))?;
        if container.running {
            return Err(SindError::Api {
                status: 304,
                message: String::new(),
            });
        }
        container.running = true;
        Ok(())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspect> {
        let name = self.container_name(id)?;
        self.record("inspect_container", name.as_str())?;
        let state = self.state.lock().unwrap();
        let container = state
            .containers
            .get(id)
            .ok_or_else(|| not_found("container", id))?;

        let config = &container.config;
        let mut ports = HashMap::new();
        for key in &config.exposed_ports {
            let bound = config.host_config.port_bindings.get(key).cloned();
            let published = match bound {
                Some(bindings) => Some(bindings),
                None if config.host_config.publish_all_ports => Some(vec![HostPort {
                    host_ip: "0.0.0.0".to_string(),
                    host_port: PUBLISHED_PORT.to_string(),
                }]),
                None => None,
            };
            ports.insert(key.clone(), published);
        }

        let networks = config
            .networking_config
            .endpoints_config
            .keys()
            .map(|network| {
                let endpoint = NetworkEndpoint {
                    ip_address: format!("10.0.0.{}", container.index + 2),
                };
                (network.clone(), endpoint)
            })
            .collect();

        Ok(ContainerInspect {
            id: id.to_string(),
            name: format!("/{}", name),
            network_settings: NetworkSettings { ports, networks },
        })
    }

    async fn list_containers(&self, label: &str, all: bool) -> Result<Vec<ContainerSummary>> {
        self.record("list_containers", label)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .iter()
            .filter(|(_, c)| all || c.running)
            .filter(|(_, c)| has_label(c.config.labels.clone(), label))
            .map(|(id, c)| ContainerSummary {
                id: id.clone(),
                names: vec![format!("/{}", c.config.name)],
                image: c.config.image.clone(),
                state: if c.running {
                    ContainerStatus::Running
                } else {
                    ContainerStatus::Exited
                },
                status: String::new(),
                labels: c.config.labels.clone().into_iter().collect(),
            })
            .collect())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        let name = self.container_name(id)?;
        self.record("stop_container", name)?;
        let mut state = self.state.lock().unwrap();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| not_found("container", id))?;
        if !container.running {
            return Err(SindError::Api {
                status: 304,
                message: String::new(),
            });
        }
        container.running = false;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let name = self.container_name(id)?;
        self.record("remove_container", name)?;
        self.state.lock().unwrap().containers.remove(id);
        Ok(())
    }

    async fn exec(&self, id: &str, cmd: &[String]) -> Result<String> {
        let name = self.container_name(id)?;
        let command = cmd.join(" ");
        self.record("exec", format!("{}: {}", name, command))?;

        if command.starts_with("docker swarm join") {
            let role = if command.contains(MANAGER_TOKEN) {
                MemberRole::Manager
            } else if command.contains(WORKER_TOKEN) {
                MemberRole::Worker
            } else {
                return Err(SindError::Exec {
                    command,
                    exit_code: 1,
                    output: "invalid join token".to_string(),
                });
            };
            self.state.lock().unwrap().members.push(member(&name, role));
            return Ok(format!("This node joined a swarm as a {:?}.", role).to_lowercase());
        }

        Ok(String::new())
    }

    async fn copy_to_container(&self, id: &str, destination: &str, archive: &Path) -> Result<()> {
        let name = self.container_name(id)?;
        self.record("copy_to_container", format!("{}:{}", name, destination))?;

        let file = std::fs::File::open(archive)?;
        let mut entries = Vec::new();
        for entry in tar::Archive::new(file).entries()? {
            let entry = entry?;
            entries.push(entry.path()?.to_string_lossy().to_string());
        }
        self.state.lock().unwrap().archives.push((name, entries));
        Ok(())
    }

    async fn init_swarm(&self, listen_addr: &str) -> Result<String> {
        self.record("init_swarm", listen_addr)?;
        let mut state = self.state.lock().unwrap();
        if state.swarm.is_some() {
            return Err(SindError::Api {
                status: 503,
                message: "This node is already part of a swarm.".to_string(),
            });
        }
        state.swarm = Some(SwarmInfo {
            id: "swarm0".to_string(),
            join_tokens: JoinTokens {
                worker: WORKER_TOKEN.to_string(),
                manager: MANAGER_TOKEN.to_string(),
            },
        });
        state.members.push(member("primary", MemberRole::Manager));
        Ok("node0".to_string())
    }

    async fn inspect_swarm(&self) -> Result<SwarmInfo> {
        self.record("inspect_swarm", "")?;
        self.state
            .lock()
            .unwrap()
            .swarm
            .clone()
            .ok_or_else(|| SindError::Api {
                status: 503,
                message: "This node is not a swarm manager.".to_string(),
            })
    }

    async fn list_nodes(&self) -> Result<Vec<Member>> {
        self.record("list_nodes", "")?;
        let mut state = self.state.lock().unwrap();
        state.node_listings += 1;
        let ready = !state.never_ready && state.node_listings > state.ready_after;

        Ok(state
            .members
            .iter()
            .cloned()
            .map(|mut m| {
                if !ready {
                    m.status.state = NodeState::Down;
                }
                m
            })
            .collect())
    }
}

fn member(name: &str, role: MemberRole) -> Member {
    Member {
        id: name.to_string(),
        spec: MemberSpec { role },
        status: MemberStatus { state: NodeState::Ready },
    }
}
