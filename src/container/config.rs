//! Container configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Network protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Host port binding, parsed from `[ip:][hostPort:]containerPort[/proto]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub host_ip: Option<String>,
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: Protocol,
}

impl PortBinding {
    /// Parse a port binding spec
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPortBinding {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let (rest, protocol) = match spec.split_once('/') {
            Some((rest, "tcp")) => (rest, Protocol::Tcp),
            Some((rest, "udp")) => (rest, Protocol::Udp),
            Some(_) => return Err(invalid("unsupported protocol")),
            None => (spec, Protocol::Tcp),
        };

        let parts: Vec<&str> = rest.split(':').collect();
        let (host_ip, host_port, container_port) = match parts.as_slice() {
            [container] => (None, None, *container),
            [host, container] => (None, Some(*host), *container),
            [ip, host, container] => (Some(*ip), Some(*host), *container),
            _ => return Err(invalid("too many ':' separators")),
        };

        if container_port.contains('-') || host_port.is_some_and(|p| p.contains('-')) {
            return Err(invalid("port ranges are not supported"));
        }

        let container_port = match container_port.parse::<u16>() {
            Ok(0) | Err(_) => return Err(invalid("invalid container port")),
            Ok(port) => port,
        };

        let host_port = match host_port {
            None | Some("") => None,
            Some(port) => Some(
                port.parse::<u16>()
                    .map_err(|_| invalid("invalid host port"))?,
            ),
        };

        let host_ip = host_ip.filter(|ip| !ip.is_empty()).map(str::to_string);

        Ok(Self {
            host_ip,
            host_port,
            container_port,
            protocol,
        })
    }

    /// Port key used by the Docker API, e.g. `80/tcp`
    pub fn port_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

/// Address a container port is published on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostPort {
    #[serde(default)]
    pub host_ip: String,
    #[serde(default)]
    pub host_port: String,
}

/// Host side configuration of a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostConfig {
    pub privileged: bool,
    pub publish_all_ports: bool,
    /// Host addresses per port key, e.g. `80/tcp`
    pub port_bindings: BTreeMap<String, Vec<HostPort>>,
}

/// Attachment of a container to a network at creation time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointSettings {
    pub network_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkingConfig {
    /// Endpoint settings per network name
    pub endpoints_config: BTreeMap<String, EndpointSettings>,
}

/// Configuration of a container to create
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Container name
    pub name: String,
    /// Hostname
    pub hostname: String,
    /// Image name/tag
    pub image: String,
    /// Environment variables, `KEY=value`
    pub env: Vec<String>,
    /// Exposed port keys
    pub exposed_ports: BTreeSet<String>,
    /// Container labels
    pub labels: BTreeMap<String, String>,
    /// Host configuration
    pub host_config: HostConfig,
    /// Network attachments
    pub networking_config: NetworkingConfig,
}

impl ContainerConfig {
    /// Create a new container configuration
    pub fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            hostname: name.to_string(),
            image: image.to_string(),
            ..Self::default()
        }
    }

    /// Add a label
    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Add environment variable
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push(format!("{}={}", key, value));
        self
    }

    /// Expose a port, e.g. `2375/tcp`
    pub fn expose(mut self, port_key: &str) -> Self {
        self.exposed_ports.insert(port_key.to_string());
        self
    }

    /// Expose a container port and bind it on the host
    pub fn bind(mut self, binding: &PortBinding) -> Self {
        let key = binding.port_key();
        self.exposed_ports.insert(key.clone());
        self.host_config
            .port_bindings
            .entry(key)
            .or_default()
            .push(HostPort {
                host_ip: binding.host_ip.clone().unwrap_or_default(),
                host_port: binding.host_port.map(|p| p.to_string()).unwrap_or_default(),
            });
        self
    }

    /// Set privileged mode
    pub fn privileged(mut self, privileged: bool) -> Self {
        self.host_config.privileged = privileged;
        self
    }

    /// Publish every exposed port on a random host port
    pub fn publish_all_ports(mut self, publish: bool) -> Self {
        self.host_config.publish_all_ports = publish;
        self
    }

    /// Attach to a network
    pub fn network(mut self, name: &str, id: &str) -> Self {
        self.networking_config.endpoints_config.insert(
            name.to_string(),
            EndpointSettings {
                network_id: id.to_string(),
            },
        );
        self
    }

    /// Same configuration under another name
    pub fn renamed(&self, name: &str) -> Self {
        let mut config = self.clone();
        config.name = name.to_string();
        config.hostname = name.to_string();
        config
    }
}
