//! Docker daemon addresses

use crate::error::{Result, SindError};
use std::path::PathBuf;

/// Default socket of the local Docker daemon
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Port assumed for `tcp://` hosts without one
pub const DEFAULT_TCP_PORT: u16 = 2375;

/// Address of a Docker daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerHost {
    /// Unix socket path
    Unix(PathBuf),
    /// Plain TCP endpoint
    Tcp { host: String, port: u16 },
}

impl DockerHost {
    /// Parse a `DOCKER_HOST`-style address
    pub fn parse(address: &str) -> Result<Self> {
        if let Some(path) = address.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(SindError::InvalidHost(address.to_string()));
            }
            return Ok(DockerHost::Unix(PathBuf::from(path)));
        }

        let authority = address
            .strip_prefix("tcp://")
            .or_else(|| address.strip_prefix("http://"))
            .ok_or_else(|| SindError::InvalidHost(address.to_string()))?
            .trim_end_matches('/');

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| SindError::InvalidHost(address.to_string()))?;
                (host, port)
            }
            None => (authority, DEFAULT_TCP_PORT),
        };

        if host.is_empty() {
            return Err(SindError::InvalidHost(address.to_string()));
        }

        Ok(DockerHost::Tcp {
            host: host.to_string(),
            port,
        })
    }

    /// Address from `DOCKER_HOST`, falling back to the local socket
    pub fn from_env() -> Result<Self> {
        match std::env::var("DOCKER_HOST") {
            Ok(address) if !address.is_empty() => Self::parse(&address),
            _ => Self::parse(DEFAULT_DOCKER_HOST),
        }
    }

    /// Host under which ports published by this daemon are reachable
    pub fn published_host(&self) -> &str {
        match self {
            DockerHost::Unix(_) => "localhost",
            DockerHost::Tcp { host, .. } => host,
        }
    }
}

impl std::fmt::Display for DockerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DockerHost::Unix(path) => write!(f, "unix://{}", path.display()),
            DockerHost::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
        }
    }
}
