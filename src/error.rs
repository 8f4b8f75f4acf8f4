//! Error types for sind

use thiserror::Error;

/// Result type for sind operations
pub type Result<T> = std::result::Result<T, SindError>;

/// Reasons a cluster specification is rejected before anything is provisioned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("empty cluster name")]
    EmptyClusterName,

    #[error("empty network name")]
    EmptyNetworkName,

    #[error("invalid manager count, must be >= 1")]
    InvalidManagerCount,

    #[error("invalid worker count, must be >= 0")]
    InvalidWorkerCount,

    #[error("invalid port binding {spec:?}: {reason}")]
    InvalidPortBinding { spec: String, reason: String },
}

/// sind error types
///
/// The phase variants (`Provisioning` through `Lifecycle`) name the step of a
/// top-level operation that failed and carry the underlying cause as their
/// source.
#[derive(Error, Debug)]
pub enum SindError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("{message}")]
    Provisioning {
        message: String,
        #[source]
        source: Box<SindError>,
    },

    #[error("{message}")]
    Connectivity {
        message: String,
        #[source]
        source: Box<SindError>,
    },

    #[error("{message}")]
    Bootstrap {
        message: String,
        #[source]
        source: Box<SindError>,
    },

    #[error("{message}")]
    Join {
        message: String,
        #[source]
        source: Box<SindError>,
    },

    #[error("{message}")]
    ConvergenceTimeout {
        message: String,
        #[source]
        source: Box<SindError>,
    },

    #[error("{message}")]
    Distribution {
        message: String,
        #[source]
        source: Box<SindError>,
    },

    #[error("{message}")]
    Lifecycle {
        message: String,
        #[source]
        source: Box<SindError>,
    },

    #[error("Docker API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Docker stream error: {0}")]
    Stream(String),

    #[error("Invalid Docker host: {0}")]
    InvalidHost(String),

    #[error("command {command:?} exited with code {exit_code}: {output}")]
    Exec {
        command: String,
        exit_code: i64,
        output: String,
    },

    #[error("primary node is not exposing docker daemon port")]
    PrimaryNodeNotBound,

    #[error("no image reference given")]
    NoImageReference,

    #[error("Cluster already exists: {0}")]
    ClusterExists(String),

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("context canceled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SindError {
    pub fn provisioning(message: impl Into<String>, source: SindError) -> Self {
        Self::Provisioning {
            message: message.into(),
            source: Box::new(source),
        }
    }

    pub fn connectivity(message: impl Into<String>, source: SindError) -> Self {
        Self::Connectivity {
            message: message.into(),
            source: Box::new(source),
        }
    }

    pub fn bootstrap(message: impl Into<String>, source: SindError) -> Self {
        Self::Bootstrap {
            message: message.into(),
            source: Box::new(source),
        }
    }

    pub fn join(message: impl Into<String>, source: SindError) -> Self {
        Self::Join {
            message: message.into(),
            source: Box::new(source),
        }
    }

    pub fn convergence(message: impl Into<String>, source: SindError) -> Self {
        Self::ConvergenceTimeout {
            message: message.into(),
            source: Box::new(source),
        }
    }

    pub fn distribution(message: impl Into<String>, source: SindError) -> Self {
        Self::Distribution {
            message: message.into(),
            source: Box::new(source),
        }
    }

    pub fn lifecycle(message: impl Into<String>, source: SindError) -> Self {
        Self::Lifecycle {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Whether the daemon answered with a 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, SindError::Api { status: 404, .. })
    }

    /// Whether the daemon answered with a 304, e.g. stopping a stopped container
    pub fn is_not_modified(&self) -> bool {
        matches!(self, SindError::Api { status: 304, .. })
    }

    /// Walk down phase wrappers to the error that caused them
    pub fn root_cause(&self) -> &SindError {
        match self {
            SindError::Provisioning { source, .. }
            | SindError::Connectivity { source, .. }
            | SindError::Bootstrap { source, .. }
            | SindError::Join { source, .. }
            | SindError::ConvergenceTimeout { source, .. }
            | SindError::Distribution { source, .. }
            | SindError::Lifecycle { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<bollard::errors::Error> for SindError {
    fn from(err: bollard::errors::Error) -> Self {
        use bollard::errors::Error as DockerError;

        match err {
            DockerError::DockerResponseServerError {
                status_code,
                message,
            } => SindError::Api {
                status: status_code,
                message,
            },
            DockerError::DockerStreamError { error } => SindError::Stream(error),
            other => SindError::Transport(other.to_string()),
        }
    }
}
