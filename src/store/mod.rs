//! Cluster record store
//!
//! Keeps one JSON file per created cluster so that later commands can find
//! the cluster endpoints from its name alone.

use crate::error::{Result, SindError};
use crate::swarm::Cluster;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Environment variable overriding the store location
pub const SIND_HOME_ENV: &str = "SIND_HOME";

/// File-backed cluster store
pub struct ClusterStore {
    /// Root storage path
    root: PathBuf,
}

impl ClusterStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store in `$SIND_HOME`, or `.sind` under the user home directory
    pub fn open_default() -> Result<Self> {
        let root = match std::env::var_os(SIND_HOME_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => dirs::home_dir()
                .ok_or_else(|| SindError::Store("unable to locate home directory".to_string()))?
                .join(".sind"),
        };
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a cluster record, refusing names that would leave the store root
    fn record_path(&self, name: &str) -> Result<PathBuf> {
        let escapes = name.is_empty()
            || name.contains(['/', '\\'])
            || name.contains("..")
            || Path::new(name).is_absolute();
        if escapes {
            return Err(SindError::Store(format!("invalid cluster name {:?}", name)));
        }
        Ok(self.root.join(format!("{}.json", name)))
    }

    /// Fail if a cluster with this name is already stored
    pub async fn exists(&self, name: &str) -> Result<()> {
        if fs::try_exists(self.record_path(name)?).await? {
            return Err(SindError::ClusterExists(name.to_string()));
        }
        Ok(())
    }

    /// Save a cluster record, replacing any previous one
    pub async fn save(&self, cluster: &Cluster) -> Result<()> {
        let path = self.record_path(&cluster.name)?;
        let data = serde_json::to_vec_pretty(cluster)?;
        fs::write(&path, data).await?;
        debug!("Saved cluster {} to {}", cluster.name, path.display());
        Ok(())
    }

    /// Load a cluster record
    pub async fn load(&self, name: &str) -> Result<Cluster> {
        let path = self.record_path(name)?;
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SindError::ClusterNotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&data)
            .map_err(|e| SindError::Store(format!("corrupted record {}: {}", path.display(), e)))
    }

    /// Delete a cluster record; deleting an unknown cluster is a no-op
    pub async fn delete(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.record_path(name)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of every stored cluster, sorted
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
