//! Distribution of host images to every node of a cluster

use super::fanout::fan_out;
use super::scope::Scope;
use crate::docker::Runtime;
use crate::error::{Result, SindError};
use crate::swarm::node::cluster_label_filter;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::info;

/// Saved images wrapped in a single entry tar archive
///
/// Both temporary files are removed when this is dropped.
struct ImageArchive {
    _images: NamedTempFile,
    archive: NamedTempFile,
    entry: String,
}

impl ImageArchive {
    fn path(&self) -> &Path {
        self.archive.path()
    }

    /// Where the saved images land once extracted in a container
    fn extracted_path(&self) -> String {
        format!("/{}", self.entry)
    }
}

/// Save images on the host daemon and load them in every running node
///
/// Images are loaded only once the archive has been copied everywhere.
pub async fn push_images(
    runtime: &Arc<dyn Runtime>,
    cluster_name: &str,
    images: &[String],
    parallelism: Option<usize>,
    scope: &Scope,
) -> Result<()> {
    if images.is_empty() {
        return Err(SindError::distribution(
            "no image to push",
            SindError::NoImageReference,
        ));
    }

    let archive = prepare_archive(runtime.as_ref(), images, scope)
        .await
        .map_err(|e| SindError::distribution("unable to prepare the archive", e))?;

    let containers = scope
        .run(runtime.list_containers(&cluster_label_filter(cluster_name), false))
        .await
        .map_err(|e| SindError::distribution("unable to get container list", e))?;
    let ids: Vec<String> = containers.into_iter().map(|c| c.id).collect();
    info!(
        "Pushing {} to {} containers of cluster {}",
        images.join(", "),
        ids.len(),
        cluster_name
    );

    let archive_path = archive.path().to_path_buf();
    fan_out(scope, parallelism, ids.clone(), |_, id| {
        let runtime = Arc::clone(runtime);
        let archive_path = archive_path.clone();
        async move { runtime.copy_to_container(&id, "/", &archive_path).await }
    })
    .await
    .map_err(|e| SindError::distribution("unable to deploy the images to the cluster", e))?;

    let load: Vec<String> = ["docker", "load", "-i"]
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(archive.extracted_path()))
        .collect();
    fan_out(scope, parallelism, ids, |_, id| {
        let runtime = Arc::clone(runtime);
        let load = load.clone();
        async move { runtime.exec(&id, &load).await }
    })
    .await
    .map_err(|e| SindError::distribution("unable to load the images in the cluster", e))?;

    info!("Pushed {} to cluster {}", images.join(", "), cluster_name);
    Ok(())
}

async fn prepare_archive(
    runtime: &dyn Runtime,
    images: &[String],
    scope: &Scope,
) -> Result<ImageArchive> {
    let saved = tempfile::Builder::new().prefix("img_sind").tempfile()?;
    let size = scope
        .run(runtime.save_images(images, saved.path()))
        .await?;
    info!("Saved {} bytes of images", size);

    let entry = saved
        .path()
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| SindError::Internal("temporary file without a name".to_string()))?;
    let archive = tempfile::Builder::new().prefix("tar_img_sind").tempfile()?;

    let source = saved.path().to_path_buf();
    let destination = archive.path().to_path_buf();
    let name = entry.clone();
    tokio::task::spawn_blocking(move || write_archive(&source, &name, &destination))
        .await
        .map_err(|e| SindError::Internal(format!("archive task failed: {}", e)))??;

    Ok(ImageArchive {
        _images: saved,
        archive,
        entry,
    })
}

/// Write `source` as the single entry `entry` of a tar archive at `destination`
fn write_archive(source: &Path, entry: &str, destination: &Path) -> Result<()> {
    let mut file = std::fs::File::open(source)?;
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(file.metadata()?.len());
    header.set_mode(0o664);

    let mut builder = tar::Builder::new(std::fs::File::create(destination)?);
    builder.append_data(&mut header, entry, &mut file)?;
    builder.into_inner()?.sync_all()?;
    Ok(())
}
