//! Filesystem artifact store
//!
//! Layout under the configured root:
//! ```text
//! datasets/<name>/v<N>.json    DatasetVersion
//! blobs/<name>                 raw bytes
//! models/<name>/v<N>.bin       model file
//! models/<name>/v<N>.json      RegisteredModel
//! ```

use super::{ArtifactStore, DatasetVersion, ModelRegistration, RegisteredModel};
use crate::error::{PipelineError, PipelineResult};
use crate::table::Table;
use async_trait::async_trait;
use sourcer_common::time::now_db_text;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dataset_dir(&self, name: &str) -> PipelineResult<PathBuf> {
        Ok(self.root.join("datasets").join(checked_name(name)?))
    }

    fn model_dir(&self, name: &str) -> PipelineResult<PathBuf> {
        Ok(self.root.join("models").join(checked_name(name)?))
    }

    fn blob_path(&self, name: &str) -> PipelineResult<PathBuf> {
        Ok(self.root.join("blobs").join(checked_name(name)?))
    }
}

/// Artifact names become path components
fn checked_name(name: &str) -> PipelineResult<&str> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
        return Err(PipelineError::Artifact(format!("Invalid artifact name: {:?}", name)));
    }
    Ok(name)
}

/// Highest `v<N>.json` in a directory
async fn latest_version(dir: &Path) -> PipelineResult<Option<u32>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut latest = None;
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let version = file_name
            .to_str()
            .and_then(|n| n.strip_prefix('v'))
            .and_then(|n| n.strip_suffix(".json"))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(v) = version {
            latest = latest.max(Some(v));
        }
    }
    Ok(latest)
}

async fn resolve_version(dir: &Path, name: &str, version: Option<u32>) -> PipelineResult<u32> {
    match version {
        Some(v) => Ok(v),
        None => latest_version(dir)
            .await?
            .ok_or_else(|| PipelineError::Artifact(format!("No version of '{}' registered", name))),
    }
}

async fn read_existing(path: &Path, what: &str) -> PipelineResult<Vec<u8>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PipelineError::Artifact(format!("{} not found at {}", what, path.display())))
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn register_dataset(&self, name: &str, table: &Table, description: &str) -> PipelineResult<u32> {
        let dir = self.dataset_dir(name)?;
        fs::create_dir_all(&dir).await?;

        let version = latest_version(&dir).await?.unwrap_or(0) + 1;
        let record = DatasetVersion {
            version,
            description: description.to_string(),
            registered_at: now_db_text(),
            table: table.clone(),
        };
        fs::write(dir.join(format!("v{}.json", version)), serde_json::to_vec(&record)?).await?;

        info!(dataset = name, version, rows = table.len(), "Dataset registered");
        Ok(version)
    }

    async fn load_dataset(&self, name: &str, version: Option<u32>) -> PipelineResult<DatasetVersion> {
        let dir = self.dataset_dir(name)?;
        let version = resolve_version(&dir, name, version).await?;
        let bytes = read_existing(&dir.join(format!("v{}.json", version)), name).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn latest_dataset_version(&self, name: &str) -> PipelineResult<Option<u32>> {
        latest_version(&self.dataset_dir(name)?).await
    }

    async fn put_blob(&self, name: &str, bytes: &[u8]) -> PipelineResult<()> {
        let path = self.blob_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        debug!(blob = name, size = bytes.len(), "Blob stored");
        Ok(())
    }

    async fn get_blob(&self, name: &str) -> PipelineResult<Vec<u8>> {
        read_existing(&self.blob_path(name)?, name).await
    }

    async fn register_model(&self, registration: ModelRegistration, bytes: &[u8]) -> PipelineResult<RegisteredModel> {
        let dir = self.model_dir(&registration.name)?;
        fs::create_dir_all(&dir).await?;

        let version = latest_version(&dir).await?.unwrap_or(0) + 1;
        let registered = RegisteredModel {
            version,
            registered_at: now_db_text(),
            registration,
        };
        // Bytes first: a version only counts once its metadata file exists
        fs::write(dir.join(format!("v{}.bin", version)), bytes).await?;
        fs::write(dir.join(format!("v{}.json", version)), serde_json::to_vec_pretty(&registered)?).await?;

        info!(model = %registered.registration.name, version, "Model registered");
        Ok(registered)
    }

    async fn model_info(&self, name: &str, version: Option<u32>) -> PipelineResult<RegisteredModel> {
        let dir = self.model_dir(name)?;
        let version = resolve_version(&dir, name, version).await?;
        let bytes = read_existing(&dir.join(format!("v{}.json", version)), name).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn load_model(&self, name: &str, version: Option<u32>) -> PipelineResult<Vec<u8>> {
        let dir = self.model_dir(name)?;
        let version = resolve_version(&dir, name, version).await?;
        read_existing(&dir.join(format!("v{}.bin", version)), name).await
    }
}
