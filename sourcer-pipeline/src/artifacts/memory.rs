//! In-process artifact store for tests and dry runs

use super::{ArtifactStore, DatasetVersion, ModelRegistration, RegisteredModel};
use crate::error::{PipelineError, PipelineResult};
use crate::table::Table;
use async_trait::async_trait;
use sourcer_common::time::now_db_text;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    datasets: HashMap<String, Vec<DatasetVersion>>,
    blobs: HashMap<String, Vec<u8>>,
    models: HashMap<String, Vec<(RegisteredModel, Vec<u8>)>>,
    writes: usize,
}

/// Keeps every artifact in memory and counts writes
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    inner: Mutex<Inner>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of dataset, blob and model writes so far
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn pick<'a, T>(versions: Option<&'a Vec<T>>, name: &str, version: Option<u32>) -> PipelineResult<&'a T> {
    let versions = versions
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PipelineError::Artifact(format!("No version of '{}' registered", name)))?;
    let found = match version {
        None => versions.last(),
        Some(v) => v.checked_sub(1).and_then(|i| versions.get(i as usize)),
    };
    found.ok_or_else(|| PipelineError::Artifact(format!("'{}' has no version {:?}", name, version)))
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn register_dataset(&self, name: &str, table: &Table, description: &str) -> PipelineResult<u32> {
        let mut inner = self.lock();
        inner.writes += 1;
        let versions = inner.datasets.entry(name.to_string()).or_default();
        let version = versions.len() as u32 + 1;
        versions.push(DatasetVersion {
            version,
            description: description.to_string(),
            registered_at: now_db_text(),
            table: table.clone(),
        });
        Ok(version)
    }

    async fn load_dataset(&self, name: &str, version: Option<u32>) -> PipelineResult<DatasetVersion> {
        let inner = self.lock();
        pick(inner.datasets.get(name), name, version).cloned()
    }

    async fn latest_dataset_version(&self, name: &str) -> PipelineResult<Option<u32>> {
        Ok(self
            .lock()
            .datasets
            .get(name)
            .and_then(|v| v.last())
            .map(|d| d.version))
    }

    async fn put_blob(&self, name: &str, bytes: &[u8]) -> PipelineResult<()> {
        let mut inner = self.lock();
        inner.writes += 1;
        inner.blobs.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get_blob(&self, name: &str) -> PipelineResult<Vec<u8>> {
        self.lock()
            .blobs
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::Artifact(format!("Blob '{}' not found", name)))
    }

    async fn register_model(&self, registration: ModelRegistration, bytes: &[u8]) -> PipelineResult<RegisteredModel> {
        let mut inner = self.lock();
        inner.writes += 1;
        let versions = inner.models.entry(registration.name.clone()).or_default();
        let registered = RegisteredModel {
            version: versions.len() as u32 + 1,
            registered_at: now_db_text(),
            registration,
        };
        versions.push((registered.clone(), bytes.to_vec()));
        Ok(registered)
    }

    async fn model_info(&self, name: &str, version: Option<u32>) -> PipelineResult<RegisteredModel> {
        let inner = self.lock();
        pick(inner.models.get(name), name, version).map(|(info, _)| info.clone())
    }

    async fn load_model(&self, name: &str, version: Option<u32>) -> PipelineResult<Vec<u8>> {
        let inner = self.lock();
        pick(inner.models.get(name), name, version).map(|(_, bytes)| bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_versions_and_write_count() {
        let store = MemoryArtifactStore::new();
        let table = Table::new(["id"]);

        store.register_dataset("d", &table, "").await.unwrap();
        store.register_dataset("d", &table, "").await.unwrap();
        store.put_blob("b", b"x").await.unwrap();

        assert_eq!(store.latest_dataset_version("d").await.unwrap(), Some(2));
        assert_eq!(store.load_dataset("d", Some(1)).await.unwrap().version, 1);
        assert!(store.load_dataset("d", Some(0)).await.is_err());
        assert!(store.load_dataset("d", Some(3)).await.is_err());
        assert_eq!(store.write_count(), 3);
    }

    #[tokio::test]
    async fn test_models_latest_by_default() {
        let store = MemoryArtifactStore::new();
        let registration = ModelRegistration { name: "m".into(), ..Default::default() };
        store.register_model(registration.clone(), b"1").await.unwrap();
        store.register_model(registration, b"2").await.unwrap();

        assert_eq!(store.load_model("m", None).await.unwrap(), b"2");
        assert_eq!(store.model_info("m", Some(1)).await.unwrap().version, 1);
        assert!(store.load_model("other", None).await.is_err());
    }
}
