//! Artifact store shared by the stages
//!
//! Datasets and models are append-only: every registration creates the next
//! version, starting at 1. Blobs are single values, last writer wins.

pub mod local;
pub mod memory;

pub use local::LocalArtifactStore;
pub use memory::MemoryArtifactStore;

use crate::error::PipelineResult;
use crate::table::Table;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-plant artifact names
pub mod names {
    pub fn preprocessed_data(plant: &str) -> String {
        format!("{}_preprocessed_data", plant)
    }

    pub fn training_data(plant: &str) -> String {
        format!("{}_training_data", plant)
    }

    pub fn inference_data(plant: &str) -> String {
        format!("{}_inference_data", plant)
    }

    pub fn result(plant: &str) -> String {
        format!("{}_result", plant)
    }

    pub fn encoding_mappings(plant: &str) -> String {
        format!("{}_encoding_mappings", plant)
    }

    pub fn training_report(plant: &str) -> String {
        format!("{}_training_report", plant)
    }
}

/// Metadata attached to a model when it is registered
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRegistration {
    pub name: String,
    pub description: String,
    /// Lineage tags (`pipeline_id`, `series_id`, `dataset`)
    pub tags: BTreeMap<String, String>,
    pub properties: BTreeMap<String, String>,
    /// Hex SHA-256 of the model file
    pub sha256: String,
}

/// A stored model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub version: u32,
    pub registered_at: String,
    pub registration: ModelRegistration,
}

/// A stored dataset version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetVersion {
    pub version: u32,
    pub description: String,
    pub registered_at: String,
    pub table: Table,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store a table as the next version of `name`, returning that version
    async fn register_dataset(&self, name: &str, table: &Table, description: &str) -> PipelineResult<u32>;

    /// Load a version of `name`; `None` loads the latest
    async fn load_dataset(&self, name: &str, version: Option<u32>) -> PipelineResult<DatasetVersion>;

    async fn latest_dataset_version(&self, name: &str) -> PipelineResult<Option<u32>>;

    async fn put_blob(&self, name: &str, bytes: &[u8]) -> PipelineResult<()>;

    async fn get_blob(&self, name: &str) -> PipelineResult<Vec<u8>>;

    /// Store model bytes as the next version of `registration.name`
    async fn register_model(&self, registration: ModelRegistration, bytes: &[u8]) -> PipelineResult<RegisteredModel>;

    /// Metadata of a model version; `None` reads the latest
    async fn model_info(&self, name: &str, version: Option<u32>) -> PipelineResult<RegisteredModel>;

    /// Bytes of a model version; `None` loads the latest
    async fn load_model(&self, name: &str, version: Option<u32>) -> PipelineResult<Vec<u8>>;
}
