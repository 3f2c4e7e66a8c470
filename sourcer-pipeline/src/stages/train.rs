//! Model trainer (`train`)
//!
//! Encodes the latest training dataset, fits one classifier per feature
//! group on an identical train/validation split, writes both model files and
//! persists the encoding mapping and a training report. Failures propagate
//! and leave the work item at `Training model`.

use super::{Stage, StageContext, StageOutcome};
use crate::artifacts::names;
use crate::encoding::{frequency_encode, EncodingMappings};
use crate::error::PipelineResult;
use crate::features::{FeatureGroup, ENCODED_COLUMNS, LABEL};
use crate::model::split::train_validation_split;
use crate::model::{Classifier, FitSummary, ModelFitter, TrainingData};
use crate::status::AiProcess;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Stored as the `{plant}_training_report` blob, read by the registrar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub series_id: i64,
    pub dataset: String,
    pub dataset_version: u32,
    /// Fit summary per model name
    pub models: BTreeMap<String, FitSummary>,
}

impl TrainingReport {
    pub fn to_json_bytes(&self) -> PipelineResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> PipelineResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

pub async fn run<F: ModelFitter>(ctx: &StageContext, fitter: &F, model_dir: &Path) -> PipelineResult<StageOutcome> {
    let Some(id) = ctx.claimed_id(Stage::Train)? else {
        return Ok(StageOutcome::Skipped);
    };

    if !ctx
        .gateway
        .transition(id, &AiProcess::PreparingDataDone, &AiProcess::TrainingModel)
        .await?
    {
        let status = ctx.gateway.current_status(id).await?;
        info!(series_id = id, status = ?status, "Work item not ready for training, skipping");
        return Ok(StageOutcome::Gated { status });
    }

    let dataset_name = names::training_data(&ctx.plant);
    let dataset = ctx.store.load_dataset(&dataset_name, None).await?;
    info!(
        series_id = id,
        dataset = %dataset_name,
        version = dataset.version,
        rows = dataset.table.len(),
        "Start label encoding"
    );

    let (encoded, mappings) = frequency_encode(&dataset.table, &ENCODED_COLUMNS)?;
    let labels = encoded.column(LABEL)?;
    let n_classes = mappings.get(LABEL)?.len();

    let training = &ctx.config.training;
    let (train_rows, validation_rows) =
        train_validation_split(encoded.len(), training.validation_fraction, training.split_seed);

    tokio::fs::create_dir_all(model_dir).await?;

    let mut models = BTreeMap::new();
    for group in FeatureGroup::ALL {
        let data = TrainingData {
            columns: group.columns().iter().map(|c| c.to_string()).collect(),
            cardinalities: cardinalities(&mappings, group)?,
            n_classes,
            rows: encoded.features(group.columns(), None)?,
            labels: labels.clone(),
        };

        info!(series_id = id, group = group.describe(), "Training model");
        let outcome = fitter.fit(&data.subset(&train_rows), &data.subset(&validation_rows))?;
        info!(
            series_id = id,
            group = group.describe(),
            params = %outcome.summary.selected_params,
            validation_accuracy = ?outcome.validation_accuracy,
            "Model trained"
        );

        let model_name = group.model_name(&ctx.plant);
        tokio::fs::write(model_dir.join(&model_name), outcome.model.to_bytes()?).await?;
        models.insert(model_name, outcome.summary);
    }

    // Canonical mapping for the next prediction run, written only after both fits
    ctx.store
        .put_blob(&names::encoding_mappings(&ctx.plant), &mappings.to_json_bytes()?)
        .await?;

    let report = TrainingReport {
        series_id: id,
        dataset: dataset_name,
        dataset_version: dataset.version,
        models,
    };
    ctx.store
        .put_blob(&names::training_report(&ctx.plant), &report.to_json_bytes()?)
        .await?;

    ctx.gateway
        .update_status(id, &AiProcess::TrainingModelDone)
        .await?;
    info!(series_id = id, "Training model done");
    Ok(StageOutcome::Completed)
}

fn cardinalities(mappings: &EncodingMappings, group: FeatureGroup) -> PipelineResult<Vec<usize>> {
    group
        .columns()
        .iter()
        .map(|c| mappings.get(c).map(|m| m.len()))
        .collect()
}
