//! Model registrar (`register-model`)
//!
//! Registers both trained model files as new versions, tagged with the run,
//! the work item and the training dataset version they came from.

use super::train::TrainingReport;
use super::{Stage, StageContext, StageOutcome};
use crate::artifacts::{names, ModelRegistration};
use crate::error::{PipelineError, PipelineResult};
use crate::features::FeatureGroup;
use crate::status::AiProcess;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

pub async fn run(ctx: &StageContext, model_dir: &Path) -> PipelineResult<StageOutcome> {
    let Some(id) = ctx.claimed_id(Stage::RegisterModel)? else {
        return Ok(StageOutcome::Skipped);
    };

    let status = ctx.gateway.current_status(id).await?;
    if status.as_deref() != Some(AiProcess::TrainingModelDone.as_db_text().as_str()) {
        info!(series_id = id, status = ?status, "No freshly trained models, skipping registration");
        return Ok(StageOutcome::Gated { status });
    }

    let report = TrainingReport::from_json_bytes(
        &ctx.store.get_blob(&names::training_report(&ctx.plant)).await?,
    )?;
    if report.series_id != id {
        return Err(PipelineError::Artifact(format!(
            "training report belongs to series {}, expected {}",
            report.series_id, id
        )));
    }

    let registry = &ctx.config.registry;
    for group in FeatureGroup::ALL {
        let name = group.model_name(&ctx.plant);
        let path = model_dir.join(&name);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            PipelineError::Artifact(format!("Read model file {} failed: {}", path.display(), e))
        })?;

        let accuracy = report.models.get(&name).and_then(|s| s.validation_accuracy);
        match accuracy {
            Some(a) if a < registry.accuracy_bottomline => warn!(
                model = %name,
                validation_accuracy = a,
                bottomline = registry.accuracy_bottomline,
                "Validation accuracy below bottom line"
            ),
            None => warn!(model = %name, "No validation rows, accuracy unknown"),
            _ => {}
        }

        let tags = BTreeMap::from([
            ("pipeline_id".to_string(), ctx.run_id.clone()),
            ("series_id".to_string(), id.to_string()),
            (
                "dataset".to_string(),
                format!("{}: {}", report.dataset, report.dataset_version),
            ),
        ]);
        let properties = BTreeMap::from([
            ("accuracy_bottomline".to_string(), registry.accuracy_bottomline.to_string()),
            ("accuracy_target".to_string(), registry.accuracy_target.to_string()),
            (
                "validation_accuracy".to_string(),
                accuracy.map_or_else(|| "n/a".to_string(), |a| format!("{:.4}", a)),
            ),
        ]);

        let registration = ModelRegistration {
            name: name.clone(),
            description: format!(
                "Sourcer-code classifier {} for plant {}",
                group.describe(),
                ctx.plant
            ),
            tags,
            properties,
            sha256: sha256_hex(&bytes),
        };
        let registered = ctx.store.register_model(registration, &bytes).await?;
        info!(series_id = id, model = %name, version = registered.version, "Model registered");
    }

    Ok(StageOutcome::Completed)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
