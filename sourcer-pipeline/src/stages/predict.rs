//! Predictor (`predict`)
//!
//! Encodes the inference rows with the persisted mapping, routes each row to
//! the classifier matching its known component columns, ranks the three most
//! probable labels and decodes them back to sourcer codes. Branches are
//! concatenated with-components first, then without-components, then partial.
//! Only models registered for the claimed series are used.

use super::{Stage, StageContext, StageOutcome};
use crate::artifacts::names;
use crate::encoding::{EncodedTable, EncodingMappings};
use crate::error::{PipelineError, PipelineResult};
use crate::features::{FeatureGroup, LABEL, PREDICTION_COLUMNS};
use crate::model::{top_k, Classifier};
use crate::routing::RoutingPlan;
use crate::status::AiProcess;
use crate::table::{Cell, Table};
use std::collections::HashMap;
use tracing::{error, info, warn};

pub async fn run<C: Classifier>(ctx: &StageContext) -> PipelineResult<StageOutcome> {
    let Some(id) = ctx.claimed_id(Stage::Predict)? else {
        return Ok(StageOutcome::Skipped);
    };

    if !ctx
        .gateway
        .transition(id, &AiProcess::TrainingModelDone, &AiProcess::PredictingInference)
        .await?
    {
        let status = ctx.gateway.current_status(id).await?;
        info!(series_id = id, status = ?status, "Work item not ready for prediction, skipping");
        return Ok(StageOutcome::Gated { status });
    }

    match predict::<C>(ctx, id).await {
        Ok(()) => {
            ctx.gateway
                .update_status(id, &AiProcess::PredictingInferenceDone)
                .await?;
            info!(series_id = id, "Predicted data have been stored");
            Ok(StageOutcome::Completed)
        }
        Err(e) => {
            error!(series_id = id, plant = %ctx.plant, error = %e, "Predicting inference failed");
            let status = AiProcess::PredictingInferenceFailed(e.to_string());
            if let Err(status_err) = ctx.gateway.update_status(id, &status).await {
                warn!(series_id = id, error = %status_err, "Failure status not recorded");
            }
            Err(e)
        }
    }
}

async fn predict<C: Classifier>(ctx: &StageContext, id: i64) -> PipelineResult<()> {
    let inference = ctx
        .store
        .load_dataset(&names::inference_data(&ctx.plant), None)
        .await?;
    let mappings = EncodingMappings::from_json_bytes(
        &ctx.store.get_blob(&names::encoding_mappings(&ctx.plant)).await?,
    )?;

    info!(series_id = id, rows = inference.table.len(), "Label encoding inference data");
    let encoded = mappings.apply(&inference.table)?;
    let plan = RoutingPlan::build(&encoded)?;
    info!(
        series_id = id,
        with_components = plan.with_components.len(),
        without_components = plan.without_components.len(),
        partial = plan.partial.len(),
        "Inference rows routed"
    );

    let series = id.to_string();
    let mut models: HashMap<FeatureGroup, C> = HashMap::new();
    for (route, _) in plan.branches() {
        let group = route.feature_group();
        if models.contains_key(&group) {
            continue;
        }
        let name = group.model_name(&ctx.plant);
        let info = ctx.store.model_info(&name, None).await?;
        // Model and mapping must come from the same series
        let registered_for = info.registration.tags.get("series_id").map(String::as_str);
        if registered_for != Some(series.as_str()) {
            return Err(PipelineError::Artifact(format!(
                "latest {} (version {}) was registered for series {}, expected {}",
                name,
                info.version,
                registered_for.unwrap_or("none"),
                id
            )));
        }
        info!(series_id = id, model = %name, version = info.version, "Loading model {}", group.describe());
        let bytes = ctx.store.load_model(&name, Some(info.version)).await?;
        models.insert(group, C::from_bytes(&bytes)?);
    }

    let result = assemble(&inference.table, &encoded, &plan, &mappings, &models)?;
    let version = ctx
        .store
        .register_dataset(
            &names::result(&ctx.plant),
            &result,
            &format!("predictions for series {}", id),
        )
        .await?;
    info!(series_id = id, version, rows = result.len(), "Result registered");
    Ok(())
}

/// Original inference rows with decoded top-3 predictions, in branch order
pub fn assemble<C: Classifier>(
    inference: &Table,
    encoded: &EncodedTable,
    plan: &RoutingPlan,
    mappings: &EncodingMappings,
    models: &HashMap<FeatureGroup, C>,
) -> PipelineResult<Table> {
    let mut columns = inference.columns.clone();
    columns.extend(PREDICTION_COLUMNS.iter().map(|c| c.to_string()));
    let mut result = Table {
        columns,
        rows: Vec::with_capacity(plan.total()),
    };

    for (route, rows) in plan.branches() {
        let group = route.feature_group();
        let model = models.get(&group).ok_or_else(|| {
            PipelineError::Artifact(format!("no model loaded for rows {}", group.describe()))
        })?;

        let features = encoded.features(group.columns(), Some(rows))?;
        let probabilities = model.predict_proba(&features)?;

        for (&row, p) in rows.iter().zip(&probabilities) {
            let mut ranked = top_k(p, PREDICTION_COLUMNS.len())
                .into_iter()
                .map(|class| mappings.decode(LABEL, class as i64).map(Some))
                .collect::<PipelineResult<Vec<Cell>>>()?;
            ranked.resize(PREDICTION_COLUMNS.len(), None);

            let mut cells = inference.rows[row].clone();
            cells.extend(ranked);
            result.rows.push(cells);
        }
    }
    Ok(result)
}
