//! Result publisher (`upload-db`)

use super::{Stage, StageContext, StageOutcome};
use crate::artifacts::names;
use crate::error::PipelineResult;
use crate::sink::ResultSink;
use crate::status::AiProcess;
use tracing::{error, info, warn};

/// Hand the latest result to `sink`, then close the work item with `Y`
///
/// A sink failure is recorded as `Upload to DB failed: <error>` so the item
/// never sits at `Predicting inference done` after a failed publish.
pub async fn run(ctx: &StageContext, sink: &dyn ResultSink) -> PipelineResult<StageOutcome> {
    let Some(id) = ctx.claimed_id(Stage::UploadDb)? else {
        return Ok(StageOutcome::Skipped);
    };

    let status = ctx.gateway.current_status(id).await?;
    if status.as_deref() != Some(AiProcess::PredictingInferenceDone.as_db_text().as_str()) {
        info!(series_id = id, status = ?status, "No prediction result to publish, skipping");
        return Ok(StageOutcome::Gated { status });
    }

    info!(series_id = id, "Reading predicting result");
    let published = async {
        let result = ctx.store.load_dataset(&names::result(&ctx.plant), None).await?;
        sink.publish(id, &result.table).await
    }
    .await;

    match published {
        Ok(rows) => {
            ctx.gateway.mark_completed(id).await?;
            info!(series_id = id, rows, "Work item completed");
            Ok(StageOutcome::Completed)
        }
        Err(e) => {
            error!(series_id = id, plant = %ctx.plant, error = %e, "Upload to DB failed");
            if let Err(status_err) = ctx
                .gateway
                .update_status(id, &AiProcess::UploadFailed(e.to_string()))
                .await
            {
                warn!(series_id = id, error = %status_err, "Failure status not recorded");
            }
            Err(e)
        }
    }
}
