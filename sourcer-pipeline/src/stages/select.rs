//! Work-item selector (`read-data`)
//!
//! Claims the most recent ready work item of the plant, writes the series
//! handle, checks the record count and splits the records into training
//! rows (labeled) and inference rows (unlabeled).

use super::{Stage, StageContext, StageOutcome};
use crate::artifacts::names;
use crate::error::PipelineResult;
use crate::features::LABEL;
use crate::handle::SeriesHandle;
use crate::status::AiProcess;
use crate::table::Table;
use sourcer_common::db::WorkItem;
use std::time::Instant;
use tracing::{error, info, warn};

pub async fn run(ctx: &StageContext) -> PipelineResult<StageOutcome> {
    info!(stage = %Stage::ReadData, plant = %ctx.plant, "Checking analysis console for new data");

    let Some(item) = ctx.gateway.claim_ready_item(&ctx.plant).await? else {
        info!(plant = %ctx.plant, "There is no new data");
        SeriesHandle::Sentinel.write(&ctx.series_dir)?;
        return Ok(StageOutcome::NoWork);
    };

    match prepare(ctx, &item).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            error!(series_id = item.id, plant = %ctx.plant, error = %e, "Preparing data failed");
            let status = AiProcess::PreparingDataFailed(e.to_string());
            if let Err(status_err) = ctx.gateway.update_status(item.id, &status).await {
                warn!(series_id = item.id, error = %status_err, "Failure status not recorded");
            }
            Err(e)
        }
    }
}

async fn prepare(ctx: &StageContext, item: &WorkItem) -> PipelineResult<StageOutcome> {
    let started = Instant::now();
    SeriesHandle::Claimed(item.id).write(&ctx.series_dir)?;

    info!(
        series_id = item.id,
        plant = %item.plant,
        mrp_run_date = %item.mrp_run_date,
        batch_id = %item.batch_id,
        post_datetime = %item.post_datetime,
        "Reading source records"
    );
    let records = ctx.gateway.fetch_source_rows(item).await?;

    if records.len() as i64 != item.total_record {
        warn!(
            series_id = item.id,
            expected = item.total_record,
            actual = records.len(),
            "Data lengths are different"
        );
        ctx.gateway
            .update_status(item.id, &AiProcess::DataLengthsDifferent)
            .await?;
        return Ok(StageOutcome::LengthMismatch {
            expected: item.total_record,
            actual: records.len(),
        });
    }

    let preprocessed = preprocess(records)?;
    let (training, inference) = split_by_label(&preprocessed)?;
    info!(
        series_id = item.id,
        training_rows = training.len(),
        inference_rows = inference.len(),
        "Records split"
    );

    let source = format!("series {} ({} {})", item.id, item.plant, item.mrp_run_date);
    let store = &ctx.store;
    store
        .register_dataset(&names::preprocessed_data(&ctx.plant), &preprocessed, &source)
        .await?;
    store
        .register_dataset(&names::training_data(&ctx.plant), &training, &source)
        .await?;
    store
        .register_dataset(&names::inference_data(&ctx.plant), &inference, &source)
        .await?;

    if inference.is_empty() {
        info!(series_id = item.id, "There is no inference data");
        ctx.gateway
            .update_status(item.id, &AiProcess::NoInferenceData)
            .await?;
        return Ok(StageOutcome::NoInferenceData);
    }

    ctx.gateway
        .update_status(item.id, &AiProcess::PreparingDataDone)
        .await?;
    info!(
        series_id = item.id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Preparing data done"
    );
    Ok(StageOutcome::Completed)
}

/// Trim every cell, turn blanks into missing cells and keep only the first
/// of several `;`-separated labels; an empty first label leaves the record
/// unlabeled
pub fn preprocess(mut table: Table) -> PipelineResult<Table> {
    let label = table.column_index(LABEL)?;

    for row in &mut table.rows {
        for cell in row.iter_mut() {
            *cell = cell
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        row[label] = row[label].take().and_then(|v| {
            v.split(';')
                .next()
                .map(str::trim)
                .filter(|first| !first.is_empty())
                .map(str::to_string)
        });
    }
    Ok(table)
}

/// Split into (training, inference) by label presence, both in record order
pub fn split_by_label(table: &Table) -> PipelineResult<(Table, Table)> {
    let label = table.column_index(LABEL)?;
    Ok(table.partition(|row| row[label].is_some()))
}
