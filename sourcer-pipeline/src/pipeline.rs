//! Stage runner
//!
//! Executes one stage, or all five in order, and uploads the stage's log
//! lines into `log_message` afterwards.

use crate::error::PipelineResult;
use crate::model::ModelFitter;
use crate::sink::ResultSink;
use crate::stages::{predict, publish, register, select, train, Stage, StageContext, StageOutcome};
use sourcer_common::logging::LogBuffer;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Uploads recent run logs after every stage
#[derive(Clone)]
pub struct LogUpload {
    pub buffer: LogBuffer,
    pub pool: SqlitePool,
    pub plant: String,
    pub window: chrono::Duration,
}

impl LogUpload {
    /// Upload failures are logged, never fatal
    pub async fn after(&self, stage: Stage) {
        match self
            .buffer
            .upload_recent(&self.pool, &self.plant, stage.as_str(), self.window)
            .await
        {
            Ok(Some(row)) => debug!(stage = %stage, log_message_id = row, "Run log uploaded"),
            Ok(None) => {}
            Err(e) => warn!(stage = %stage, error = %e, "Run log upload failed"),
        }
    }
}

pub struct Runner<F: ModelFitter> {
    pub ctx: StageContext,
    pub fitter: F,
    /// Directory the trainer writes model files into
    pub model_dir: PathBuf,
    pub sink: Box<dyn ResultSink>,
    pub log_upload: Option<LogUpload>,
}

impl<F: ModelFitter> Runner<F> {
    pub async fn run_stage(&self, stage: Stage) -> PipelineResult<StageOutcome> {
        let outcome = match stage {
            Stage::ReadData => select::run(&self.ctx).await,
            Stage::Train => train::run(&self.ctx, &self.fitter, &self.model_dir).await,
            Stage::RegisterModel => register::run(&self.ctx, &self.model_dir).await,
            Stage::Predict => predict::run::<F::Model>(&self.ctx).await,
            Stage::UploadDb => publish::run(&self.ctx, self.sink.as_ref()).await,
        };

        match &outcome {
            Ok(o) => info!(stage = %stage, outcome = ?o, "Stage finished"),
            Err(e) => warn!(stage = %stage, error = %e, "Stage failed"),
        }
        if let Some(upload) = &self.log_upload {
            upload.after(stage).await;
        }
        outcome
    }

    /// Run every stage in order; each one gates itself on the handle and status
    pub async fn run_all(&self) -> PipelineResult<Vec<(Stage, StageOutcome)>> {
        let mut outcomes = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            let outcome = self.run_stage(stage).await?;
            outcomes.push((stage, outcome));
        }
        Ok(outcomes)
    }
}
