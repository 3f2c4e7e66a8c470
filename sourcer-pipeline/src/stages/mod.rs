//! Pipeline stages
//!
//! Selector → Trainer → Registrar → Predictor → Publisher. Every stage after
//! the Selector reads the series handle first and returns
//! [`StageOutcome::Skipped`] on the sentinel, without touching the database
//! or the artifact store. Stages that find the work item in an unexpected
//! status return [`StageOutcome::Gated`].

pub mod predict;
pub mod publish;
pub mod register;
pub mod select;
pub mod train;

use crate::artifacts::ArtifactStore;
use crate::error::PipelineResult;
use crate::gateway::ControlTable;
use crate::handle::SeriesHandle;
use sourcer_common::PipelineConfig;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Everything a stage needs, passed explicitly
#[derive(Clone)]
pub struct StageContext {
    pub plant: String,
    /// Directory holding `series_id.txt`
    pub series_dir: PathBuf,
    pub gateway: ControlTable,
    pub store: Arc<dyn ArtifactStore>,
    pub config: PipelineConfig,
    /// Orchestration run id, recorded as model lineage
    pub run_id: String,
}

impl StageContext {
    /// Claimed work-item id, or `None` when the Selector found no work
    pub(crate) fn claimed_id(&self, stage: Stage) -> PipelineResult<Option<i64>> {
        let handle = SeriesHandle::read(&self.series_dir)?;
        if handle.is_sentinel() {
            info!(stage = %stage, plant = %self.plant, "No work item for this run, skipping");
        }
        Ok(handle.id())
    }
}

/// Stage names as used in logs and `log_message.source_file`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadData,
    Train,
    RegisterModel,
    Predict,
    UploadDb,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::ReadData,
        Stage::Train,
        Stage::RegisterModel,
        Stage::Predict,
        Stage::UploadDb,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ReadData => "read_data",
            Stage::Train => "train",
            Stage::RegisterModel => "register_model",
            Stage::Predict => "predict",
            Stage::UploadDb => "upload_db",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage ended without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Selector found no ready work item and wrote the sentinel
    NoWork,
    /// Series handle is the sentinel
    Skipped,
    /// Work item was not in the status this stage starts from
    Gated { status: Option<String> },
    /// Source row count differs from `total_record`
    LengthMismatch { expected: i64, actual: usize },
    /// Every source row already has a label
    NoInferenceData,
    Completed,
}

impl StageOutcome {
    /// Later stages have something to do
    pub fn continues(&self) -> bool {
        matches!(self, StageOutcome::Completed)
    }
}
