//! Work-item status state machine
//!
//! The `ai_process` column of `analysis_console` carries one of these values.
//! Success path:
//! Preparing data → Preparing data done → Training model → Training model done
//! → Predicting inference → Predicting inference done → Y
//!
//! Terminal values besides `Y`: `Data lengths are different`,
//! `No inference data` and the `... failed: <error>` family.

use std::fmt;

const PREPARING_DATA_FAILED: &str = "Preparing data failed: ";
const PREDICTING_INFERENCE_FAILED: &str = "Predicting inference failed: ";
const UPLOAD_FAILED: &str = "Upload to DB failed: ";

/// Value of `analysis_console.ai_process`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiProcess {
    /// Claimed by the Selector
    PreparingData,
    /// Source row count differs from `total_record`
    DataLengthsDifferent,
    /// Every source row already carries a label
    NoInferenceData,
    PreparingDataDone,
    TrainingModel,
    TrainingModelDone,
    PredictingInference,
    PredictingInferenceDone,
    /// Published, work item complete
    Completed,
    PreparingDataFailed(String),
    PredictingInferenceFailed(String),
    UploadFailed(String),
}

impl AiProcess {
    /// Text stored in the control table
    pub fn as_db_text(&self) -> String {
        match self {
            AiProcess::PreparingData => "Preparing data".to_string(),
            AiProcess::DataLengthsDifferent => "Data lengths are different".to_string(),
            AiProcess::NoInferenceData => "No inference data".to_string(),
            AiProcess::PreparingDataDone => "Preparing data done".to_string(),
            AiProcess::TrainingModel => "Training model".to_string(),
            AiProcess::TrainingModelDone => "Training model done".to_string(),
            AiProcess::PredictingInference => "Predicting inference".to_string(),
            AiProcess::PredictingInferenceDone => "Predicting inference done".to_string(),
            AiProcess::Completed => "Y".to_string(),
            AiProcess::PreparingDataFailed(e) => format!("{}{}", PREPARING_DATA_FAILED, e),
            AiProcess::PredictingInferenceFailed(e) => format!("{}{}", PREDICTING_INFERENCE_FAILED, e),
            AiProcess::UploadFailed(e) => format!("{}{}", UPLOAD_FAILED, e),
        }
    }

    /// Parse a stored value; unknown text yields `None`
    pub fn parse(text: &str) -> Option<AiProcess> {
        let status = match text {
            "Preparing data" => AiProcess::PreparingData,
            "Data lengths are different" => AiProcess::DataLengthsDifferent,
            "No inference data" => AiProcess::NoInferenceData,
            "Preparing data done" => AiProcess::PreparingDataDone,
            "Training model" => AiProcess::TrainingModel,
            "Training model done" => AiProcess::TrainingModelDone,
            "Predicting inference" => AiProcess::PredictingInference,
            "Predicting inference done" => AiProcess::PredictingInferenceDone,
            "Y" => AiProcess::Completed,
            _ => {
                if let Some(e) = text.strip_prefix(PREPARING_DATA_FAILED) {
                    AiProcess::PreparingDataFailed(e.to_string())
                } else if let Some(e) = text.strip_prefix(PREDICTING_INFERENCE_FAILED) {
                    AiProcess::PredictingInferenceFailed(e.to_string())
                } else if let Some(e) = text.strip_prefix(UPLOAD_FAILED) {
                    AiProcess::UploadFailed(e.to_string())
                } else {
                    return None;
                }
            }
        };
        Some(status)
    }

    /// No stage moves the item any further
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AiProcess::Completed
                | AiProcess::DataLengthsDifferent
                | AiProcess::NoInferenceData
                | AiProcess::PreparingDataFailed(_)
                | AiProcess::PredictingInferenceFailed(_)
                | AiProcess::UploadFailed(_)
        )
    }
}

impl fmt::Display for AiProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_db_text())
    }
}
