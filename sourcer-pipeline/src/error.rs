//! Error types for sourcer-pipeline

use thiserror::Error;

/// Stage-level error type
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Series-handle file missing or unreadable
    #[error("Series handle error: {0}")]
    HandleFile(String),

    /// Artifact store lookup or write failed
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// A predicted class index has no entry in the label mapping
    #[error("Predicted rank {rank} has no inverse in the '{column}' mapping")]
    UnknownRank { column: String, rank: i64 },

    /// Column required by a stage is absent from a table
    #[error("Column '{0}' not found")]
    MissingColumn(String),

    /// Model fitting or evaluation failed
    #[error("Training error: {0}")]
    Training(String),

    /// Downstream result write failed
    #[error("Publish error: {0}")]
    Publish(String),

    /// sourcer-common error (database, IO, serialization, config)
    #[error(transparent)]
    Common(#[from] sourcer_common::Error),
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::Common(sourcer_common::Error::Database(err))
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Common(sourcer_common::Error::Io(err))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Common(sourcer_common::Error::Serialization(err))
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
