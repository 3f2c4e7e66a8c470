//! # Sourcer Pipeline
//!
//! Batch classification of MRP records into sourcer codes:
//! - Claims ready work items from `analysis_console`
//! - Splits records into training and inference data
//! - Trains one classifier with and one without component-type features
//! - Registers the models with lineage tags
//! - Predicts the top three sourcer codes per record and publishes them

pub mod artifacts;
pub mod encoding;
pub mod error;
pub mod features;
pub mod gateway;
pub mod handle;
pub mod model;
pub mod pipeline;
pub mod routing;
pub mod sink;
pub mod stages;
pub mod status;
pub mod table;

pub use error::{PipelineError, PipelineResult};
pub use pipeline::Runner;
pub use stages::{Stage, StageContext, StageOutcome};
