//! # Sourcer Common Library
//!
//! Shared code for the sourcer-code classification pipeline:
//! - Error type shared by every stage
//! - Configuration loading (TOML file, environment, compiled defaults)
//! - Database schema initialization and control-table row models
//! - Run log capture and upload to the `log_message` table

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod time;

pub use config::{Mode, PipelineConfig};
pub use error::{Error, Result};
