//! Database models

use serde::{Deserialize, Serialize};

/// One row of `analysis_console`
///
/// Dates are kept as the ISO text the upstream ETL wrote, so the
/// `(plant, mrp_run_date, batch_id, post_datetime)` key compares exactly
/// against `mrp_sourcer_code_analysis`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkItem {
    pub id: i64,
    pub plant: String,
    pub mrp_run_date: String,
    pub batch_id: String,
    pub post_datetime: String,
    pub total_record: i64,
    pub data_ready: String,
    pub ai_process: Option<String>,
    pub ai_process_start_datetime: Option<String>,
    pub ai_process_end_datetime: Option<String>,
}

/// One entry of `ai_process_history`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusChange {
    pub work_item_id: i64,
    pub status: String,
    pub changed_at: String,
}
