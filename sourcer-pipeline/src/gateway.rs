//! Control-table gateway
//!
//! Sole reader and writer of `analysis_console` status. Every status write
//! appends a row to `ai_process_history` inside the same transaction, and
//! every operation reports failure to the caller.

use crate::features::RECORD_COLUMNS;
use crate::status::AiProcess;
use crate::table::Table;
use sourcer_common::db::{StatusChange, WorkItem};
use sourcer_common::time::now_db_text;
use sourcer_common::{Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};

/// Columns `update_field` may overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlColumn {
    DataReady,
    StartDatetime,
    EndDatetime,
}

impl ControlColumn {
    fn name(self) -> &'static str {
        match self {
            ControlColumn::DataReady => "data_ready",
            ControlColumn::StartDatetime => "ai_process_start_datetime",
            ControlColumn::EndDatetime => "ai_process_end_datetime",
        }
    }
}

const WORK_ITEM_COLUMNS: &str = "id, plant, mrp_run_date, batch_id, post_datetime, total_record, \
     data_ready, ai_process, ai_process_start_datetime, ai_process_end_datetime";

/// Handle on the control table and the source records it describes
#[derive(Debug, Clone)]
pub struct ControlTable {
    pool: SqlitePool,
}

impl ControlTable {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Most recent ready and unclaimed item of a plant (read only)
    pub async fn fetch_ready_item(&self, plant: &str) -> Result<Option<WorkItem>> {
        let sql = format!(
            "SELECT {} FROM analysis_console \
             WHERE plant = ? AND data_ready = 'Y' AND ai_process IS NULL \
             ORDER BY mrp_run_date DESC, id DESC LIMIT 1",
            WORK_ITEM_COLUMNS
        );
        let item = sqlx::query_as::<_, WorkItem>(&sql)
            .bind(plant)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Atomically select and mark the item `fetch_ready_item` would return
    ///
    /// The update only applies while `ai_process` is still NULL, so two
    /// concurrent claimers can never both receive the same row.
    pub async fn claim_ready_item(&self, plant: &str) -> Result<Option<WorkItem>> {
        let status = AiProcess::PreparingData.as_db_text();
        let now = now_db_text();

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE analysis_console \
             SET ai_process = ?, ai_process_start_datetime = ? \
             WHERE ai_process IS NULL AND id = ( \
                 SELECT id FROM analysis_console \
                 WHERE plant = ? AND data_ready = 'Y' AND ai_process IS NULL \
                 ORDER BY mrp_run_date DESC, id DESC LIMIT 1) \
             RETURNING {}",
            WORK_ITEM_COLUMNS
        );
        let claimed = sqlx::query_as::<_, WorkItem>(&sql)
            .bind(&status)
            .bind(&now)
            .bind(plant)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(item) = &claimed {
            append_history(&mut tx, item.id, &status, &now).await?;
        }
        tx.commit().await?;

        if let Some(item) = &claimed {
            info!(series_id = item.id, plant, mrp_run_date = %item.mrp_run_date, "Work item claimed");
        }
        Ok(claimed)
    }

    pub async fn fetch_item(&self, id: i64) -> Result<Option<WorkItem>> {
        let sql = format!("SELECT {} FROM analysis_console WHERE id = ?", WORK_ITEM_COLUMNS);
        let item = sqlx::query_as::<_, WorkItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Current `ai_process` value; `NotFound` when the item does not exist
    pub async fn current_status(&self, id: i64) -> Result<Option<String>> {
        let row = sqlx::query("SELECT ai_process FROM analysis_console WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Work item {} not found", id)))?;
        Ok(row.get("ai_process"))
    }

    /// Overwrite `ai_process` unconditionally
    pub async fn update_status(&self, id: i64, status: &AiProcess) -> Result<()> {
        let text = status.as_db_text();
        let now = now_db_text();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE analysis_console SET ai_process = ? WHERE id = ?")
            .bind(&text)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Work item {} not found", id)));
        }
        append_history(&mut tx, id, &text, &now).await?;
        tx.commit().await?;

        debug!(series_id = id, status = %text, "Status updated");
        Ok(())
    }

    /// Move `ai_process` from `from` to `to`; `false` when the item is elsewhere
    pub async fn transition(&self, id: i64, from: &AiProcess, to: &AiProcess) -> Result<bool> {
        let to_text = to.as_db_text();
        let now = now_db_text();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE analysis_console SET ai_process = ? WHERE id = ? AND ai_process = ?",
        )
        .bind(&to_text)
        .bind(id)
        .bind(from.as_db_text())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        append_history(&mut tx, id, &to_text, &now).await?;
        tx.commit().await?;

        debug!(series_id = id, from = %from, to = %to_text, "Status transitioned");
        Ok(true)
    }

    /// Overwrite one whitelisted column
    pub async fn update_field(&self, id: i64, column: ControlColumn, value: Option<&str>) -> Result<()> {
        if column == ControlColumn::DataReady && !matches!(value, Some("Y") | Some("N")) {
            return Err(Error::InvalidInput(format!(
                "data_ready must be 'Y' or 'N', got {:?}",
                value
            )));
        }

        let sql = format!("UPDATE analysis_console SET {} = ? WHERE id = ?", column.name());
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Work item {} not found", id)));
        }
        Ok(())
    }

    /// Set the terminal success status and the end timestamp together
    pub async fn mark_completed(&self, id: i64) -> Result<()> {
        let text = AiProcess::Completed.as_db_text();
        let now = now_db_text();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE analysis_console SET ai_process = ?, ai_process_end_datetime = ? WHERE id = ?",
        )
        .bind(&text)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Work item {} not found", id)));
        }
        append_history(&mut tx, id, &text, &now).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Status trail of one item, oldest first
    pub async fn status_history(&self, id: i64) -> Result<Vec<StatusChange>> {
        let history = sqlx::query_as::<_, StatusChange>(
            "SELECT work_item_id, status, changed_at FROM ai_process_history WHERE work_item_id = ? ORDER BY seq",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(history)
    }

    /// Source records of a work item, in insertion order
    pub async fn fetch_source_rows(&self, item: &WorkItem) -> Result<Table> {
        let rows = sqlx::query(
            r#"
            SELECT id, material, colA, colB, colC, colD, colE, colF, colG, sourcer_code
            FROM mrp_sourcer_code_analysis
            WHERE plant = ? AND mrp_run_date = ? AND batch_id = ? AND post_datetime = ?
            ORDER BY id
            "#,
        )
        .bind(&item.plant)
        .bind(&item.mrp_run_date)
        .bind(&item.batch_id)
        .bind(&item.post_datetime)
        .fetch_all(&self.pool)
        .await?;

        let mut table = Table::new(RECORD_COLUMNS);
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let mut cells = Vec::with_capacity(RECORD_COLUMNS.len());
            cells.push(Some(id.to_string()));
            for column in &RECORD_COLUMNS[1..] {
                cells.push(row.try_get::<Option<String>, _>(*column)?);
            }
            table.rows.push(cells);
        }
        Ok(table)
    }
}

async fn append_history(conn: &mut SqliteConnection, id: i64, status: &str, changed_at: &str) -> Result<()> {
    sqlx::query("INSERT INTO ai_process_history (work_item_id, status, changed_at) VALUES (?, ?, ?)")
        .bind(id)
        .bind(status)
        .bind(changed_at)
        .execute(conn)
        .await?;
    Ok(())
}
