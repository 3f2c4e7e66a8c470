//! Database and pipeline fixtures

use anyhow::Result;
use sourcer_common::db::init_database_at;
use sourcer_common::PipelineConfig;
use sourcer_pipeline::artifacts::ArtifactStore;
use sourcer_pipeline::gateway::ControlTable;
use sourcer_pipeline::model::GridSearchFitter;
use sourcer_pipeline::sink::SqliteResultSink;
use sourcer_pipeline::{Runner, StageContext};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const RUN_DATE: &str = "2026-03-02";
pub const BATCH: &str = "B-001";
pub const POSTED: &str = "2026-03-02 06:30:00";

/// Create temporary test database with all tables
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let pool = init_database_at(&temp_dir.path().join("test_sourcer.db")).await?;
    Ok((temp_dir, pool))
}

/// Insert a ready, unclaimed work item keyed on the shared run constants
pub async fn insert_work_item(pool: &SqlitePool, id: i64, plant: &str, total_record: i64) -> Result<()> {
    insert_work_item_in_batch(pool, id, plant, BATCH, total_record).await
}

pub async fn insert_work_item_in_batch(
    pool: &SqlitePool,
    id: i64,
    plant: &str,
    batch: &str,
    total_record: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO analysis_console
            (id, plant, mrp_run_date, batch_id, post_datetime, total_record, data_ready, ai_process)
        VALUES (?, ?, ?, ?, ?, ?, 'Y', NULL)
        "#,
    )
    .bind(id)
    .bind(plant)
    .bind(RUN_DATE)
    .bind(batch)
    .bind(POSTED)
    .bind(total_record)
    .execute(pool)
    .await?;
    Ok(())
}

/// One source record: `colA..colG` then the label
pub struct SourceRow<'a> {
    pub material: &'a str,
    pub cols: [Option<&'a str>; 7],
    pub label: Option<&'a str>,
}

pub async fn insert_source_rows(pool: &SqlitePool, plant: &str, rows: &[SourceRow<'_>]) -> Result<()> {
    insert_source_rows_in_batch(pool, plant, BATCH, rows).await
}

pub async fn insert_source_rows_in_batch(
    pool: &SqlitePool,
    plant: &str,
    batch: &str,
    rows: &[SourceRow<'_>],
) -> Result<()> {
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO mrp_sourcer_code_analysis
                (plant, mrp_run_date, batch_id, post_datetime, material,
                 colA, colB, colC, colD, colE, colF, colG, sourcer_code)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(plant)
        .bind(RUN_DATE)
        .bind(batch)
        .bind(POSTED)
        .bind(row.material)
        .bind(row.cols[0])
        .bind(row.cols[1])
        .bind(row.cols[2])
        .bind(row.cols[3])
        .bind(row.cols[4])
        .bind(row.cols[5])
        .bind(row.cols[6])
        .bind(row.label)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Three P1 records, one unlabeled, all component columns known
pub fn p1_rows() -> Vec<SourceRow<'static>> {
    vec![
        SourceRow {
            material: "M-100",
            cols: [Some("A1"), Some("B1"), Some("C1"), Some("D1"), Some("E1"), Some("F1"), Some("G1")],
            label: Some("S10"),
        },
        SourceRow {
            material: "M-200",
            cols: [Some("A2"), Some("B2"), Some("C2"), Some("D2"), Some("E2"), Some("F2"), Some("G2")],
            label: Some("S20;S21"),
        },
        SourceRow {
            material: "M-300",
            cols: [Some("A1"), Some("B1"), Some("C1"), Some("D2"), Some("E1"), Some("F1"), Some("G2")],
            label: Some("  "),
        },
    ]
}

/// Four P1 records of a later batch with a different label set, one unlabeled
pub fn p1_second_batch_rows() -> Vec<SourceRow<'static>> {
    vec![
        SourceRow {
            material: "M-400",
            cols: [Some("A1"), Some("B1"), Some("C1"), Some("D1"), Some("E1"), Some("F1"), Some("G1")],
            label: Some("T1"),
        },
        SourceRow {
            material: "M-500",
            cols: [Some("A2"), Some("B2"), Some("C2"), Some("D2"), Some("E2"), Some("F2"), Some("G2")],
            label: Some("T2"),
        },
        SourceRow {
            material: "M-600",
            cols: [Some("A3"), Some("B3"), Some("C3"), Some("D3"), Some("E3"), Some("F3"), Some("G3")],
            label: Some("T3"),
        },
        SourceRow {
            material: "M-700",
            cols: [Some("A1"), Some("B2"), Some("C3"), Some("D1"), Some("E2"), Some("F3"), Some("G1")],
            label: None,
        },
    ]
}

/// `ai_process` values of a work item, oldest first
pub async fn status_sequence(pool: &SqlitePool, id: i64) -> Result<Vec<String>> {
    let statuses = sqlx::query_scalar::<_, String>(
        "SELECT status FROM ai_process_history WHERE work_item_id = ? ORDER BY seq",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;
    Ok(statuses)
}

pub fn stage_context(pool: &SqlitePool, dir: &Path, plant: &str, store: Arc<dyn ArtifactStore>) -> StageContext {
    StageContext {
        plant: plant.to_string(),
        series_dir: dir.join("series"),
        gateway: ControlTable::new(pool.clone()),
        store,
        config: PipelineConfig::default(),
        run_id: "run-test".to_string(),
    }
}

/// Runner with the default fitter and the SQLite sink, no log upload
pub fn test_runner(pool: &SqlitePool, dir: &Path, plant: &str, store: Arc<dyn ArtifactStore>) -> Runner<GridSearchFitter> {
    let ctx = stage_context(pool, dir, plant, store);
    Runner {
        fitter: GridSearchFitter::from_config(&ctx.config.training),
        model_dir: dir.join("models"),
        sink: Box::new(SqliteResultSink::new(pool.clone())),
        log_upload: None,
        ctx,
    }
}
