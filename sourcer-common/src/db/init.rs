//! Database initialization
//!
//! Opens (or creates) the SQLite database selected by `--mode` and makes sure
//! every table the pipeline touches exists. Table creation is idempotent.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Connect to a database URL and create tables if needed
pub async fn init_database(db_url: &str) -> Result<SqlitePool> {
    debug!("Connecting to database: {}", db_url);

    // Wait for competing pipeline runs instead of failing on a locked file
    let options = SqliteConnectOptions::from_str(db_url)?.busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    create_analysis_console_table(&pool).await?;
    create_source_table(&pool).await?;
    create_ai_process_history_table(&pool).await?;
    create_prediction_table(&pool).await?;
    create_log_message_table(&pool).await?;

    info!("Database tables initialized");
    Ok(pool)
}

/// Open a database file, creating it and its parent directory when missing
pub async fn init_database_at(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    init_database(&db_url).await
}

/// Control table: one row per work item, written by upstream ETL
async fn create_analysis_console_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_console (
            id INTEGER PRIMARY KEY,
            plant TEXT NOT NULL,
            mrp_run_date TEXT NOT NULL,
            batch_id TEXT NOT NULL,
            post_datetime TEXT NOT NULL,
            total_record INTEGER NOT NULL,
            data_ready TEXT NOT NULL DEFAULT 'N' CHECK (data_ready IN ('Y', 'N')),
            ai_process TEXT,
            ai_process_start_datetime TEXT,
            ai_process_end_datetime TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analysis_console_ready ON analysis_console (plant, data_ready, mrp_run_date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Raw MRP records awaiting a sourcer code
async fn create_source_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mrp_sourcer_code_analysis (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            plant TEXT NOT NULL,
            mrp_run_date TEXT NOT NULL,
            batch_id TEXT NOT NULL,
            post_datetime TEXT NOT NULL,
            material TEXT,
            colA TEXT,
            colB TEXT,
            colC TEXT,
            colD TEXT,
            colE TEXT,
            colF TEXT,
            colG TEXT,
            sourcer_code TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_mrp_sourcer_code_key ON mrp_sourcer_code_analysis (plant, mrp_run_date, batch_id, post_datetime)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Append-only trail of every `ai_process` value a work item went through
async fn create_ai_process_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ai_process_history (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            work_item_id INTEGER NOT NULL,
            status TEXT NOT NULL,
            changed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Downstream operational table receiving published predictions
async fn create_prediction_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sourcer_prediction (
            series_id INTEGER NOT NULL,
            row_index INTEGER NOT NULL,
            record_id TEXT,
            record TEXT NOT NULL,
            prediction1 TEXT,
            prediction2 TEXT,
            prediction3 TEXT,
            created_at TEXT NOT NULL,
            PRIMARY KEY (series_id, row_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Run logs uploaded for operators
async fn create_log_message_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS log_message (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            update_time TEXT NOT NULL,
            plant TEXT NOT NULL,
            message TEXT NOT NULL,
            source_file TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'undone'
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
