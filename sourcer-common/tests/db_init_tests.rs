//! Database initialization tests

use sourcer_common::db::init_database_at;
use tempfile::TempDir;

async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("sourcer.db");

    let pool = init_database_at(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = TempDir::new().unwrap();
    let pool = init_database_at(&dir.path().join("sourcer.db")).await.unwrap();

    let tables = table_names(&pool).await;
    for expected in [
        "ai_process_history",
        "analysis_console",
        "log_message",
        "mrp_sourcer_code_analysis",
        "sourcer_prediction",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_initialization_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sourcer.db");

    let first = init_database_at(&db_path).await.unwrap();
    sqlx::query(
        "INSERT INTO analysis_console (id, plant, mrp_run_date, batch_id, post_datetime, total_record, data_ready) VALUES (1, 'P1', '2024-05-01', 'B1', '2024-05-01 08:00:00', 3, 'Y')",
    )
    .execute(&first)
    .await
    .unwrap();
    drop(first);

    let second = init_database_at(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analysis_console")
        .fetch_one(&second)
        .await
        .unwrap();
    assert_eq!(count, 1, "re-initialization must keep existing rows");
}

#[tokio::test]
async fn test_data_ready_constraint() {
    let dir = TempDir::new().unwrap();
    let pool = init_database_at(&dir.path().join("sourcer.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO analysis_console (id, plant, mrp_run_date, batch_id, post_datetime, total_record, data_ready) VALUES (1, 'P1', '2024-05-01', 'B1', '2024-05-01 08:00:00', 3, 'maybe')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err());
}
