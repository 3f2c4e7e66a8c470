//! Downstream destination of published predictions

use crate::error::{PipelineError, PipelineResult};
use crate::features::{PREDICTION_COLUMNS, RECORD_ID};
use crate::table::Table;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sourcer_common::time::now_db_text;
use sqlx::SqlitePool;
use tracing::info;

/// Accepts a result table keyed by series id
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store `result` for `series_id`, returning the number of rows written
    async fn publish(&self, series_id: i64, result: &Table) -> PipelineResult<usize>;
}

/// Writes into `sourcer_prediction`, replacing earlier rows of the same series
#[derive(Debug, Clone)]
pub struct SqliteResultSink {
    pool: SqlitePool,
}

impl SqliteResultSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultSink for SqliteResultSink {
    async fn publish(&self, series_id: i64, result: &Table) -> PipelineResult<usize> {
        let prediction_idx = PREDICTION_COLUMNS
            .iter()
            .map(|c| result.column_index(c))
            .collect::<PipelineResult<Vec<_>>>()?;
        let record_idx = result.column_index(RECORD_ID).ok();
        let created_at = now_db_text();

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM sourcer_prediction WHERE series_id = ?")
            .bind(series_id)
            .execute(&mut *tx)
            .await?;

        for (row_index, row) in result.rows.iter().enumerate() {
            let mut record = Map::new();
            for (column, cell) in result.columns.iter().zip(row) {
                if PREDICTION_COLUMNS.contains(&column.as_str()) {
                    continue;
                }
                record.insert(
                    column.clone(),
                    cell.clone().map(Value::String).unwrap_or(Value::Null),
                );
            }
            let record = serde_json::to_string(&Value::Object(record))?;

            sqlx::query(
                r#"
                INSERT INTO sourcer_prediction
                    (series_id, row_index, record_id, record, prediction1, prediction2, prediction3, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(series_id)
            .bind(row_index as i64)
            .bind(record_idx.and_then(|i| row[i].as_deref()))
            .bind(record)
            .bind(row[prediction_idx[0]].as_deref())
            .bind(row[prediction_idx[1]].as_deref())
            .bind(row[prediction_idx[2]].as_deref())
            .bind(&created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| PipelineError::Publish(format!("insert row {} failed: {}", row_index, e)))?;
        }
        tx.commit().await?;

        info!(series_id, rows = result.len(), "Predictions published");
        Ok(result.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcer_common::db::init_database_at;
    use sqlx::Row;
    use tempfile::TempDir;

    fn result_table(predictions: &[&str]) -> Table {
        let mut t = Table::new(["record_id", "material", "prediction1", "prediction2", "prediction3"]);
        for (i, p) in predictions.iter().enumerate() {
            t.push_row(vec![
                Some(i.to_string()),
                Some("M-1".into()),
                Some(p.to_string()),
                None,
                None,
            ])
            .unwrap();
        }
        t
    }

    #[tokio::test]
    async fn test_publish_replaces_previous_rows() {
        let dir = TempDir::new().unwrap();
        let pool = init_database_at(&dir.path().join("sink.db")).await.unwrap();
        let sink = SqliteResultSink::new(pool.clone());

        assert_eq!(sink.publish(5, &result_table(&["S1", "S2", "S3"])).await.unwrap(), 3);
        assert_eq!(sink.publish(5, &result_table(&["S9"])).await.unwrap(), 1);

        let rows = sqlx::query("SELECT record, prediction1 FROM sourcer_prediction WHERE series_id = 5")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String, _>("prediction1"), "S9");

        let record: Value = serde_json::from_str(&rows[0].get::<String, _>("record")).unwrap();
        assert_eq!(record["material"], "M-1");
        assert!(record.get("prediction1").is_none());
    }

    #[tokio::test]
    async fn test_publish_requires_prediction_columns() {
        let dir = TempDir::new().unwrap();
        let pool = init_database_at(&dir.path().join("sink.db")).await.unwrap();
        let sink = SqliteResultSink::new(pool);

        let table = Table::new(["record_id"]);
        assert!(matches!(sink.publish(1, &table).await, Err(PipelineError::MissingColumn(_))));
    }
}
