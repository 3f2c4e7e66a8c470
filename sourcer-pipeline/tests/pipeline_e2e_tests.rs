//! End-to-end pipeline runs against a temporary database and artifact root

mod helpers;

use helpers::*;
use sourcer_pipeline::artifacts::{names, ArtifactStore, LocalArtifactStore};
use sourcer_pipeline::pipeline::LogUpload;
use sourcer_pipeline::status::AiProcess;
use sourcer_pipeline::{Stage, StageOutcome};
use sqlx::Row;
use std::sync::Arc;

#[tokio::test]
async fn test_p1_scenario_full_status_sequence() {
    let (dir, pool) = create_test_db().await.unwrap();
    insert_work_item(&pool, 1, "P1", 3).await.unwrap();
    insert_source_rows(&pool, "P1", &p1_rows()).await.unwrap();

    let store = Arc::new(LocalArtifactStore::new(dir.path().join("artifacts")));
    let runner = test_runner(&pool, dir.path(), "P1", store.clone());

    let outcomes = runner.run_all().await.unwrap();
    for (stage, outcome) in &outcomes {
        assert_eq!(outcome, &StageOutcome::Completed, "stage {} did not complete", stage);
    }

    assert_eq!(
        status_sequence(&pool, 1).await.unwrap(),
        vec![
            "Preparing data",
            "Preparing data done",
            "Training model",
            "Training model done",
            "Predicting inference",
            "Predicting inference done",
            "Y",
        ]
    );

    let training = store.load_dataset(&names::training_data("P1"), None).await.unwrap();
    let inference = store.load_dataset(&names::inference_data("P1"), None).await.unwrap();
    assert_eq!(training.table.len(), 2);
    assert_eq!(inference.table.len(), 1);
    assert_eq!(
        training.table.column("sourcer_code").unwrap(),
        vec![Some("S10"), Some("S20")]
    );

    let item = runner.ctx.gateway.fetch_item(1).await.unwrap().unwrap();
    assert_eq!(item.ai_process.as_deref(), Some("Y"));
    assert_eq!(item.data_ready, "Y");
    assert!(item.ai_process_start_datetime.is_some());
    assert!(item.ai_process_end_datetime.is_some());
}

#[tokio::test]
async fn test_p1_scenario_publishes_decoded_predictions() {
    let (dir, pool) = create_test_db().await.unwrap();
    insert_work_item(&pool, 1, "P1", 3).await.unwrap();
    insert_source_rows(&pool, "P1", &p1_rows()).await.unwrap();

    let store = Arc::new(LocalArtifactStore::new(dir.path().join("artifacts")));
    test_runner(&pool, dir.path(), "P1", store.clone())
        .run_all()
        .await
        .unwrap();

    let result = store.load_dataset(&names::result("P1"), None).await.unwrap().table;
    assert_eq!(result.len(), 1);
    assert_eq!(result.column("material").unwrap(), vec![Some("M-300")]);
    let first = result.column("prediction1").unwrap()[0].unwrap().to_string();
    assert!(first == "S10" || first == "S20", "undecoded prediction {}", first);
    // Only two label values exist
    assert_eq!(result.column("prediction3").unwrap(), vec![None]);

    let rows = sqlx::query("SELECT series_id, prediction1, record FROM sourcer_prediction")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<i64, _>("series_id"), 1);
    assert_eq!(rows[0].get::<String, _>("prediction1"), first);
    assert!(rows[0].get::<String, _>("record").contains("M-300"));
}

#[tokio::test]
async fn test_registered_models_carry_lineage() {
    let (dir, pool) = create_test_db().await.unwrap();
    insert_work_item(&pool, 7, "P1", 3).await.unwrap();
    insert_source_rows(&pool, "P1", &p1_rows()).await.unwrap();

    let store = Arc::new(LocalArtifactStore::new(dir.path().join("artifacts")));
    test_runner(&pool, dir.path(), "P1", store.clone())
        .run_all()
        .await
        .unwrap();

    for name in ["P1_model.json", "P1_model_no_comp.json"] {
        let info = store.model_info(name, None).await.unwrap();
        let registration = &info.registration;
        assert_eq!(info.version, 1);
        assert_eq!(registration.tags["pipeline_id"], "run-test");
        assert_eq!(registration.tags["series_id"], "7");
        assert_eq!(registration.tags["dataset"], "P1_training_data: 1");
        assert_eq!(registration.properties["accuracy_bottomline"], "0.8");
        assert!(registration.properties.contains_key("validation_accuracy"));
        assert_eq!(registration.sha256.len(), 64);
    }

    let mapping = store.get_blob(&names::encoding_mappings("P1")).await.unwrap();
    let mapping: serde_json::Value = serde_json::from_slice(&mapping).unwrap();
    assert_eq!(mapping["sourcer_code"], serde_json::json!(["S10", "S20"]));
}

#[tokio::test]
async fn test_length_mismatch_stops_before_datasets() {
    let (dir, pool) = create_test_db().await.unwrap();
    insert_work_item(&pool, 1, "P1", 5).await.unwrap();
    insert_source_rows(&pool, "P1", &p1_rows()).await.unwrap();

    let store = Arc::new(LocalArtifactStore::new(dir.path().join("artifacts")));
    let runner = test_runner(&pool, dir.path(), "P1", store.clone());

    let outcome = runner.run_stage(Stage::ReadData).await.unwrap();
    assert_eq!(outcome, StageOutcome::LengthMismatch { expected: 5, actual: 3 });

    // Handle is the real id, not the sentinel
    let handle = std::fs::read_to_string(dir.path().join("series").join("series_id.txt")).unwrap();
    assert_eq!(handle.trim(), "1");

    assert_eq!(
        status_sequence(&pool, 1).await.unwrap(),
        vec!["Preparing data", "Data lengths are different"]
    );
    for name in [names::training_data("P1"), names::inference_data("P1"), names::preprocessed_data("P1")] {
        assert_eq!(store.latest_dataset_version(&name).await.unwrap(), None);
    }

    // Downstream stages are gated out by the terminal status
    let train = runner.run_stage(Stage::Train).await.unwrap();
    assert_eq!(
        train,
        StageOutcome::Gated { status: Some("Data lengths are different".to_string()) }
    );
    assert_eq!(status_sequence(&pool, 1).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_fully_labeled_item_ends_with_no_inference_data() {
    let (dir, pool) = create_test_db().await.unwrap();
    let mut rows = p1_rows();
    rows[2].label = Some("S10");
    insert_work_item(&pool, 3, "P1", 3).await.unwrap();
    insert_source_rows(&pool, "P1", &rows).await.unwrap();

    let store = Arc::new(LocalArtifactStore::new(dir.path().join("artifacts")));
    let outcomes = test_runner(&pool, dir.path(), "P1", store.clone())
        .run_all()
        .await
        .unwrap();

    assert_eq!(outcomes[0].1, StageOutcome::NoInferenceData);
    assert!(outcomes[1..].iter().all(|(_, o)| matches!(o, StageOutcome::Gated { .. })));
    assert_eq!(
        status_sequence(&pool, 3).await.unwrap(),
        vec!["Preparing data", "No inference data"]
    );
    assert_eq!(store.latest_dataset_version(&names::inference_data("P1")).await.unwrap(), Some(1));
    assert_eq!(store.latest_dataset_version(&names::result("P1")).await.unwrap(), None);
}

#[tokio::test]
async fn test_predictor_rerun_is_byte_identical() {
    let (dir, pool) = create_test_db().await.unwrap();
    insert_work_item(&pool, 1, "P1", 3).await.unwrap();
    insert_source_rows(&pool, "P1", &p1_rows()).await.unwrap();

    let store = Arc::new(LocalArtifactStore::new(dir.path().join("artifacts")));
    let runner = test_runner(&pool, dir.path(), "P1", store.clone());
    runner.run_all().await.unwrap();

    runner
        .ctx
        .gateway
        .update_status(1, &AiProcess::TrainingModelDone)
        .await
        .unwrap();
    assert_eq!(runner.run_stage(Stage::Predict).await.unwrap(), StageOutcome::Completed);

    let first = store.load_dataset(&names::result("P1"), Some(1)).await.unwrap();
    let second = store.load_dataset(&names::result("P1"), Some(2)).await.unwrap();
    assert_eq!(first.table, second.table);
    assert_eq!(
        serde_json::to_vec(&first.table).unwrap(),
        serde_json::to_vec(&second.table).unwrap()
    );
}

#[tokio::test]
async fn test_latest_run_date_is_claimed_first() {
    let (dir, pool) = create_test_db().await.unwrap();
    sqlx::query(
        "INSERT INTO analysis_console (id, plant, mrp_run_date, batch_id, post_datetime, total_record, data_ready) \
         VALUES (9, 'P1', '2025-12-01', 'OLD', '2025-12-01 06:00:00', 0, 'Y')",
    )
    .execute(&pool)
    .await
    .unwrap();
    insert_work_item(&pool, 1, "P1", 3).await.unwrap();
    insert_source_rows(&pool, "P1", &p1_rows()).await.unwrap();

    let store = Arc::new(LocalArtifactStore::new(dir.path().join("artifacts")));
    let runner = test_runner(&pool, dir.path(), "P1", store);
    runner.run_stage(Stage::ReadData).await.unwrap();

    let older = runner.ctx.gateway.fetch_item(9).await.unwrap().unwrap();
    assert_eq!(older.ai_process, None);
    assert_eq!(status_sequence(&pool, 1).await.unwrap()[0], "Preparing data");
}

#[tokio::test]
async fn test_stage_logs_are_uploaded() {
    let (buffer, _guard) = capture_logs();
    let (dir, pool) = create_test_db().await.unwrap();
    insert_work_item(&pool, 1, "P1", 3).await.unwrap();
    insert_source_rows(&pool, "P1", &p1_rows()).await.unwrap();

    let store = Arc::new(LocalArtifactStore::new(dir.path().join("artifacts")));
    let mut runner = test_runner(&pool, dir.path(), "P1", store);
    runner.log_upload = Some(LogUpload {
        buffer: buffer.clone(),
        pool: pool.clone(),
        plant: "P1".to_string(),
        window: chrono::Duration::minutes(15),
    });

    runner.run_stage(Stage::ReadData).await.unwrap();
    assert_logged(&buffer, "Preparing data done");

    let row = sqlx::query("SELECT plant, message, source_file, status FROM log_message")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("plant"), "P1");
    assert_eq!(row.get::<String, _>("source_file"), "read_data");
    assert_eq!(row.get::<String, _>("status"), "undone");
    assert!(row.get::<String, _>("message").contains("Records split"));
}
