//! Test Helper Utilities
//!
//! Shared utilities for testing sourcer-pipeline

#![allow(dead_code)]

pub mod db_utils;
pub mod log_capture;

pub use db_utils::{
    create_test_db, insert_source_rows, insert_source_rows_in_batch, insert_work_item,
    insert_work_item_in_batch, p1_rows, p1_second_batch_rows, stage_context, status_sequence,
    test_runner, SourceRow,
};
pub use log_capture::{assert_logged, capture_logs};
