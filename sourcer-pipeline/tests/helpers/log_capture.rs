//! Log capture for tests
//!
//! Installs a thread-local subscriber writing into a `LogBuffer`; keep the
//! guard alive for as long as logs should be captured. Works with the
//! default single-threaded `#[tokio::test]` runtime.

use sourcer_common::logging::LogBuffer;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;

pub fn capture_logs() -> (LogBuffer, DefaultGuard) {
    let buffer = LogBuffer::new();
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with(buffer.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

pub fn assert_logged(buffer: &LogBuffer, pattern: &str) {
    assert!(
        buffer.contains(pattern),
        "Expected log matching '{}', but none found. All logs:\n{}",
        pattern,
        buffer
            .records()
            .iter()
            .map(|r| r.to_line())
            .collect::<Vec<_>>()
            .join("\n")
    );
}
