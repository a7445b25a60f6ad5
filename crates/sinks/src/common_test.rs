//! Tests for common sink types

use std::sync::Arc;

use crate::{SinkError, SinkMetrics, SinkMetricsHandle};

#[test]
fn test_metrics_new() {
    let snapshot = SinkMetrics::new().snapshot();
    assert_eq!(snapshot, Default::default());
}

#[test]
fn test_metrics_batch_sent() {
    let metrics = SinkMetrics::new();

    for _ in 0..3 {
        metrics.sample_received();
    }
    metrics.batch_sent(2, 300);
    metrics.batch_sent(1, 120);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.samples_received, 3);
    assert_eq!(snapshot.batches_sent, 2);
    assert_eq!(snapshot.samples_sent, 3);
    assert_eq!(snapshot.bytes_sent, 420);
}

#[test]
fn test_metrics_errors_and_reconnects() {
    let metrics = SinkMetrics::new();
    metrics.write_error();
    metrics.write_error();
    metrics.reconnect();
    metrics.flush();

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.write_errors, 2);
    assert_eq!(snapshot.reconnects, 1);
    assert_eq!(snapshot.flush_count, 1);
}

#[test]
fn test_handle_reads_shared_metrics() {
    let metrics = Arc::new(SinkMetrics::new());
    let handle = SinkMetricsHandle::new("write_http", Arc::clone(&metrics));

    metrics.batch_sent(5, 10);
    assert_eq!(handle.name(), "write_http");
    assert_eq!(handle.snapshot().samples_sent, 5);
}

#[test]
fn test_error_display() {
    assert_eq!(
        SinkError::config("bad regex").to_string(),
        "configuration error: bad regex"
    );
    assert_eq!(
        SinkError::Status {
            status: 503,
            body: String::new()
        }
        .to_string(),
        "unexpected HTTP status 503"
    );
    assert_eq!(
        SinkError::connection("refused").to_string(),
        "connection error: refused"
    );
    assert_eq!(SinkError::publish("nack").to_string(), "publish failed: nack");
}
