//! Tests for adapter capability defaults and errors

use async_trait::async_trait;

use crate::adapter::{AdapterError, MetricSink, MetricSource};
use crate::sample::MetricSample;

struct FixedSource {
    samples: Vec<MetricSample>,
}

#[async_trait]
impl MetricSource for FixedSource {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn read(&mut self) -> Vec<MetricSample> {
        std::mem::take(&mut self.samples)
    }
}

#[derive(Default)]
struct CollectingSink {
    written: Vec<String>,
}

#[async_trait]
impl MetricSink for CollectingSink {
    fn name(&self) -> &str {
        "collect"
    }

    async fn write(&mut self, sample: &MetricSample) {
        self.written.push(sample.key());
    }
}

#[tokio::test]
async fn test_default_lifecycle_is_noop() {
    let mut source = FixedSource {
        samples: vec![MetricSample::new("h", "p", "t")],
    };
    source.configure().await.unwrap();
    source.start().await.unwrap();
    assert_eq!(source.read().await.len(), 1);
    assert!(source.read().await.is_empty());
    source.stop().await;
}

#[tokio::test]
async fn test_sink_as_trait_object() {
    let mut sink: Box<dyn MetricSink> = Box::new(CollectingSink::default());
    sink.configure().await.unwrap();
    sink.write(&MetricSample::new("h", "p", "t")).await;
    sink.flush().await;
    sink.stop().await;
    assert_eq!(sink.name(), "collect");
}

#[test]
fn test_adapter_error_display() {
    let err = AdapterError::config("write_http", "no url");
    assert_eq!(err.to_string(), "write_http: invalid configuration: no url");

    let err = AdapterError::start("statsd", "address in use");
    assert!(err.to_string().contains("failed to start"));
}
