use crate::error::FailureClass;
use crate::types::IngestOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestMetrics {
    pub total_messages: u64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed_validation: u64,
    pub failed_resolution: u64,
    pub failed_store: u64,
    pub cancelled: u64,
    pub avg_processing_ms: f64,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
}

impl IngestMetrics {
    pub fn failed(&self) -> u64 {
        self.failed_validation + self.failed_resolution + self.failed_store + self.cancelled
    }
}

#[derive(Clone, Default)]
pub struct MetricsCollector {
    metrics: Arc<Mutex<IngestMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_start(&self) -> MessageTracker {
        MessageTracker {
            start_time: Instant::now(),
            collector: self.clone(),
        }
    }

    pub fn get_metrics(&self) -> IngestMetrics {
        self.metrics.lock().unwrap().clone()
    }

    fn record_elapsed(metrics: &mut IngestMetrics, elapsed_ms: f64) {
        metrics.total_messages += 1;
        // Exponential moving average
        let alpha = 0.1;
        metrics.avg_processing_ms = if metrics.total_messages == 1 {
            elapsed_ms
        } else {
            metrics.avg_processing_ms * (1.0 - alpha) + elapsed_ms * alpha
        };
    }
}

pub struct MessageTracker {
    start_time: Instant,
    collector: MetricsCollector,
}

impl MessageTracker {
    pub fn succeeded(self, outcome: IngestOutcome) {
        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut metrics = self.collector.metrics.lock().unwrap();
        MetricsCollector::record_elapsed(&mut metrics, elapsed_ms);
        match outcome {
            IngestOutcome::Created => metrics.created += 1,
            IngestOutcome::Updated => metrics.updated += 1,
            IngestOutcome::Skipped => metrics.skipped += 1,
        }
    }

    pub fn failed(self, class: FailureClass, error: String) {
        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut metrics = self.collector.metrics.lock().unwrap();
        MetricsCollector::record_elapsed(&mut metrics, elapsed_ms);
        match class {
            FailureClass::Validation => metrics.failed_validation += 1,
            FailureClass::Resolution => metrics.failed_resolution += 1,
            FailureClass::Store => metrics.failed_store += 1,
            FailureClass::Cancelled => metrics.cancelled += 1,
        }
        metrics.last_error = Some(error);
        metrics.last_error_time = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_metrics_collector_outcomes() {
        let collector = MetricsCollector::new();
        collector.record_start().succeeded(IngestOutcome::Created);
        collector.record_start().succeeded(IngestOutcome::Skipped);
        collector.record_start().succeeded(IngestOutcome::Skipped);

        let metrics = collector.get_metrics();
        assert_eq!(metrics.total_messages, 3);
        assert_eq!(metrics.created, 1);
        assert_eq!(metrics.skipped, 2);
        assert_eq!(metrics.failed(), 0);
    }

    #[test]
    fn test_metrics_collector_error() {
        let collector = MetricsCollector::new();
        collector
            .record_start()
            .failed(FailureClass::Resolution, "unresolved team 'X'".to_string());

        let metrics = collector.get_metrics();
        assert_eq!(metrics.failed_resolution, 1);
        assert_eq!(metrics.failed(), 1);
        assert_eq!(metrics.last_error, Some("unresolved team 'X'".to_string()));
        assert!(metrics.last_error_time.is_some());
    }

    #[test]
    fn test_metrics_collector_timing() {
        let collector = MetricsCollector::new();
        let tracker = collector.record_start();
        std::thread::sleep(Duration::from_millis(10));
        tracker.succeeded(IngestOutcome::Updated);

        assert!(collector.get_metrics().avg_processing_ms >= 10.0);
    }
}
