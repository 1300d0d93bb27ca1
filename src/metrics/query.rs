//! Query phase metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct QueryMetrics;

impl QueryMetrics {
    pub fn record_success(_query: &str, duration_secs: f64, rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "query", "executions_success")).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "query", "duration_seconds"))
            .record(duration_secs);
        ::metrics::histogram!(phase_metric!(histogram, "query", "result_rows")).record(rows as f64);
    }

    pub fn record_error(_query: &str) {
        ::metrics::counter!(phase_metric!(counter, "query", "executions_error")).increment(1);
    }
}

impl PhaseMetrics for QueryMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "query", "executions_success"));
        let _ = counter!(phase_metric!(counter, "query", "executions_error"));
        let _ = histogram!(phase_metric!(histogram, "query", "duration_seconds"));
        let _ = histogram!(phase_metric!(histogram, "query", "result_rows"));
    }

    fn phase_name() -> &'static str {
        "query"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "query", "executions_success"),
                metric_type: MetricType::Counter,
                help: "Analytics queries that completed",
            },
            MetricDoc {
                name: phase_metric!(counter, "query", "executions_error"),
                metric_type: MetricType::Counter,
                help: "Analytics queries that failed",
            },
            MetricDoc {
                name: phase_metric!(histogram, "query", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Query execution time in seconds",
            },
            MetricDoc {
                name: phase_metric!(histogram, "query", "result_rows"),
                metric_type: MetricType::Histogram,
                help: "Rows returned per query",
            },
        ]
    }
}
