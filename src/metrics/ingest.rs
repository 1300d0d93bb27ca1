//! Ingestion phase metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct IngestMetrics;

impl IngestMetrics {
    pub fn record_intake(records: usize) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "intake_records")).increment(records as u64);
    }

    pub fn record_admitted(admitted: usize, rejected: usize) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "admitted_records"))
            .increment(admitted as u64);
        ::metrics::counter!(phase_metric!(counter, "ingest", "rejected_records"))
            .increment(rejected as u64);
    }

    pub fn record_patched(leading_zeros: usize, remapped_countries: usize) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "cpv_leading_zeros"))
            .increment(leading_zeros as u64);
        ::metrics::counter!(phase_metric!(counter, "ingest", "countries_remapped"))
            .increment(remapped_countries as u64);
    }

    pub fn record_published(records: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "published_records"))
            .increment(records as u64);
        ::metrics::histogram!(phase_metric!(histogram, "ingest", "duration_seconds"))
            .record(duration_secs);
    }

    pub fn record_failure() {
        ::metrics::counter!(phase_metric!(counter, "ingest", "failures")).increment(1);
    }
}

impl PhaseMetrics for IngestMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "ingest", "intake_records"));
        let _ = counter!(phase_metric!(counter, "ingest", "admitted_records"));
        let _ = counter!(phase_metric!(counter, "ingest", "rejected_records"));
        let _ = counter!(phase_metric!(counter, "ingest", "cpv_leading_zeros"));
        let _ = counter!(phase_metric!(counter, "ingest", "countries_remapped"));
        let _ = counter!(phase_metric!(counter, "ingest", "published_records"));
        let _ = counter!(phase_metric!(counter, "ingest", "failures"));
        let _ = histogram!(phase_metric!(histogram, "ingest", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "ingest"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "ingest", "intake_records"),
                metric_type: MetricType::Counter,
                help: "Records written to the intake collection",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "admitted_records"),
                metric_type: MetricType::Counter,
                help: "Records admitted by the normalizer",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "rejected_records"),
                metric_type: MetricType::Counter,
                help: "Records filtered out by year, value or country",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "cpv_leading_zeros"),
                metric_type: MetricType::Counter,
                help: "CPV codes that had their leading zero restored",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "countries_remapped"),
                metric_type: MetricType::Counter,
                help: "Legacy country codes rewritten to current ones",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "published_records"),
                metric_type: MetricType::Counter,
                help: "Records appended to the analytics collection",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "failures"),
                metric_type: MetricType::Counter,
                help: "Ingestion runs aborted by an error",
            },
            MetricDoc {
                name: phase_metric!(histogram, "ingest", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of a complete ingestion run",
            },
        ]
    }
}
