//! Registers every phase's metrics and flags name collisions

use std::collections::HashMap;

use tracing::{info, warn};

use crate::metrics::{IngestMetrics, MetricDoc, PhaseMetrics, QueryMetrics};

pub fn register_all_metrics() -> usize {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<IngestMetrics>(&mut all_metrics);
    register_phase_metrics::<QueryMetrics>(&mut all_metrics);

    info!("Registered {} metrics across all phases", all_metrics.len());
    all_metrics.len()
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, (&'static str, MetricDoc)>) {
    T::register_metrics();
    let phase_name = T::phase_name();

    for doc in T::metrics_documentation() {
        if let Some((owner, _)) = all_metrics.get(doc.name) {
            warn!(
                "Metric '{}' is defined by both '{}' and '{}'",
                doc.name, owner, phase_name
            );
        } else {
            all_metrics.insert(doc.name, (phase_name, doc));
        }
    }
}
