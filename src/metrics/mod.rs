//! Phase-organized metrics for ingestion and queries
//!
//! Each phase owns its metric names in a dedicated submodule. Recording is a
//! no-op until a recorder is installed by [`init_metrics`].

pub mod ingest;
pub mod query;
pub mod registry;

pub use ingest::IngestMetrics;
pub use query::QueryMetrics;

use std::net::SocketAddr;
use std::sync::OnceLock;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

use crate::config::MetricsConfig;
use crate::error::{AnalyticsError, Result};

static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Installs the Prometheus exporter when `listen_addr` is configured.
///
/// Idempotent; returns `Ok(false)` when no exporter was requested.
pub fn init_metrics(config: &MetricsConfig) -> Result<bool> {
    let Some(raw) = config.listen_addr.as_deref() else {
        return Ok(false);
    };
    if let Some(addr) = INSTALLED.get() {
        warn!("Prometheus exporter already listening on {}", addr);
        return Ok(true);
    }

    let addr: SocketAddr = raw
        .parse()
        .map_err(|e| AnalyticsError::Config(format!("Invalid metrics addr '{}': {}", raw, e)))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| AnalyticsError::Config(format!("Failed to install Prometheus exporter: {}", e)))?;
    let _ = INSTALLED.set(addr);

    registry::register_all_metrics();
    info!("Prometheus exporter started at http://{}/metrics", addr);
    Ok(true)
}

/// Registration and documentation hooks for a metrics phase.
pub trait PhaseMetrics {
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}

/// Builds `ted_{phase}_{name}` metric names, with a `_total` suffix on counters.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("ted_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("ted_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
