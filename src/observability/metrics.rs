//! Prometheus metrics for purge runs.
//!
//! Every recording function is a no-op unless the `prometheus` feature is
//! compiled in and [`init_metrics`] installed a recorder.

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Buckets for `purge_run_duration_seconds`. Runs range from sub-second
/// empty scans to multi-hour sweeps.
#[cfg(feature = "prometheus")]
const RUN_DURATION_BUCKETS: &[f64] = &[
    0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0, 14400.0,
];

/// Install the Prometheus recorder and start its scrape listener.
///
/// Must be called from within a Tokio runtime.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen)
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full("purge_run_duration_seconds".to_string()),
            RUN_DURATION_BUCKETS,
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?
        .install()
        .map_err(MetricsError::Install)?;

    tracing::info!(listen = %config.listen, "Prometheus metrics endpoint started");
    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if config.enabled {
        tracing::warn!(
            "Metrics are enabled in config but the 'prometheus' feature is not compiled"
        );
    }
    Ok(())
}

/// Record a finished (or aborted) purge run.
///
/// # Arguments
/// * `status` - `completed`, `aborted` or `dry_run`
/// * `duration_secs` - Wall time from scan to the last batch
pub fn record_purge_run(status: &str, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        counter!("purge_runs_total", "status" => status.to_string()).increment(1);
        histogram!("purge_run_duration_seconds").record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (status, duration_secs);
    }
}

/// Record the outcome of one batch (`succeeded`, `failed` or `skipped`).
pub fn record_purge_batch(outcome: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("purge_batches_total", "outcome" => outcome.to_string()).increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = outcome;
    }
}

/// Record customers removed by a committed batch.
pub fn record_customers_purged(count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!("purge_customers_deleted_total").increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = count;
    }
}

/// Record a failed batch by failure kind (`processing` or `commit`).
pub fn record_purge_batch_failure(kind: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("purge_batch_failures_total", "kind" => kind.to_string()).increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = kind;
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
