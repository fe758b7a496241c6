//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the simulator:
//! - Ticket releases and retrievals
//! - Backpressure (pool full / pool empty ticks)
//! - Run lifecycle (started, completed, stopped, active)
//!
//! Workers and the controller record through the `metrics` facade, so nothing
//! is exported until a recorder is installed.
//!
//! # Example
//!
//! ```rust,no_run
//! use ticket_sim_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.serve()?;
//! // Scrape http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Installs the global Prometheus recorder and serves the exposition text over HTTP.
#[derive(Debug, Clone, Copy)]
pub struct MetricsServer {
    addr: SocketAddr,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address the exposition is served on
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Install the recorder and serve `/metrics` over HTTP on [`Self::addr`].
    ///
    /// The exporter runs as a background task on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if the listener cannot be bound or
    /// a global recorder is already installed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn serve(&self) -> Result<(), MetricsError> {
        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .build()
            .map_err(|e| MetricsError::Install(e.to_string()))?;
        metrics::set_global_recorder(recorder)
            .map_err(|e| MetricsError::Install(e.to_string()))?;
        register_metrics();

        tokio::spawn(async move {
            if exporter.await.is_err() {
                tracing::error!("Metrics exporter stopped");
            }
        });

        tracing::info!(addr = %self.addr, "Serving metrics");
        Ok(())
    }

    /// Address the exposition is served on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Pool Metrics
    describe_counter!(
        "ticket_sim_tickets_released_total",
        "Total number of tickets released into pools by vendors"
    );
    describe_counter!(
        "ticket_sim_tickets_retrieved_total",
        "Total number of tickets retrieved from pools by customers"
    );
    describe_counter!(
        "ticket_sim_pool_full_total",
        "Total number of vendor ticks rejected because the pool was at capacity"
    );
    describe_counter!(
        "ticket_sim_pool_empty_total",
        "Total number of customer ticks that found the pool empty"
    );

    // Run Metrics
    describe_counter!(
        "ticket_sim_runs_started_total",
        "Total number of simulation runs started"
    );
    describe_counter!(
        "ticket_sim_runs_completed_total",
        "Total number of simulation runs that drained their lifetime cap"
    );
    describe_counter!(
        "ticket_sim_runs_stopped_total",
        "Total number of simulation runs stopped before completion"
    );
    describe_gauge!(
        "ticket_sim_active_runs",
        "Number of simulation runs currently running"
    );
}

/// Pool metrics recorder.
pub struct PoolMetrics;

impl PoolMetrics {
    /// Record a released ticket.
    pub fn record_release() {
        counter!("ticket_sim_tickets_released_total").increment(1);
    }

    /// Record a retrieved ticket.
    pub fn record_retrieval() {
        counter!("ticket_sim_tickets_retrieved_total").increment(1);
    }

    /// Record a vendor tick that hit a full pool.
    pub fn record_pool_full() {
        counter!("ticket_sim_pool_full_total").increment(1);
    }

    /// Record a customer tick that hit an empty pool.
    pub fn record_pool_empty() {
        counter!("ticket_sim_pool_empty_total").increment(1);
    }
}

/// Run lifecycle metrics recorder.
pub struct RunMetrics;

impl RunMetrics {
    /// Record a started run.
    pub fn record_started() {
        counter!("ticket_sim_runs_started_total").increment(1);
        gauge!("ticket_sim_active_runs").increment(1.0);
    }

    /// Record a run that completed on its own.
    pub fn record_completed() {
        counter!("ticket_sim_runs_completed_total").increment(1);
        gauge!("ticket_sim_active_runs").decrement(1.0);
    }

    /// Record a run that was stopped.
    pub fn record_stopped() {
        counter!("ticket_sim_runs_stopped_total").increment(1);
        gauge!("ticket_sim_active_runs").decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_use_described_names() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            register_metrics();
            PoolMetrics::record_release();
            PoolMetrics::record_retrieval();
            PoolMetrics::record_pool_full();
            PoolMetrics::record_pool_empty();
            RunMetrics::record_started();
            RunMetrics::record_stopped();
        });

        let rendered = handle.render();
        assert!(rendered.contains("ticket_sim_tickets_released_total 1"));
        assert!(rendered.contains("ticket_sim_tickets_retrieved_total 1"));
        assert!(rendered.contains("ticket_sim_pool_full_total 1"));
        assert!(rendered.contains("ticket_sim_pool_empty_total 1"));
        assert!(rendered.contains("ticket_sim_runs_stopped_total 1"));
        assert!(rendered.contains("ticket_sim_active_runs"));
        assert!(rendered.contains(
            "# HELP ticket_sim_tickets_released_total Total number of tickets released"
        ));
    }

    #[test]
    fn test_metrics_server_addr() {
        let addr = SocketAddr::from(([127, 0, 0, 1], 9100));
        assert_eq!(MetricsServer::new(addr).addr(), addr);
    }
}
