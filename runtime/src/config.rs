//! Configuration for the simulation controller.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use ticket_sim_core::WorkerCounts;

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "ticket_sim=info,ticket_sim_runtime=info";

/// Controller configuration
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use ticket_sim_runtime::SimulatorConfig;
///
/// let config = SimulatorConfig::default()
///     .with_stop_timeout(Duration::from_secs(2));
/// assert_eq!(config.stop_timeout, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// How long `stop` waits for workers before aborting them
    pub stop_timeout: Duration,
    /// Worker counts used when a caller does not supply any
    pub default_workers: WorkerCounts,
    /// Address the Prometheus exposition is served on
    pub metrics_addr: SocketAddr,
    /// Tracing filter directive (trace, debug, info, warn, error, or per-target)
    pub log_filter: String,
}

impl SimulatorConfig {
    /// Set the stop timeout
    #[must_use]
    pub const fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `TICKET_SIM_STOP_TIMEOUT_MS` | 5000 |
    /// | `TICKET_SIM_VENDORS` | 1 |
    /// | `TICKET_SIM_CUSTOMERS` | 1 |
    /// | `TICKET_SIM_METRICS_ADDR` | `0.0.0.0:9090` |
    /// | `RUST_LOG` | [`DEFAULT_LOG_FILTER`] |
    ///
    /// Missing or unparsable values fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        Self {
            stop_timeout: parsed("TICKET_SIM_STOP_TIMEOUT_MS")
                .map_or(defaults.stop_timeout, Duration::from_millis),
            default_workers: WorkerCounts {
                vendors: parsed("TICKET_SIM_VENDORS")
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or(defaults.default_workers.vendors),
                customers: parsed("TICKET_SIM_CUSTOMERS")
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or(defaults.default_workers.customers),
            },
            metrics_addr: lookup("TICKET_SIM_METRICS_ADDR")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.metrics_addr),
            log_filter: lookup("RUST_LOG").unwrap_or(defaults.log_filter),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(5),
            default_workers: WorkerCounts::default(),
            metrics_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9090)),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}
