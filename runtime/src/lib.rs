//! # Ticket Simulator Runtime
//!
//! Runs ticket-pool simulations on Tokio.
//!
//! ## Core Components
//!
//! - **Controller**: starts, stops and reports on one run per configuration
//! - **Workers**: vendors release tickets, customers retrieve them
//! - **Rate limiter**: per-worker fixed-interval pacing, cancellable mid-wait
//! - **Metrics**: Prometheus counters for releases, retrievals and backpressure
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use ticket_sim_core::{ConfigurationId, StartRequest, TicketConfiguration, WorkerCounts};
//! use ticket_sim_runtime::{SimulationController, SimulatorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = SimulationController::new(SimulatorConfig::from_env());
//!
//!     let config = TicketConfiguration::new(
//!         ConfigurationId::new(1),
//!         "Acme Events",
//!         "Summer Festival",
//!         100,
//!         10,
//!         Duration::from_millis(100),
//!         Duration::from_millis(150),
//!     );
//!     controller.start(StartRequest::new(config, WorkerCounts::new(2, 3)))?;
//!
//!     tokio::time::sleep(Duration::from_secs(1)).await;
//!     let status = controller.stop(ConfigurationId::new(1)).await;
//!     println!("{status:?}");
//!     Ok(())
//! }
//! ```

/// Controller configuration loaded from the environment
pub mod config;

/// Run lifecycle management
pub mod controller;

/// Prometheus metrics for observability
pub mod metrics;

/// Cancellable fixed-interval pacing
pub mod rate_limiter;

/// Vendor and customer workers
pub mod worker;

pub use config::{DEFAULT_LOG_FILTER, SimulatorConfig};
pub use controller::{RunHandle, SimulationController};
pub use rate_limiter::{Pace, RateLimiter};
pub use ticket_sim_core::SimulationError;
pub use worker::{WorkerContext, WorkerOutcome, WorkerRole, run_customer, run_vendor};
