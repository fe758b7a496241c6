//! # Ticket Simulator Core
//!
//! Domain types for the ticket release simulator.
//!
//! A simulation models a bounded producer-consumer system: vendors release
//! tickets into a shared pool at a configured interval, up to a capacity
//! ceiling, while customers withdraw tickets from the same pool at their own
//! interval, until the lifetime ticket cap is exhausted or the run is stopped.
//!
//! ## Core Concepts
//!
//! - **`TicketConfiguration`**: Validated description of one ticket type
//!   (lifetime cap, pool capacity, release and retrieval intervals)
//! - **`TicketPool`**: The bounded, thread-safe buffer shared by the workers of one run
//! - **`PoolSnapshot`**: `{current, released, retrieved}` counters published on every change
//! - **`RunState`**: `Running`, `Stopped` or `Completed`
//! - **Environment**: Injected dependencies such as the [`environment::Clock`]
//!
//! This crate does not spawn tasks. The runtime crate owns scheduling,
//! pacing and lifecycle; everything here is synchronous and cheap to test.
//!
//! ## Example
//!
//! ```
//! use ticket_sim_core::{AddOutcome, ConfigurationId, TicketConfiguration, TicketPool};
//! use std::time::Duration;
//!
//! let config = TicketConfiguration::new(
//!     ConfigurationId::new(1),
//!     "Acme Events",
//!     "Summer Festival",
//!     10,
//!     3,
//!     Duration::from_millis(100),
//!     Duration::from_millis(150),
//! );
//! config.validate()?;
//!
//! let pool = TicketPool::new(&config);
//! assert!(matches!(pool.try_add(), AddOutcome::Added(_)));
//! assert_eq!(pool.snapshot().current, 1);
//! # Ok::<(), ticket_sim_core::SimulationError>(())
//! ```

/// Ticket configuration and start request types
pub mod configuration;

/// The bounded ticket pool
pub mod pool;

/// Run state, snapshots and status reports
pub mod run;

/// Error types shared by the core and runtime crates
pub mod error {
    use crate::configuration::ConfigurationId;
    use thiserror::Error;

    /// Errors surfaced to callers of the simulation controller
    ///
    /// Pool-full and pool-empty conditions are not errors. Workers treat them
    /// as backpressure and retry on their next tick; they never reach callers.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum SimulationError {
        /// A run for this configuration is still active
        ///
        /// The caller must stop it first (or wait for it to complete).
        #[error("Simulation {0} is already running")]
        AlreadyRunning(ConfigurationId),

        /// No run was ever started for this configuration
        #[error("No simulation has been started for {0}")]
        UnknownRun(ConfigurationId),

        /// The configuration or worker counts were rejected before any worker spawned
        #[error("Invalid configuration: {0}")]
        InvalidConfiguration(String),
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// where they are needed. Currently this is only the clock used to stamp
/// run start and finish times.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use ticket_sim_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use configuration::{ConfigurationId, StartRequest, TicketConfiguration, WorkerCounts};
pub use error::SimulationError;
pub use pool::{AddOutcome, RemoveOutcome, TicketPool};
pub use run::{PoolSnapshot, RunState, RunStatus};
