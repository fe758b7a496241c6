//! # Ticket Simulator Testing
//!
//! Testing utilities and helpers for the ticket simulator.
//!
//! This crate provides:
//! - A fixed [`Clock`] for deterministic timestamps
//! - A fluent [`ConfigurationBuilder`]
//! - Snapshot assertions and tracing setup
//! - proptest strategies for configurations
//!
//! ## Example
//!
//! ```ignore
//! use ticket_sim_testing::{ConfigurationBuilder, assert_snapshot_invariants, init_test_tracing};
//! use ticket_sim_runtime::{SimulationController, SimulatorConfig};
//!
//! #[tokio::test]
//! async fn test_run_completes() {
//!     init_test_tracing();
//!     let builder = ConfigurationBuilder::new(1).with_total_tickets(5);
//!     let controller = SimulationController::new(SimulatorConfig::default());
//!
//!     let mut run = controller.start(builder.request()).unwrap();
//!     run.wait().await;
//!
//!     assert_snapshot_invariants(&run.snapshot(), &builder.build());
//! }
//! ```

use chrono::{DateTime, Utc};
use ticket_sim_core::environment::Clock;

mod configuration_builder;

pub use configuration_builder::ConfigurationBuilder;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ticket_sim_testing::mocks::FixedClock;
    /// use ticket_sim_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Assertions and setup shared by the integration tests
pub mod helpers {
    use ticket_sim_core::{PoolSnapshot, TicketConfiguration};

    /// Install a test-writer tracing subscriber honoring `RUST_LOG`
    ///
    /// Safe to call from every test; only the first call installs anything.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }

    /// Assert the counter relationships of a snapshot
    ///
    /// # Panics
    ///
    /// Panics with the offending snapshot if any of these fail:
    /// `current <= capacity`, `retrieved <= released <= total`,
    /// `current == released - retrieved`.
    #[allow(clippy::panic)] // Test code can panic
    pub fn assert_snapshot_invariants(snapshot: &PoolSnapshot, config: &TicketConfiguration) {
        if !snapshot.is_consistent(config.max_ticket_capacity, config.total_tickets) {
            panic!(
                "inconsistent snapshot {snapshot:?} for capacity {} and total {}",
                config.max_ticket_capacity, config.total_tickets
            );
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use std::time::Duration;
    use ticket_sim_core::{ConfigurationId, TicketConfiguration};

    /// Valid configurations with small limits and millisecond rates
    pub fn valid_configuration() -> impl Strategy<Value = TicketConfiguration> {
        (1u64..1000, 1u32..200, 1u32..20, 1u64..50, 1u64..50).prop_map(
            |(id, total, capacity, release, retrieval)| {
                TicketConfiguration::new(
                    ConfigurationId::new(id),
                    "Proptest Vendor",
                    "Proptest Event",
                    total,
                    capacity,
                    Duration::from_millis(release),
                    Duration::from_millis(retrieval),
                )
            },
        )
    }

    /// Configurations with at least one zero field
    pub fn invalid_configuration() -> impl Strategy<Value = TicketConfiguration> {
        (valid_configuration(), 0usize..4).prop_map(|(mut config, field)| {
            match field {
                0 => config.total_tickets = 0,
                1 => config.max_ticket_capacity = 0,
                2 => config.ticket_release_rate = Duration::ZERO,
                _ => config.customer_retrieval_rate = Duration::ZERO,
            }
            config
        })
    }
}

// Re-export commonly used items
pub use helpers::{assert_snapshot_invariants, init_test_tracing};
pub use mocks::{FixedClock, test_clock};
