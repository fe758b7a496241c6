//! Fluent builder for test configurations
//!
//! Defaults are small and fast so that a run completes within a few hundred
//! milliseconds; tests override only what they care about.

#![allow(clippy::module_name_repetitions)] // ConfigurationBuilder is the natural name

use std::time::Duration;
use ticket_sim_core::{ConfigurationId, StartRequest, TicketConfiguration, WorkerCounts};

/// Builder for [`TicketConfiguration`] and [`StartRequest`]
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use ticket_sim_testing::ConfigurationBuilder;
///
/// let request = ConfigurationBuilder::new(7)
///     .with_total_tickets(10)
///     .with_capacity(3)
///     .with_release_rate(Duration::from_millis(100))
///     .with_retrieval_rate(Duration::from_millis(150))
///     .with_workers(1, 1)
///     .request();
///
/// assert_eq!(request.configuration.total_tickets, 10);
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    id: ConfigurationId,
    total_tickets: u32,
    capacity: u32,
    release_rate: Duration,
    retrieval_rate: Duration,
    workers: WorkerCounts,
}

impl ConfigurationBuilder {
    /// Start from the defaults: 10 tickets, capacity 3, 10ms rates, one worker per role
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self {
            id: ConfigurationId::new(id),
            total_tickets: 10,
            capacity: 3,
            release_rate: Duration::from_millis(10),
            retrieval_rate: Duration::from_millis(10),
            workers: WorkerCounts::new(1, 1),
        }
    }

    /// Set the lifetime cap
    #[must_use]
    pub const fn with_total_tickets(mut self, total: u32) -> Self {
        self.total_tickets = total;
        self
    }

    /// Set the pool capacity
    #[must_use]
    pub const fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the vendor interval
    #[must_use]
    pub const fn with_release_rate(mut self, rate: Duration) -> Self {
        self.release_rate = rate;
        self
    }

    /// Set the customer interval
    #[must_use]
    pub const fn with_retrieval_rate(mut self, rate: Duration) -> Self {
        self.retrieval_rate = rate;
        self
    }

    /// Set the number of vendors and customers
    #[must_use]
    pub const fn with_workers(mut self, vendors: u32, customers: u32) -> Self {
        self.workers = WorkerCounts::new(vendors, customers);
        self
    }

    /// Build the configuration alone
    #[must_use]
    pub fn build(&self) -> TicketConfiguration {
        TicketConfiguration::new(
            self.id,
            "Test Vendor",
            "Test Event",
            self.total_tickets,
            self.capacity,
            self.release_rate,
            self.retrieval_rate,
        )
    }

    /// Build a start request with the configured worker counts
    #[must_use]
    pub fn request(&self) -> StartRequest {
        StartRequest::new(self.build(), self.workers)
    }
}
