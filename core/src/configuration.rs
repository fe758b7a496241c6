//! Ticket configuration and start request types.
//!
//! A [`TicketConfiguration`] is the validated description of one ticket type
//! as stored by the external layer. It is identified by a [`ConfigurationId`],
//! which is also the key the controller uses for the run.
//!
//! The number of vendor and customer workers is not part of the stored
//! configuration; it is supplied per start through [`WorkerCounts`].

use crate::error::SimulationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier of a ticket configuration (and of its simulation run)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationId(u64);

impl ConfigurationId {
    /// Create a `ConfigurationId` from its numeric value
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration of one ticket type
///
/// Serialised with the camelCase field names used by the REST layer.
/// Both rates are intervals between two actions of a single worker and are
/// carried over the wire as integer milliseconds.
///
/// `max_ticket_capacity` may exceed `total_tickets`; the pool then simply
/// never fills up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketConfiguration {
    /// Configuration identifier
    pub id: ConfigurationId,
    /// Name of the vendor releasing the tickets
    pub vendor: String,
    /// Event title
    pub title: String,
    /// Lifetime cap on tickets ever released
    pub total_tickets: u32,
    /// Maximum number of tickets held by the pool at once
    pub max_ticket_capacity: u32,
    /// Interval between two releases of one vendor
    #[serde(with = "duration_ms")]
    pub ticket_release_rate: Duration,
    /// Interval between two retrievals of one customer
    #[serde(with = "duration_ms")]
    pub customer_retrieval_rate: Duration,
}

impl TicketConfiguration {
    /// Create a new configuration
    ///
    /// The result is not validated; call [`TicketConfiguration::validate`]
    /// (the controller does so on every start).
    #[must_use]
    pub fn new(
        id: ConfigurationId,
        vendor: impl Into<String>,
        title: impl Into<String>,
        total_tickets: u32,
        max_ticket_capacity: u32,
        ticket_release_rate: Duration,
        customer_retrieval_rate: Duration,
    ) -> Self {
        Self {
            id,
            vendor: vendor.into(),
            title: title.into(),
            total_tickets,
            max_ticket_capacity,
            ticket_release_rate,
            customer_retrieval_rate,
        }
    }

    /// Check the numeric fields
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidConfiguration`] if the lifetime cap,
    /// the capacity or either interval is zero.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.total_tickets == 0 {
            return Err(invalid(self.id, "totalTickets must be greater than 0"));
        }
        if self.max_ticket_capacity == 0 {
            return Err(invalid(self.id, "maxTicketCapacity must be greater than 0"));
        }
        if self.ticket_release_rate.is_zero() {
            return Err(invalid(self.id, "ticketReleaseRate must be greater than 0"));
        }
        if self.customer_retrieval_rate.is_zero() {
            return Err(invalid(
                self.id,
                "customerRetrievalRate must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn invalid(id: ConfigurationId, reason: &str) -> SimulationError {
    SimulationError::InvalidConfiguration(format!("configuration {id}: {reason}"))
}

/// Number of workers to spawn for one run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCounts {
    /// Number of vendor (producer) workers
    pub vendors: u32,
    /// Number of customer (consumer) workers
    pub customers: u32,
}

impl WorkerCounts {
    /// Create worker counts
    #[must_use]
    pub const fn new(vendors: u32, customers: u32) -> Self {
        Self { vendors, customers }
    }

    /// Total number of workers
    #[must_use]
    pub const fn total(self) -> u32 {
        self.vendors.saturating_add(self.customers)
    }

    /// Check that both sides have at least one worker
    ///
    /// A run without vendors could never complete and a run without
    /// customers could never drain its pool.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidConfiguration`] if either count is zero.
    pub fn validate(self) -> Result<(), SimulationError> {
        if self.vendors == 0 {
            return Err(SimulationError::InvalidConfiguration(
                "at least one vendor worker is required".to_string(),
            ));
        }
        if self.customers == 0 {
            return Err(SimulationError::InvalidConfiguration(
                "at least one customer worker is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for WorkerCounts {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Everything the controller needs to start one run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    /// The ticket configuration to simulate
    pub configuration: TicketConfiguration,
    /// Worker counts for this run
    pub workers: WorkerCounts,
}

impl StartRequest {
    /// Create a start request
    #[must_use]
    pub const fn new(configuration: TicketConfiguration, workers: WorkerCounts) -> Self {
        Self {
            configuration,
            workers,
        }
    }

    /// Identifier of the run this request starts
    #[must_use]
    pub const fn id(&self) -> ConfigurationId {
        self.configuration.id
    }

    /// Validate both the configuration and the worker counts
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidConfiguration`] on the first rejected field.
    pub fn validate(&self) -> Result<(), SimulationError> {
        self.configuration.validate()?;
        self.workers.validate()
    }
}

/// Serde adapter for `Duration` as integer milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        // Intervals beyond u64 milliseconds are not meaningful here
        #[allow(clippy::cast_possible_truncation)]
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
