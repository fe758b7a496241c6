//! Vendor (producer) and customer (consumer) workers.
//!
//! Both workers follow the same loop: wait on their own [`RateLimiter`],
//! then attempt exactly one pool operation.
//!
//! ```text
//! Vendor:    Running ─tick─► try_add ─┬─ Added ──────────────► Running
//!                                     ├─ PoolFull ───────────► Running
//!                                     └─ LifetimeCapReached ─► Completed
//!
//! Customer:  Running ─tick─► try_remove ─┬─ Removed ─► Running
//!                                        ├─ Empty ───► Running
//!                                        └─ Exhausted ► Completed
//!
//! Either:    Running ─stop signal (even mid-wait)─► Stopped
//! ```
//!
//! Pool-full and pool-empty are backpressure, retried on the next tick.

use crate::metrics::PoolMetrics;
use crate::rate_limiter::{Pace, RateLimiter};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use ticket_sim_core::{AddOutcome, ConfigurationId, RemoveOutcome, RunState, TicketPool};
use tokio::sync::watch;
use tracing::{debug, trace};

/// Which side of the pool a worker sits on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    /// Releases tickets into the pool
    Vendor,
    /// Retrieves tickets from the pool
    Customer,
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vendor => write!(f, "vendor"),
            Self::Customer => write!(f, "customer"),
        }
    }
}

/// Terminal report of one worker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerOutcome {
    /// Vendor or customer
    pub role: WorkerRole,
    /// Index of the worker within its role
    pub index: u32,
    /// `Completed` or `Stopped`
    pub state: RunState,
    /// Successful pool operations performed by this worker
    pub operations: u32,
}

/// Everything a worker needs to run
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// Run the worker belongs to
    pub run_id: ConfigurationId,
    /// Index of the worker within its role
    pub index: u32,
    /// Pool shared with the other workers of the same run
    pub pool: Arc<TicketPool>,
    /// Interval between two attempts
    pub period: Duration,
    /// Stop signal of the run
    pub shutdown: watch::Receiver<bool>,
}

impl WorkerContext {
    const fn outcome(&self, role: WorkerRole, state: RunState, operations: u32) -> WorkerOutcome {
        WorkerOutcome {
            role,
            index: self.index,
            state,
            operations,
        }
    }
}

/// Release tickets until the lifetime cap is reached or the run is stopped
#[tracing::instrument(skip_all, name = "vendor", fields(run = %ctx.run_id, index = ctx.index))]
pub async fn run_vendor(ctx: WorkerContext) -> WorkerOutcome {
    let mut limiter = RateLimiter::new(ctx.period, ctx.shutdown.clone());
    let mut released = 0u32;

    loop {
        if limiter.wait().await == Pace::Cancelled {
            debug!(released, "Vendor stopped");
            return ctx.outcome(WorkerRole::Vendor, RunState::Stopped, released);
        }

        match ctx.pool.try_add() {
            AddOutcome::Added(snapshot) => {
                released += 1;
                PoolMetrics::record_release();
                debug!(
                    current = snapshot.current,
                    capacity = ctx.pool.capacity(),
                    released = snapshot.released,
                    "Released ticket"
                );
            }
            AddOutcome::PoolFull => {
                PoolMetrics::record_pool_full();
                trace!("Pool full, retrying next tick");
            }
            AddOutcome::LifetimeCapReached => {
                debug!(released, "Lifetime cap reached, vendor completed");
                return ctx.outcome(WorkerRole::Vendor, RunState::Completed, released);
            }
        }
    }
}

/// Retrieve tickets until the pool is exhausted or the run is stopped
#[tracing::instrument(skip_all, name = "customer", fields(run = %ctx.run_id, index = ctx.index))]
pub async fn run_customer(ctx: WorkerContext) -> WorkerOutcome {
    let mut limiter = RateLimiter::new(ctx.period, ctx.shutdown.clone());
    let mut purchased = 0u32;

    loop {
        if limiter.wait().await == Pace::Cancelled {
            debug!(purchased, "Customer stopped");
            return ctx.outcome(WorkerRole::Customer, RunState::Stopped, purchased);
        }

        match ctx.pool.try_remove() {
            RemoveOutcome::Removed(snapshot) => {
                purchased += 1;
                PoolMetrics::record_retrieval();
                debug!(
                    current = snapshot.current,
                    capacity = ctx.pool.capacity(),
                    retrieved = snapshot.retrieved,
                    "Purchased ticket"
                );
            }
            RemoveOutcome::Empty => {
                PoolMetrics::record_pool_empty();
                trace!("Pool empty, retrying next tick");
            }
            RemoveOutcome::Exhausted => {
                debug!(purchased, "Pool exhausted, customer completed");
                return ctx.outcome(WorkerRole::Customer, RunState::Completed, purchased);
            }
        }
    }
}
