//! The bounded ticket pool shared by the workers of one run.
//!
//! All mutations go through a single `std::sync::Mutex`. Adding and removing
//! both touch `current`, so one critical section covers both; it only checks
//! and updates counters and never blocks on anything else.
//!
//! ```text
//!   vendors ──try_add──►  ┌───────────────────────┐  ──try_remove──► customers
//!                         │ [#4 #5 #6]   cap = 3  │
//!                         │ released  = 6         │
//!                         │ retrieved = 3         │
//!                         └───────────┬───────────┘
//!                                     │ watch::Sender<PoolSnapshot>
//!                                     ▼
//!                                 observers
//! ```
//!
//! Every successful mutation publishes the new [`PoolSnapshot`] on a watch
//! channel while the lock is still held, so observers never see snapshots
//! out of mutation order.

use crate::configuration::TicketConfiguration;
use crate::run::PoolSnapshot;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Result of [`TicketPool::try_add`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// A ticket was released; carries the snapshot after the change
    Added(PoolSnapshot),
    /// The pool is at capacity; a customer will free space
    PoolFull,
    /// Every ticket of the lifetime cap has been released
    LifetimeCapReached,
}

impl AddOutcome {
    /// Whether a ticket was added
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Added(_))
    }
}

/// Result of [`TicketPool::try_remove`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// A ticket was retrieved; carries the snapshot after the change
    Removed(PoolSnapshot),
    /// Nothing to take right now, but vendors may still release more
    Empty,
    /// Nothing to take and nothing will ever arrive again
    Exhausted,
}

impl RemoveOutcome {
    /// Whether a ticket was removed
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Removed(_))
    }
}

/// Upper bound on the buffer preallocated for a new pool
const INITIAL_BUFFER: u32 = 1024;

#[derive(Debug)]
struct PoolInner {
    /// Ticket numbers currently held, oldest first
    tickets: VecDeque<u32>,
    released: u32,
    retrieved: u32,
}

impl PoolInner {
    #[allow(clippy::cast_possible_truncation)] // bounded by capacity (u32)
    fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            current: self.tickets.len() as u32,
            released: self.released,
            retrieved: self.retrieved,
        }
    }
}

/// Bounded, thread-safe ticket buffer
///
/// Tickets are numbered `1..=total_tickets` in release order and handed out
/// first-in first-out. Share it between workers through an `Arc`.
///
/// # Example
///
/// ```
/// use ticket_sim_core::{ConfigurationId, RemoveOutcome, TicketConfiguration, TicketPool};
/// use std::time::Duration;
///
/// let config = TicketConfiguration::new(
///     ConfigurationId::new(1), "Acme", "Gig", 1, 1,
///     Duration::from_millis(10), Duration::from_millis(10),
/// );
/// let pool = TicketPool::new(&config);
///
/// assert_eq!(pool.try_remove(), RemoveOutcome::Empty);
/// assert!(pool.try_add().is_success());
/// assert!(pool.try_remove().is_success());
/// assert_eq!(pool.try_remove(), RemoveOutcome::Exhausted);
/// ```
#[derive(Debug)]
pub struct TicketPool {
    inner: Mutex<PoolInner>,
    capacity: u32,
    total_tickets: u32,
    snapshots: watch::Sender<PoolSnapshot>,
}

impl TicketPool {
    /// Create an empty pool sized from a configuration
    #[must_use]
    pub fn new(config: &TicketConfiguration) -> Self {
        Self::with_limits(config.max_ticket_capacity, config.total_tickets)
    }

    /// Create an empty pool from raw limits
    #[must_use]
    pub fn with_limits(capacity: u32, total_tickets: u32) -> Self {
        let (snapshots, _) = watch::channel(PoolSnapshot::default());
        let preallocate = capacity.min(total_tickets).min(INITIAL_BUFFER) as usize;
        Self {
            inner: Mutex::new(PoolInner {
                tickets: VecDeque::with_capacity(preallocate),
                released: 0,
                retrieved: 0,
            }),
            capacity,
            total_tickets,
            snapshots,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        // Counters are updated together after all checks, so a poisoned
        // guard still holds a consistent state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Release one ticket into the pool
    ///
    /// Succeeds iff the pool is below capacity and the lifetime cap has not
    /// been reached. When both limits apply, `LifetimeCapReached` is reported
    /// since it is the terminal one.
    pub fn try_add(&self) -> AddOutcome {
        let mut inner = self.lock();

        if inner.released >= self.total_tickets {
            return AddOutcome::LifetimeCapReached;
        }
        if inner.tickets.len() >= self.capacity as usize {
            return AddOutcome::PoolFull;
        }

        inner.released += 1;
        let ticket = inner.released;
        inner.tickets.push_back(ticket);

        let snapshot = inner.snapshot();
        self.snapshots.send_replace(snapshot);
        AddOutcome::Added(snapshot)
    }

    /// Retrieve one ticket from the pool
    pub fn try_remove(&self) -> RemoveOutcome {
        let mut inner = self.lock();

        if inner.tickets.pop_front().is_none() {
            return if inner.released >= self.total_tickets {
                RemoveOutcome::Exhausted
            } else {
                RemoveOutcome::Empty
            };
        }
        inner.retrieved += 1;

        let snapshot = inner.snapshot();
        self.snapshots.send_replace(snapshot);
        RemoveOutcome::Removed(snapshot)
    }

    /// Current counters
    #[must_use]
    pub fn snapshot(&self) -> PoolSnapshot {
        self.lock().snapshot()
    }

    /// Whether every ticket has been released and retrieved
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        let inner = self.lock();
        inner.tickets.is_empty() && inner.released >= self.total_tickets
    }

    /// Subscribe to the snapshot published after every successful mutation
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PoolSnapshot> {
        self.snapshots.subscribe()
    }

    /// Maximum number of tickets held at once
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_add_until_full() {
        let pool = TicketPool::with_limits(2, 10);

        assert!(pool.try_add().is_success());
        assert!(pool.try_add().is_success());
        assert_eq!(pool.try_add(), AddOutcome::PoolFull);

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.current, 2);
        assert_eq!(snapshot.released, 2);
        assert_eq!(snapshot.retrieved, 0);
    }

    #[test]
    fn test_lifetime_cap_wins_over_full() {
        let pool = TicketPool::with_limits(2, 2);
        pool.try_add();
        pool.try_add();
        assert_eq!(pool.try_add(), AddOutcome::LifetimeCapReached);
    }

    #[test]
    fn test_remove_empty_vs_exhausted() {
        let pool = TicketPool::with_limits(3, 1);
        assert_eq!(pool.try_remove(), RemoveOutcome::Empty);
        assert!(!pool.is_exhausted());

        pool.try_add();
        assert_eq!(
            pool.try_remove(),
            RemoveOutcome::Removed(PoolSnapshot {
                current: 0,
                released: 1,
                retrieved: 1,
            })
        );
        assert_eq!(pool.try_remove(), RemoveOutcome::Exhausted);
        assert!(pool.is_exhausted());
    }

    #[test]
    fn test_failed_operations_have_no_side_effect() {
        let pool = TicketPool::with_limits(1, 5);
        pool.try_add();
        let before = pool.snapshot();

        assert_eq!(pool.try_add(), AddOutcome::PoolFull);
        assert_eq!(pool.snapshot(), before);
    }

    #[test]
    fn test_tickets_leave_in_release_order() {
        let pool = TicketPool::with_limits(3, 3);
        for _ in 0..3 {
            pool.try_add();
        }
        let order: Vec<u32> = pool.lock().tickets.iter().copied().collect();
        assert_eq!(order, vec![1, 2, 3]);

        pool.try_remove();
        let order: Vec<u32> = pool.lock().tickets.iter().copied().collect();
        assert_eq!(order, vec![2, 3]);
    }

    #[test]
    fn test_snapshots_published_on_success_only() {
        let pool = TicketPool::with_limits(1, 5);
        let mut rx = pool.subscribe();
        assert!(!rx.has_changed().unwrap());

        pool.try_remove();
        assert!(!rx.has_changed().unwrap());

        pool.try_add();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().released, 1);

        pool.try_add();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_concurrent_access_loses_no_updates() {
        let pool = Arc::new(TicketPool::with_limits(1, 2_000));

        let producers: Vec<_> = (0..5)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let mut added = 0u32;
                    loop {
                        match pool.try_add() {
                            AddOutcome::Added(s) => {
                                assert!(s.current <= 1);
                                added += 1;
                            }
                            AddOutcome::PoolFull => thread::yield_now(),
                            AddOutcome::LifetimeCapReached => return added,
                        }
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..5)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let mut removed = 0u32;
                    loop {
                        match pool.try_remove() {
                            RemoveOutcome::Removed(s) => {
                                assert!(s.current <= 1);
                                removed += 1;
                            }
                            RemoveOutcome::Empty => thread::yield_now(),
                            RemoveOutcome::Exhausted => return removed,
                        }
                    }
                })
            })
            .collect();

        let added: u32 = producers.into_iter().map(|h| h.join().unwrap()).sum();
        let removed: u32 = consumers.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(added, 2_000);
        assert_eq!(removed, 2_000);
        assert_eq!(
            pool.snapshot(),
            PoolSnapshot {
                current: 0,
                released: 2_000,
                retrieved: 2_000,
            }
        );
    }

    proptest! {
        #[test]
        fn prop_invariants_hold_for_any_sequence(
            capacity in 1u32..8,
            total in 1u32..30,
            ops in proptest::collection::vec(any::<bool>(), 0..200),
        ) {
            let pool = TicketPool::with_limits(capacity, total);
            for add in ops {
                if add {
                    pool.try_add();
                } else {
                    pool.try_remove();
                }
                let s = pool.snapshot();
                prop_assert!(s.is_consistent(capacity, total));
            }
        }
    }
}
