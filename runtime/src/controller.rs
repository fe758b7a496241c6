//! Simulation lifecycle management.
//!
//! The [`SimulationController`] owns every run, keyed by configuration id.
//! Each run consists of one [`TicketPool`], its vendor and customer workers
//! (spawned on a `JoinSet`), and a supervisor task that owns that set.
//!
//! ```text
//!   start(id) ──► pool + workers ──► supervisor ── join_next ──┐
//!                                        ▲                     │ every worker reported
//!   stop(id) ── shutdown=true ───────────┘                     ▼
//!                                               lifecycle: Completed | Stopped
//! ```
//!
//! The supervisor reacts to each worker's terminal report as it arrives; the
//! controller never polls. `status` only reads the latest values from watch
//! channels and never awaits.

use crate::config::SimulatorConfig;
use crate::metrics::RunMetrics;
use crate::worker::{WorkerContext, WorkerOutcome, run_customer, run_vendor};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use ticket_sim_core::environment::{Clock, SystemClock};
use ticket_sim_core::{
    ConfigurationId, PoolSnapshot, RunState, RunStatus, SimulationError, StartRequest, TicketPool,
};
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// State published by a run's supervisor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Lifecycle {
    state: RunState,
    finished_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
    const RUNNING: Self = Self {
        state: RunState::Running,
        finished_at: None,
    };
}

/// Move a lifecycle to a terminal state unless it already is in one.
///
/// Returns `true` if this call made the transition.
fn finish(lifecycle: &watch::Sender<Lifecycle>, state: RunState, at: DateTime<Utc>) -> bool {
    let finished = lifecycle.send_if_modified(|current| {
        if current.state.is_terminal() {
            return false;
        }
        *current = Lifecycle {
            state,
            finished_at: Some(at),
        };
        true
    });

    if finished {
        match state {
            RunState::Completed => RunMetrics::record_completed(),
            RunState::Stopped => RunMetrics::record_stopped(),
            RunState::Running => {}
        }
    }
    finished
}

/// Bookkeeping for one run
struct RunEntry {
    started_at: DateTime<Utc>,
    lifecycle: Arc<watch::Sender<Lifecycle>>,
    snapshots: watch::Receiver<PoolSnapshot>,
    shutdown: watch::Sender<bool>,
    supervisor: Option<Supervisor>,
}

/// Supervisor task of a run and the trigger that makes it abort its workers
struct Supervisor {
    handle: JoinHandle<()>,
    force: oneshot::Sender<()>,
}

impl RunEntry {
    fn status(&self, id: ConfigurationId) -> RunStatus {
        let lifecycle = *self.lifecycle.borrow();
        RunStatus {
            id,
            state: lifecycle.state,
            snapshot: *self.snapshots.borrow(),
            started_at: self.started_at,
            finished_at: lifecycle.finished_at,
        }
    }

    fn is_running(&self) -> bool {
        !self.lifecycle.borrow().state.is_terminal()
    }
}

/// Handle to a started run
///
/// Cheap to clone; dropping it does not affect the run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    id: ConfigurationId,
    lifecycle: watch::Receiver<Lifecycle>,
    snapshots: watch::Receiver<PoolSnapshot>,
}

impl RunHandle {
    /// Configuration the run belongs to
    #[must_use]
    pub const fn id(&self) -> ConfigurationId {
        self.id
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> RunState {
        self.lifecycle.borrow().state
    }

    /// Latest pool snapshot
    #[must_use]
    pub fn snapshot(&self) -> PoolSnapshot {
        *self.snapshots.borrow()
    }

    /// Receiver notified after every successful pool operation
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PoolSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until the run is `Stopped` or `Completed`
    pub async fn wait(&mut self) -> RunState {
        match self.lifecycle.wait_for(|l| l.state.is_terminal()).await {
            Ok(lifecycle) => lifecycle.state,
            // The controller dropped the run without finishing it
            Err(_) => RunState::Stopped,
        }
    }
}

/// Owner of every simulation run
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use ticket_sim_core::{ConfigurationId, StartRequest, TicketConfiguration, WorkerCounts};
/// use ticket_sim_runtime::{SimulationController, SimulatorConfig};
///
/// # async fn example() -> Result<(), ticket_sim_core::SimulationError> {
/// let controller = SimulationController::new(SimulatorConfig::default());
/// let config = TicketConfiguration::new(
///     ConfigurationId::new(1), "Acme", "Gig", 10, 3,
///     Duration::from_millis(100), Duration::from_millis(150),
/// );
///
/// let mut run = controller.start(StartRequest::new(config, WorkerCounts::new(1, 1)))?;
/// let state = run.wait().await;
/// println!("{state}: {:?}", controller.status(run.id())?.snapshot);
/// # Ok(())
/// # }
/// ```
pub struct SimulationController {
    config: SimulatorConfig,
    clock: Arc<dyn Clock>,
    runs: Mutex<HashMap<ConfigurationId, RunEntry>>,
}

impl SimulationController {
    /// Create a controller using the system clock
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a controller with an injected clock
    #[must_use]
    pub fn with_clock(config: SimulatorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            runs: Mutex::new(HashMap::new()),
        }
    }

    fn lock_runs(&self) -> MutexGuard<'_, HashMap<ConfigurationId, RunEntry>> {
        // Entries are replaced wholesale, so a poisoned map is still consistent
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a run for the request's configuration.
    ///
    /// A previous run for the same id that is already `Stopped` or
    /// `Completed` is replaced.
    ///
    /// # Errors
    ///
    /// - [`SimulationError::InvalidConfiguration`] if the configuration or
    ///   worker counts are rejected; no worker is spawned
    /// - [`SimulationError::AlreadyRunning`] if a run for this id is active;
    ///   that run is left untouched
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self, request: StartRequest) -> Result<RunHandle, SimulationError> {
        request.validate()?;
        let id = request.id();

        let mut runs = self.lock_runs();
        if runs.get(&id).is_some_and(RunEntry::is_running) {
            warn!(run = %id, "Start rejected, simulation already running");
            return Err(SimulationError::AlreadyRunning(id));
        }

        let StartRequest {
            configuration,
            workers,
        } = request;

        let pool = Arc::new(TicketPool::new(&configuration));
        let snapshots = pool.subscribe();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (lifecycle_tx, lifecycle_rx) = watch::channel(Lifecycle::RUNNING);
        let lifecycle = Arc::new(lifecycle_tx);

        let mut tasks = JoinSet::new();
        for index in 0..workers.vendors {
            tasks.spawn(run_vendor(WorkerContext {
                run_id: id,
                index,
                pool: Arc::clone(&pool),
                period: configuration.ticket_release_rate,
                shutdown: shutdown_rx.clone(),
            }));
        }
        for index in 0..workers.customers {
            tasks.spawn(run_customer(WorkerContext {
                run_id: id,
                index,
                pool: Arc::clone(&pool),
                period: configuration.customer_retrieval_rate,
                shutdown: shutdown_rx.clone(),
            }));
        }
        // Workers hold the only pool references from here on
        drop(pool);

        let (force, forced) = oneshot::channel();
        let handle = tokio::spawn(supervise(
            id,
            tasks,
            forced,
            Arc::clone(&lifecycle),
            Arc::clone(&self.clock),
        ));

        RunMetrics::record_started();
        info!(
            run = %id,
            vendor = %configuration.vendor,
            title = %configuration.title,
            total_tickets = configuration.total_tickets,
            capacity = configuration.max_ticket_capacity,
            vendors = workers.vendors,
            customers = workers.customers,
            "Simulation started"
        );

        runs.insert(
            id,
            RunEntry {
                started_at: self.clock.now(),
                lifecycle,
                snapshots: snapshots.clone(),
                shutdown,
                supervisor: Some(Supervisor { handle, force }),
            },
        );

        Ok(RunHandle {
            id,
            lifecycle: lifecycle_rx,
            snapshots,
        })
    }

    /// Stop a run and wait for its workers to terminate.
    ///
    /// Returns the final status, or `None` if no run was ever started for
    /// `id`. Stopping a run that is already terminal changes nothing.
    /// Workers that do not exit within the configured stop timeout are
    /// aborted, so no worker outlives this call.
    pub async fn stop(&self, id: ConfigurationId) -> Option<RunStatus> {
        let (supervisor, lifecycle, mut lifecycle_rx) = {
            let mut runs = self.lock_runs();
            let entry = runs.get_mut(&id)?;
            if !entry.is_running() {
                return Some(entry.status(id));
            }
            entry.shutdown.send_replace(true);
            (
                entry.supervisor.take(),
                Arc::clone(&entry.lifecycle),
                entry.lifecycle.subscribe(),
            )
        };

        if let Some(Supervisor { mut handle, force }) = supervisor {
            info!(run = %id, "Stopping simulation");
            let joined = match tokio::time::timeout(self.config.stop_timeout, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        run = %id,
                        timeout = ?self.config.stop_timeout,
                        "Workers did not stop in time, aborting"
                    );
                    // The supervisor aborts and drains every worker before returning
                    let _ = force.send(());
                    handle.await
                }
            };
            if let Err(e) = joined {
                error!(run = %id, error = %e, "Supervisor task failed");
            }
            // No-op when the supervisor already published a terminal state
            finish(&lifecycle, RunState::Stopped, self.clock.now());
        }

        // Concurrent callers wait here for the caller that owns the supervisor
        let _ = lifecycle_rx.wait_for(|l| l.state.is_terminal()).await;
        self.status(id).ok()
    }

    /// Report the state and last snapshot of a run.
    ///
    /// Never waits on workers.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::UnknownRun`] if no run was ever started for `id`.
    pub fn status(&self, id: ConfigurationId) -> Result<RunStatus, SimulationError> {
        self.lock_runs()
            .get(&id)
            .map(|entry| entry.status(id))
            .ok_or(SimulationError::UnknownRun(id))
    }

    /// Subscribe to the snapshots of a run
    ///
    /// The receiver is notified after every successful add or remove.
    #[must_use]
    pub fn subscribe(&self, id: ConfigurationId) -> Option<watch::Receiver<PoolSnapshot>> {
        self.lock_runs().get(&id).map(|entry| entry.snapshots.clone())
    }

    /// Ids of every known run, in ascending order
    #[must_use]
    pub fn run_ids(&self) -> Vec<ConfigurationId> {
        let mut ids: Vec<_> = self.lock_runs().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of runs currently running
    #[must_use]
    pub fn active_runs(&self) -> usize {
        self.lock_runs().values().filter(|e| e.is_running()).count()
    }

    /// Stop every running simulation
    ///
    /// Returns the final status of each run that was stopped.
    pub async fn shutdown(&self) -> Vec<RunStatus> {
        let running: Vec<ConfigurationId> = self
            .lock_runs()
            .iter()
            .filter(|(_, entry)| entry.is_running())
            .map(|(id, _)| *id)
            .collect();

        info!(runs = running.len(), "Shutting down simulations");

        futures::future::join_all(running.into_iter().map(|id| self.stop(id)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

impl std::fmt::Debug for SimulationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationController")
            .field("config", &self.config)
            .field("runs", &self.lock_runs().len())
            .finish_non_exhaustive()
    }
}

/// Collect every worker's terminal report and publish the run's outcome.
///
/// When `forced` fires, the remaining workers are aborted and awaited, so
/// once this returns no worker of the run is alive.
async fn supervise(
    id: ConfigurationId,
    mut workers: JoinSet<WorkerOutcome>,
    mut forced: oneshot::Receiver<()>,
    lifecycle: Arc<watch::Sender<Lifecycle>>,
    clock: Arc<dyn Clock>,
) {
    let mut all_completed = true;
    let mut armed = true;

    loop {
        let joined = tokio::select! {
            result = &mut forced, if armed => {
                armed = false;
                if result.is_ok() {
                    warn!(run = %id, remaining = workers.len(), "Aborting workers");
                    workers.shutdown().await;
                    all_completed = false;
                }
                continue;
            }
            joined = workers.join_next() => joined,
        };
        let Some(joined) = joined else { break };

        match joined {
            Ok(outcome) => {
                debug!(
                    run = %id,
                    role = %outcome.role,
                    index = outcome.index,
                    state = %outcome.state,
                    operations = outcome.operations,
                    "Worker finished"
                );
                all_completed &= outcome.state == RunState::Completed;
            }
            Err(e) => {
                error!(run = %id, error = %e, "Worker task failed");
                all_completed = false;
            }
        }
    }

    let state = if all_completed {
        RunState::Completed
    } else {
        RunState::Stopped
    };

    if finish(&lifecycle, state, clock.now()) {
        info!(run = %id, state = %state, "Simulation finished");
    }
}
