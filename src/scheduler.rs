//! Shared worker pool for fitness evaluation.
//!
//! Every [`Individual`] submits exactly one task when it is created and
//! returns immediately; its fitness cell moves `Pending -> Computing ->
//! Ready`. Readers block only on their own cell. The pool keeps a registry
//! of outstanding tasks so that [`FitnessScheduler::shutdown`] can release
//! anyone still waiting.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, warn};

use crate::error::SchedulerError;
use crate::individual::Individual;
use crate::{Evaluator, Genotype};

/// Lifecycle of one individual's fitness value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FitnessState {
    Pending,
    Computing,
    Ready(f64),
    /// The pool shut down before the task ran.
    Abandoned,
    /// The evaluator panicked.
    Panicked,
}

impl FitnessState {
    pub fn is_settled(self) -> bool {
        !matches!(self, FitnessState::Pending | FitnessState::Computing)
    }
}

/// Write-once fitness slot with a blocking read.
#[derive(Debug)]
pub struct FitnessCell {
    state: Mutex<FitnessState>,
    settled: Condvar,
}

impl Default for FitnessCell {
    fn default() -> Self {
        Self::new()
    }
}

impl FitnessCell {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FitnessState::Pending),
            settled: Condvar::new(),
        }
    }

    pub fn state(&self) -> FitnessState {
        *self.state.lock()
    }

    /// Blocks until the value is settled and returns the final state.
    pub fn wait(&self) -> FitnessState {
        let mut state = self.state.lock();
        while !state.is_settled() {
            self.settled.wait(&mut state);
        }
        *state
    }

    fn begin(&self) -> bool {
        let mut state = self.state.lock();
        if *state == FitnessState::Pending {
            *state = FitnessState::Computing;
            true
        } else {
            false
        }
    }

    fn settle(&self, outcome: FitnessState) {
        let mut state = self.state.lock();
        if !state.is_settled() {
            *state = outcome;
            self.settled.notify_all();
        }
    }
}

/// Bounded pool shared by every individual of a run.
pub struct FitnessScheduler {
    pool: ThreadPool,
    registry: Arc<DashMap<u64, Arc<FitnessCell>>>,
    shutdown: Arc<AtomicBool>,
    workers: usize,
}

impl FitnessScheduler {
    /// One worker per available execution unit.
    pub fn new() -> Result<Self, SchedulerError> {
        let workers = std::thread::available_parallelism().map_or(1, usize::from);
        Self::with_workers(workers)
    }

    pub fn with_workers(workers: usize) -> Result<Self, SchedulerError> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("fitness-{i}"))
            .build()?;
        debug!(workers, "fitness pool started");
        Ok(Self {
            pool,
            registry: Arc::new(DashMap::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of submitted tasks that have not finished.
    pub fn outstanding(&self) -> usize {
        self.registry.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Queues `job` and returns at once. Its result lands in `cell`.
    pub fn submit<F>(&self, id: u64, cell: Arc<FitnessCell>, job: F)
    where
        F: FnOnce() -> f64 + Send + 'static,
    {
        if self.is_shut_down() {
            cell.settle(FitnessState::Abandoned);
            return;
        }
        // register before spawning so completion can never precede insertion
        self.registry.insert(id, Arc::clone(&cell));
        let registry = Arc::clone(&self.registry);
        let shutdown = Arc::clone(&self.shutdown);
        self.pool.spawn(move || {
            if shutdown.load(Ordering::Acquire) || !cell.begin() {
                cell.settle(FitnessState::Abandoned);
            } else {
                match catch_unwind(AssertUnwindSafe(job)) {
                    Ok(value) => cell.settle(FitnessState::Ready(value)),
                    Err(_) => {
                        error!(individual = id, "fitness evaluation panicked");
                        cell.settle(FitnessState::Panicked);
                    }
                }
            }
            registry.remove(&id);
        });
    }

    /// Stops accepting work and abandons everything still queued without
    /// waiting for it. Tasks already computing may still finish, but their
    /// readers are released as abandoned.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let pending = self.registry.len();
        for entry in self.registry.iter() {
            entry.value().settle(FitnessState::Abandoned);
        }
        self.registry.clear();
        if pending > 0 {
            warn!(pending, "fitness pool shut down with outstanding tasks");
        }
    }
}

/// Process-wide resources of one run: the worker pool, the id counter and
/// the fitness function. Shared by the population and every individual it
/// creates; [`EvolutionContext::cleanup`] tears the pool down at the end.
pub struct EvolutionContext<G: Genotype> {
    scheduler: FitnessScheduler,
    evaluator: Arc<dyn Evaluator<G>>,
    next_id: AtomicU64,
}

impl<G: Genotype> EvolutionContext<G> {
    pub fn new<E: Evaluator<G> + 'static>(evaluator: E) -> Result<Self, SchedulerError> {
        Ok(Self::with_scheduler(FitnessScheduler::new()?, evaluator))
    }

    pub fn with_scheduler<E: Evaluator<G> + 'static>(scheduler: FitnessScheduler, evaluator: E) -> Self {
        Self {
            scheduler,
            evaluator: Arc::new(evaluator),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn scheduler(&self) -> &FitnessScheduler {
        &self.scheduler
    }

    pub fn evaluator(&self) -> &Arc<dyn Evaluator<G>> {
        &self.evaluator
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Wraps `genotype` in a new individual whose fitness starts computing
    /// in the background.
    pub fn spawn(&self, genotype: G) -> Arc<Individual<G>> {
        Individual::new(self, genotype)
    }

    /// Shuts the pool down. Fitness reads afterwards are not meaningful.
    pub fn cleanup(&self) {
        self.scheduler.shutdown();
    }
}
