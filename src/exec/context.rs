// src/exec/context.rs

//! Thread-pool execution context.
//!
//! Three pools, all backed by Tokio's blocking thread pool:
//! - parallel: at most `parallel_workers` jobs at a time,
//! - sequential: one worker loop fed by an unbounded channel, one job at a
//!   time in submission order,
//! - short: at most `short_workers` short-running jobs at a time.
//!
//! The context is created explicitly inside a Tokio runtime and shut down
//! explicitly; nothing here is global.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::{AutomationError, Result};
use crate::exec::backend::{Job, TaskScheduler};

/// Worker counts for the bounded pools. The sequential pool always has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizes {
    pub parallel_workers: usize,
    pub short_workers: usize,
}

impl Default for PoolSizes {
    fn default() -> Self {
        Self {
            parallel_workers: 4,
            short_workers: 2,
        }
    }
}

#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count when dropped, whether the job ran,
/// panicked, or was discarded because a pool closed.
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn new(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(in_flight))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

pub struct ExecutionContext {
    handle: Handle,
    sizes: PoolSizes,
    parallel: Arc<Semaphore>,
    short: Arc<Semaphore>,
    sequential_tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    sequential_worker: Mutex<Option<JoinHandle<()>>>,
    in_flight: Arc<InFlight>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("sizes", &self.sizes)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// Create the pools on the current Tokio runtime.
    pub fn new(sizes: PoolSizes) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| AutomationError::NoRuntime)?;

        if sizes.parallel_workers == 0 || sizes.short_workers == 0 {
            return Err(AutomationError::ConfigError(format!(
                "pool sizes must be >= 1 (parallel_workers = {}, short_workers = {})",
                sizes.parallel_workers, sizes.short_workers
            )));
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let worker = handle.spawn(async move {
            debug!("sequential worker started");

            while let Some(job) = rx.recv().await {
                if let Err(e) = tokio::task::spawn_blocking(job).await {
                    error!(error = %e, "sequential job aborted");
                }
            }

            debug!("sequential worker finished (channel closed)");
        });

        info!(
            parallel_workers = sizes.parallel_workers,
            short_workers = sizes.short_workers,
            "execution context started"
        );

        Ok(Self {
            handle,
            sizes,
            parallel: Arc::new(Semaphore::new(sizes.parallel_workers)),
            short: Arc::new(Semaphore::new(sizes.short_workers)),
            sequential_tx: Mutex::new(Some(tx)),
            sequential_worker: Mutex::new(Some(worker)),
            in_flight: Arc::new(InFlight::default()),
        })
    }

    pub fn sizes(&self) -> PoolSizes {
        self.sizes
    }

    /// Jobs submitted but not finished yet, across all pools.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Wait until every submitted job, including follower jobs submitted by
    /// running jobs, has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting work and wait for the sequential worker to drain.
    ///
    /// Jobs submitted after shutdown are dropped with a warning.
    pub async fn shutdown(&self) {
        self.parallel.close();
        self.short.close();
        drop(lock(&self.sequential_tx).take());

        let worker = lock(&self.sequential_worker).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "sequential worker ended abnormally");
            }
        }

        info!("execution context shut down");
    }

    fn spawn_bounded(&self, pool: &'static str, semaphore: &Arc<Semaphore>, job: Job) {
        let guard = InFlightGuard::new(&self.in_flight);
        let semaphore = Arc::clone(semaphore);

        self.handle.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(pool, "pool closed; dropping job");
                    drop(guard);
                    return;
                }
            };

            let job: Job = Box::new(move || {
                let _guard = guard;
                job();
            });

            if let Err(e) = tokio::task::spawn_blocking(job).await {
                error!(pool, error = %e, "job aborted");
            }
        });
    }
}

impl TaskScheduler for ExecutionContext {
    fn run_in_parallel(&self, job: Job) {
        self.spawn_bounded("parallel", &self.parallel, job);
    }

    fn run_sequentially(&self, job: Job) {
        let guard = InFlightGuard::new(&self.in_flight);
        let job: Job = Box::new(move || {
            let _guard = guard;
            job();
        });

        match lock(&self.sequential_tx).as_ref() {
            Some(tx) => {
                if tx.send(job).is_err() {
                    warn!(pool = "sequential", "pool closed; dropping job");
                }
            }
            None => warn!(pool = "sequential", "pool closed; dropping job"),
        }
    }

    fn run_short(&self, job: Job) {
        self.spawn_bounded("short", &self.short, job);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
