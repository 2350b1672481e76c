// src/exec/backend.rs

//! Pluggable scheduler abstraction.
//!
//! The task runner hands jobs to a `TaskScheduler` instead of talking to
//! thread pools directly. Production code uses
//! [`ExecutionContext`](super::ExecutionContext); tests can provide an inline
//! scheduler that runs every job on the calling thread, which makes
//! propagation fully deterministic.

/// A unit of work submitted to one of the pools.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Trait abstracting where jobs run.
pub trait TaskScheduler: Send + Sync {
    /// Run on the fixed-size parallel pool.
    fn run_in_parallel(&self, job: Job);

    /// Run on the single-worker pool, in submission order.
    fn run_sequentially(&self, job: Job);

    /// Run on the pool reserved for short-running tasks.
    fn run_short(&self, job: Job);
}
