// src/exec/mod.rs

//! Execution layer.
//!
//! This module runs graph nodes on thread pools and feeds their outcomes to
//! followers.
//!
//! - [`backend`] provides the `TaskScheduler` trait the runner submits jobs
//!   through, so tests can replace the pools with an inline scheduler.
//! - [`context`] owns the parallel, sequential and short-running pools.
//! - [`task_runner`] executes one node and submits the followers it fed.
//! - [`dispatcher`] submits the roots of an instruction set per run mode.
//! - [`progress`] prints user-facing progress lines.

pub mod backend;
pub mod context;
pub mod dispatcher;
pub mod progress;
pub mod task_runner;

pub use backend::{Job, TaskScheduler};
pub use context::{ExecutionContext, PoolSizes};
pub use dispatcher::{DispatchSummary, dispatch};
pub use progress::{ProgressSink, SilentProgress, StdoutProgress};
pub use task_runner::TaskRunner;
