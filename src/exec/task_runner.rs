// src/exec/task_runner.rs

//! Runs graph nodes on a [`TaskScheduler`] and pushes their outcomes to
//! followers.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::exec::backend::TaskScheduler;
use crate::exec::progress::ProgressSink;
use crate::graph::{CancelRequest, NodeId, TaskGraph, propagate};
use crate::task::TaskOutcome;
use crate::types::{ExecutionMode, TaskKind};

/// Handle shared by every job of one run: the graph, where jobs go, and who
/// hears about progress.
pub struct TaskRunner<V> {
    graph: Arc<TaskGraph<V>>,
    scheduler: Arc<dyn TaskScheduler>,
    progress: Arc<dyn ProgressSink>,
}

impl<V> Clone for TaskRunner<V> {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            scheduler: Arc::clone(&self.scheduler),
            progress: Arc::clone(&self.progress),
        }
    }
}

impl<V> fmt::Debug for TaskRunner<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("nodes", &self.graph.len())
            .finish_non_exhaustive()
    }
}

impl<V: Clone + Send + Sync + 'static> TaskRunner<V> {
    pub fn new(
        graph: Arc<TaskGraph<V>>,
        scheduler: Arc<dyn TaskScheduler>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            graph,
            scheduler,
            progress,
        }
    }

    pub fn graph(&self) -> &Arc<TaskGraph<V>> {
        &self.graph
    }

    pub fn scheduler(&self) -> &Arc<dyn TaskScheduler> {
        &self.scheduler
    }

    /// Submit `node` to the pool matching `mode`.
    ///
    /// Short-running tasks submitted in parallel go to the short pool.
    pub fn submit(&self, node: NodeId, mode: ExecutionMode) -> Result<()> {
        let kind = self.graph.task_kind(node)?;
        let runner = self.clone();
        let job = Box::new(move || runner.run_node(node));

        match (mode, kind) {
            (ExecutionMode::Parallel, TaskKind::ShortRunning) => self.scheduler.run_short(job),
            (ExecutionMode::Parallel, TaskKind::LongRunning) => self.scheduler.run_in_parallel(job),
            (ExecutionMode::Sequential, _) => self.scheduler.run_sequentially(job),
        }

        debug!(task = %self.graph.id_of(node)?, ?mode, ?kind, "task submitted");
        Ok(())
    }

    /// Execute `node` on the current thread, then propagate its outcome.
    ///
    /// Called from pool workers. Errors are logged, never returned: a task
    /// failure must not take the worker down.
    pub fn run_node(&self, node: NodeId) {
        if let Err(e) = self.run_node_inner(node) {
            error!(node = %node, error = %e, "task runner error");
        }
    }

    fn run_node_inner(&self, node: NodeId) -> Result<()> {
        let id = self.graph.id_of(node)?.to_string();

        let Some(started) = self.graph.begin(node)? else {
            return Ok(());
        };

        let title = started.task.title();
        info!(task = %id, title = %title, inputs = started.inputs.len(), "task started");
        self.progress.started(&id, &title);

        let task = Arc::clone(&started.task);
        let cancel = started.cancel.clone();
        let inputs = started.inputs;

        let result = catch_unwind(AssertUnwindSafe(|| task.execute(inputs, &cancel)));

        let outcome = match result {
            Ok(_) if cancel.is_cancelled() => TaskOutcome::Cancelled,
            Ok(Ok(value)) => TaskOutcome::Succeeded(value),
            Ok(Err(e)) => TaskOutcome::Failed(format!("{e:#}")),
            Err(_) => TaskOutcome::Failed("task panicked".to_string()),
        };

        match &outcome {
            TaskOutcome::Succeeded(_) => info!(task = %id, "task succeeded"),
            TaskOutcome::Failed(reason) => warn!(task = %id, reason = %reason, "task failed"),
            TaskOutcome::Cancelled => info!(task = %id, "task cancelled"),
        }

        self.graph.finish(node, &outcome)?;
        self.progress.finished(&id, &title, &outcome.label());

        self.propagate_and_submit(node, &outcome)
    }

    /// Cancel `node`: a pending node is cancelled at once and its followers
    /// are told; a running cancellable node is flagged.
    pub fn cancel(&self, node: NodeId) -> Result<CancelRequest> {
        let request = self.graph.request_cancel(node)?;
        if request == CancelRequest::CancelledPending {
            let id = self.graph.id_of(node)?;
            let title = self.graph.title(node)?;
            self.progress.finished(id, &title, "cancelled");
            self.propagate_and_submit(node, &TaskOutcome::Cancelled)?;
        }
        Ok(request)
    }

    fn propagate_and_submit(&self, node: NodeId, outcome: &TaskOutcome<V>) -> Result<()> {
        for submission in propagate(&self.graph, node, outcome)? {
            self.submit(submission.node, submission.mode)?;
        }
        Ok(())
    }
}
