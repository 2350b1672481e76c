// src/task/mod.rs

//! Task contracts shared by programmatic graphs and instruction sets.
//!
//! - [`Task`] is the unit of blocking background work.
//! - [`TaskOutcome`] is what a finished task hands to its followers.
//! - [`input`] holds the per-follower input slots (single and multiple input).

pub mod input;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub use input::{InputDecision, MultipleInputBuffer, SingleInputSlot};

use crate::types::TaskKind;

/// Cooperative cancellation flag handed to a running task.
///
/// Cancellation is advisory: a task body that never checks the flag simply
/// runs to completion, and the runner then records it as cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A unit of background work.
///
/// `execute` blocks the calling worker thread until the work is done. Root
/// tasks receive no inputs, single-input followers exactly one, and
/// multiple-input followers their buffered inputs in arrival order.
pub trait Task<V>: Send + Sync {
    fn title(&self) -> String;

    fn is_cancellable(&self) -> bool {
        false
    }

    fn kind(&self) -> TaskKind {
        TaskKind::LongRunning
    }

    fn execute(&self, inputs: Vec<V>, cancel: &CancelFlag) -> anyhow::Result<V>;
}

/// Terminal result of one task execution.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<V> {
    Succeeded(V),
    Failed(String),
    Cancelled,
}

impl<V> TaskOutcome<V> {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_))
    }

    pub fn label(&self) -> String {
        match self {
            TaskOutcome::Succeeded(_) => "succeeded".to_string(),
            TaskOutcome::Failed(reason) => format!("failed: {reason}"),
            TaskOutcome::Cancelled => "cancelled".to_string(),
        }
    }
}

/// Lifecycle of a task inside a graph.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState<V> {
    Pending,
    Running,
    Succeeded(V),
    Failed(String),
    Cancelled,
}

impl<V> TaskState<V> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending | TaskState::Running)
    }
}

impl<V> From<TaskOutcome<V>> for TaskState<V> {
    fn from(outcome: TaskOutcome<V>) -> Self {
        match outcome {
            TaskOutcome::Succeeded(v) => TaskState::Succeeded(v),
            TaskOutcome::Failed(reason) => TaskState::Failed(reason),
            TaskOutcome::Cancelled => TaskState::Cancelled,
        }
    }
}

/// Closure-backed task, handy for programmatic graphs and tests.
pub struct FnTask<F> {
    title: String,
    kind: TaskKind,
    cancellable: bool,
    body: F,
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("title", &self.title)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<F> FnTask<F> {
    pub fn short_running(mut self) -> Self {
        self.kind = TaskKind::ShortRunning;
        self
    }

    pub fn cancellable(mut self) -> Self {
        self.cancellable = true;
        self
    }
}

/// Wrap a closure as a long-running, non-cancellable [`Task`].
pub fn task_fn<V, F>(title: impl Into<String>, body: F) -> FnTask<F>
where
    F: Fn(Vec<V>) -> anyhow::Result<V> + Send + Sync,
{
    FnTask {
        title: title.into(),
        kind: TaskKind::LongRunning,
        cancellable: false,
        body,
    }
}

impl<V, F> Task<V> for FnTask<F>
where
    F: Fn(Vec<V>) -> anyhow::Result<V> + Send + Sync,
{
    fn title(&self) -> String {
        self.title.clone()
    }

    fn is_cancellable(&self) -> bool {
        self.cancellable
    }

    fn kind(&self) -> TaskKind {
        self.kind
    }

    fn execute(&self, inputs: Vec<V>, _cancel: &CancelFlag) -> anyhow::Result<V> {
        (self.body)(inputs)
    }
}
