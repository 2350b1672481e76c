use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::bail;
use serde_json::{Value, json};
use equinox_automation::exec::{Job, TaskScheduler};
use equinox_automation::instruction::catalog::OperationKind;
use equinox_automation::operations::{OperationExecutor, OperationRequest, Stage};

/// One call seen by [`RecordingExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub kind: OperationKind,
    pub stage: Stage,
    pub id: String,
    /// Sources of the inputs, in the order they were handed over.
    pub inputs: Vec<String>,
}

/// A fake operation executor that:
/// - records every request it receives
/// - fails the operations whose ids were registered with [`fail`](Self::fail)
/// - otherwise returns `{"id": ..., "stage": ...}`.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(self, id: &str) -> Self {
        self.failing.lock().unwrap().insert(id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Ids of the `Run`-stage calls, in call order.
    pub fn run_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.stage == Stage::Run)
            .map(|c| c.id)
            .collect()
    }

    pub fn call_for(&self, id: &str, stage: Stage) -> Option<RecordedCall> {
        self.calls()
            .into_iter()
            .find(|c| c.id == id && c.stage == stage)
    }
}

impl OperationExecutor for RecordingExecutor {
    fn execute(&self, request: &OperationRequest<'_>) -> anyhow::Result<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            kind: request.kind,
            stage: request.stage,
            id: request.id.to_string(),
            inputs: request.inputs.iter().map(|a| a.source.clone()).collect(),
        });

        if self.failing.lock().unwrap().contains(request.id) {
            bail!("operation '{}' failed on purpose", request.id);
        }

        Ok(json!({ "id": request.id, "stage": request.stage }))
    }
}

/// A scheduler that runs every job on the calling thread, recording which
/// pool it was submitted to. Followers fed by a job run before the job's
/// submit call returns.
#[derive(Debug, Clone, Default)]
pub struct InlineScheduler {
    pools: Arc<Mutex<Vec<&'static str>>>,
}

impl InlineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool names ("parallel", "sequential", "short") in submission order.
    pub fn pools(&self) -> Vec<&'static str> {
        self.pools.lock().unwrap().clone()
    }

    fn run(&self, pool: &'static str, job: Job) {
        self.pools.lock().unwrap().push(pool);
        job();
    }
}

impl TaskScheduler for InlineScheduler {
    fn run_in_parallel(&self, job: Job) {
        self.run("parallel", job);
    }

    fn run_sequentially(&self, job: Job) {
        self.run("sequential", job);
    }

    fn run_short(&self, job: Job) {
        self.run("short", job);
    }
}
