// src/operations/mod.rs

//! Operation bodies are external collaborators.
//!
//! The graph only sees [`InstructedTask`]s, which hand an
//! [`OperationRequest`] to an [`OperationExecutor`] and wrap the returned
//! value in an [`Artifact`] for followers.
//!
//! - [`command`] runs a configured shell command per operation kind.
//! - [`store`] persists task definitions for the `save` run mode.

pub mod command;
pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::instruction::catalog::{ArtifactKind, OperationKind};
use crate::instruction::element::Element;
use crate::instruction::json::element_to_json;
use crate::instruction::model::{Operation, RunSettings};
use crate::task::{CancelFlag, Task};
use crate::types::TaskKind;

pub use command::{CommandExecutor, OperationCommand};
pub use store::{DefinitionStore, FollowerDefinition, FsDefinitionStore, TaskDefinition};

/// Output of one operation, as passed to followers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    /// Id of the task that produced it.
    pub source: String,
    pub value: Value,
}

/// Which step of an operation a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Synthetic search step in front of a download.
    Search,
    /// Synthetic compare step collecting the inputs of a comparison plot.
    Compare,
    /// The operation itself.
    Run,
}

/// Everything an executor gets to perform one operation step.
#[derive(Debug, Clone, Copy)]
pub struct OperationRequest<'a> {
    pub kind: OperationKind,
    pub stage: Stage,
    pub id: &'a str,
    pub element: &'a Element,
    pub inputs: &'a [Artifact],
    pub settings: &'a RunSettings,
}

impl OperationRequest<'_> {
    /// Wire form handed to external commands.
    pub fn to_json(&self) -> Value {
        json!({
            "operation": self.kind.element_name(),
            "stage": self.stage,
            "id": self.id,
            "element": element_to_json(self.element),
            "inputs": self.inputs,
            "settings": self.settings,
        })
    }
}

pub trait OperationExecutor: Send + Sync {
    fn execute(&self, request: &OperationRequest<'_>) -> anyhow::Result<Value>;
}

/// Executor for kinds without a configured command: logs the request and
/// returns a placeholder value.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingExecutor;

impl OperationExecutor for LoggingExecutor {
    fn execute(&self, request: &OperationRequest<'_>) -> anyhow::Result<Value> {
        info!(
            operation = %request.kind,
            task = %request.id,
            stage = ?request.stage,
            inputs = request.inputs.len(),
            "no command configured; recording placeholder result"
        );

        Ok(json!({
            "operation": request.kind.element_name(),
            "id": request.id,
            "stage": request.stage,
            "inputs": request.inputs.iter().map(|a| a.source.as_str()).collect::<Vec<_>>(),
        }))
    }
}

/// Creates [`InstructedTask`]s that share one executor and one set of run
/// settings.
#[derive(Clone)]
pub struct OperationFactory {
    executor: Arc<dyn OperationExecutor>,
    settings: Arc<RunSettings>,
    short_running: HashMap<OperationKind, bool>,
}

impl std::fmt::Debug for OperationFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationFactory")
            .field("settings", &self.settings)
            .field("short_running", &self.short_running)
            .finish_non_exhaustive()
    }
}

impl OperationFactory {
    pub fn new(executor: Arc<dyn OperationExecutor>, settings: RunSettings) -> Self {
        Self {
            executor,
            settings: Arc::new(settings),
            short_running: HashMap::new(),
        }
    }

    /// Override the catalog's short-running flag for some kinds.
    pub fn with_short_running(mut self, overrides: HashMap<OperationKind, bool>) -> Self {
        self.short_running = overrides;
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn create(&self, operation: Arc<Operation>, stage: Stage) -> InstructedTask {
        let spec = operation.kind.spec();
        let short = match stage {
            Stage::Search | Stage::Compare => false,
            Stage::Run => self
                .short_running
                .get(&operation.kind)
                .copied()
                .unwrap_or(spec.short_running),
        };
        let produces = match (stage, spec.fan_out) {
            (Stage::Search, Some(fan_out)) => fan_out.produces,
            (Stage::Compare, _) => ArtifactKind::Dataset,
            _ => spec.produces,
        };

        InstructedTask {
            operation,
            stage,
            produces,
            short_running: short,
            executor: Arc::clone(&self.executor),
            settings: Arc::clone(&self.settings),
        }
    }
}

/// One operation step wrapped as a graph task.
pub struct InstructedTask {
    operation: Arc<Operation>,
    stage: Stage,
    produces: ArtifactKind,
    short_running: bool,
    executor: Arc<dyn OperationExecutor>,
    settings: Arc<RunSettings>,
}

impl std::fmt::Debug for InstructedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstructedTask")
            .field("id", &self.operation.id)
            .field("kind", &self.operation.kind)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

impl InstructedTask {
    pub fn operation(&self) -> &Arc<Operation> {
        &self.operation
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn produces(&self) -> ArtifactKind {
        self.produces
    }
}

impl Task<Artifact> for InstructedTask {
    fn title(&self) -> String {
        let op = &self.operation;
        let spec = op.kind.spec();
        match (self.stage, spec.fan_out, spec.compare) {
            (Stage::Search, Some(fan_out), _) => format!("{} for '{}'", fan_out.title, op.id),
            (Stage::Compare, _, Some(compare)) => format!("{} for '{}'", compare.title, op.id),
            _ => format!("{} '{}'", op.kind, op.id),
        }
    }

    fn is_cancellable(&self) -> bool {
        true
    }

    fn kind(&self) -> TaskKind {
        if self.short_running {
            TaskKind::ShortRunning
        } else {
            TaskKind::LongRunning
        }
    }

    fn execute(&self, inputs: Vec<Artifact>, cancel: &CancelFlag) -> anyhow::Result<Artifact> {
        if cancel.is_cancelled() {
            bail!("cancelled before start");
        }

        let op = &self.operation;
        let request = OperationRequest {
            kind: op.kind,
            stage: self.stage,
            id: &op.id,
            element: &op.element,
            inputs: &inputs,
            settings: &self.settings,
        };

        let value = self
            .executor
            .execute(&request)
            .with_context(|| format!("<{}> '{}'", op.kind, op.id))?;

        Ok(Artifact {
            kind: self.produces,
            source: op.id.clone(),
            value,
        })
    }
}
