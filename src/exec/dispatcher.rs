// src/exec/dispatcher.rs

//! Run phase, part two: hand every non-embedded task of a built instruction
//! set to the pools according to the run mode.

use std::sync::Arc;

use tracing::{error, info};

use crate::errors::Result;
use crate::exec::task_runner::TaskRunner;
use crate::graph::{NodeId, TaskGraph};
use crate::instruction::builder::InstructedGraph;
use crate::instruction::json::element_to_json;
use crate::instruction::registry::{InstructedTasks, RegistryEntry};
use crate::operations::{Artifact, DefinitionStore, FollowerDefinition, TaskDefinition};
use crate::types::{ExecutionMode, RunMode};

/// What [`dispatch`] handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub run_mode: RunMode,
    /// Ids of the submitted (or saved) root tasks, in submission order.
    pub submitted: Vec<String>,
}

/// Submit the root tasks of `built`.
///
/// - `parallel`: each root goes to the parallel pool (short-running roots to
///   the short pool).
/// - `sequential`: each root goes to the sequential pool, in registry order.
/// - `save`: nothing runs; each root's definition, with the followers it
///   would feed, is written through `store` from the parallel pool.
///
/// Embedded tasks are never submitted here; they run when their owners feed
/// them.
pub fn dispatch(
    built: &InstructedGraph,
    run_mode: RunMode,
    runner: &TaskRunner<Artifact>,
    store: Arc<dyn DefinitionStore>,
) -> Result<DispatchSummary> {
    let mut submitted = Vec::new();

    for entry in built.tasks.roots() {
        match run_mode {
            RunMode::Parallel => runner.submit(entry.node, ExecutionMode::Parallel)?,
            RunMode::Sequential => runner.submit(entry.node, ExecutionMode::Sequential)?,
            RunMode::Save => {
                let definition = definition_of(&built.graph, &built.tasks, entry)?;
                let store = Arc::clone(&store);
                runner.scheduler().run_in_parallel(Box::new(move || {
                    if let Err(e) = store.save(&definition) {
                        error!(task = %definition.id, error = %format!("{e:#}"), "failed to save task definition");
                    }
                }));
            }
        }
        submitted.push(entry.id.clone());
    }

    info!(%run_mode, roots = submitted.len(), "instruction set dispatched");
    Ok(DispatchSummary {
        run_mode,
        submitted,
    })
}

/// Definition of a root task with its follower tree.
pub fn definition_of(
    graph: &TaskGraph<Artifact>,
    tasks: &InstructedTasks,
    entry: &RegistryEntry,
) -> Result<TaskDefinition> {
    Ok(TaskDefinition {
        id: entry.id.clone(),
        operation: entry.operation.kind,
        stage: entry.stage,
        element: element_to_json(&entry.operation.element),
        followers: followers_of(graph, tasks, entry.node)?,
    })
}

fn followers_of(
    graph: &TaskGraph<Artifact>,
    tasks: &InstructedTasks,
    owner: NodeId,
) -> Result<Vec<FollowerDefinition>> {
    graph
        .followers_of(owner)?
        .into_iter()
        .filter_map(|node| tasks.by_node(node))
        .map(|follower| {
            Ok(FollowerDefinition {
                id: follower.id.clone(),
                operation: follower.operation.kind,
                followers: followers_of(graph, tasks, follower.node)?,
            })
        })
        .collect()
}
