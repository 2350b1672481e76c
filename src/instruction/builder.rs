// src/instruction/builder.rs

//! Run phase, part one: turn a checked instruction set into a wired graph.

use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::{AutomationError, Result};
use crate::graph::{FollowerSpec, GraphBuilder, NodeId, TaskGraph};
use crate::instruction::catalog::DependencyRule;
use crate::instruction::model::{InstructionSet, Operation};
use crate::instruction::registry::{InstructedTasks, RegistryEntry};
use crate::operations::{Artifact, OperationFactory, Stage};
use crate::types::ExecutionMode;

/// Prefix of the synthetic owner registered in front of download operations
/// (search step) and comparison plots (compare step).
pub const SYNTHETIC_OWNER_PREFIX: &str = "ownerOf_";

/// Id of the synthetic owner of `id`.
pub fn synthetic_owner_id(id: &str) -> String {
    format!("{SYNTHETIC_OWNER_PREFIX}{id}")
}

/// A built instruction set: the frozen graph and its registry.
#[derive(Debug)]
pub struct InstructedGraph {
    pub graph: Arc<TaskGraph<Artifact>>,
    pub tasks: InstructedTasks,
}

/// Build the task graph for `set`.
///
/// Kinds are processed in catalog order and elements in document order
/// within a kind. Operations without a dependency become roots; everything
/// else is an embedded follower of the operations it references. Every
/// owner's execution mode is parallel iff the run mode is `parallel`.
pub fn build_graph(set: &InstructionSet, factory: &OperationFactory) -> Result<InstructedGraph> {
    let mode = factory.settings().run_mode.follower_mode();
    let mut builder = Builder {
        graph: GraphBuilder::new(),
        tasks: InstructedTasks::new(),
        factory,
        mode,
    };

    for operation in set.operations()? {
        builder.add(Arc::new(operation))?;
    }

    let Builder { graph, tasks, .. } = builder;
    let graph = Arc::new(graph.build());

    info!(
        tasks = tasks.len(),
        roots = tasks.roots().count(),
        ?mode,
        "instruction set graph built"
    );

    Ok(InstructedGraph { graph, tasks })
}

struct Builder<'a> {
    graph: GraphBuilder<Artifact>,
    tasks: InstructedTasks,
    factory: &'a OperationFactory,
    mode: ExecutionMode,
}

impl Builder<'_> {
    fn add(&mut self, operation: Arc<Operation>) -> Result<()> {
        let spec = operation.kind.spec();

        if spec.fan_out.is_some() {
            return self.add_with_search_owner(operation);
        }
        if spec.compare.is_some() {
            return self.add_with_compare_owner(operation);
        }

        let follower = match spec.dependency {
            DependencyRule::Many { .. } => FollowerSpec::Multiple {
                threshold: operation.references.len(),
            },
            _ if operation.references.is_empty() => FollowerSpec::Root,
            _ => FollowerSpec::Single,
        };

        let node = self.register(
            operation.id.clone(),
            &operation,
            Stage::Run,
            follower,
            follower != FollowerSpec::Root,
        )?;

        for dependency in &operation.references {
            self.wire(dependency, &operation.id, node)?;
        }

        Ok(())
    }

    /// Download operations run behind a synthetic search root: the search
    /// owner is submitted, the download itself is its embedded follower.
    fn add_with_search_owner(&mut self, operation: Arc<Operation>) -> Result<()> {
        let owner_id = synthetic_owner_id(&operation.id);

        self.register(owner_id.clone(), &operation, Stage::Search, FollowerSpec::Root, false)?;
        let node = self.register(
            operation.id.clone(),
            &operation,
            Stage::Run,
            FollowerSpec::Single,
            true,
        )?;
        self.wire(&owner_id, &operation.id, node)?;

        debug!(task = %operation.id, owner = %owner_id, "search owner registered");
        Ok(())
    }

    /// Comparison plots run in two steps: an embedded compare owner collects
    /// every referenced input, the plot is its single-input follower.
    fn add_with_compare_owner(&mut self, operation: Arc<Operation>) -> Result<()> {
        let owner_id = synthetic_owner_id(&operation.id);
        let threshold = operation.references.len();

        let owner = self.register(
            owner_id.clone(),
            &operation,
            Stage::Compare,
            FollowerSpec::Multiple { threshold },
            true,
        )?;
        for dependency in &operation.references {
            self.wire(dependency, &owner_id, owner)?;
        }

        let node = self.register(
            operation.id.clone(),
            &operation,
            Stage::Run,
            FollowerSpec::Single,
            true,
        )?;
        self.wire(&owner_id, &operation.id, node)?;

        debug!(task = %operation.id, owner = %owner_id, threshold, "compare owner registered");
        Ok(())
    }

    fn register(
        &mut self,
        id: String,
        operation: &Arc<Operation>,
        stage: Stage,
        follower: FollowerSpec,
        embedded: bool,
    ) -> Result<NodeId> {
        let task = self.factory.create(Arc::clone(operation), stage);
        let produces = task.produces();
        let node = self.graph.add_task(id.clone(), task, follower)?;

        self.tasks.insert(RegistryEntry {
            id,
            node,
            embedded,
            operation: Arc::clone(operation),
            stage,
            produces,
        })?;

        Ok(node)
    }

    /// Wire `follower` after the registered task `dependency`.
    fn wire(&mut self, dependency: &str, follower_id: &str, follower: NodeId) -> Result<()> {
        let Some(owner) = self.tasks.get(dependency) else {
            return Err(AutomationError::DependencyNotReady {
                task: follower_id.to_string(),
                dependency: dependency.to_string(),
            });
        };

        let consumes = self
            .tasks
            .get(follower_id)
            .map(|e| e.operation.kind.spec().consumes)
            .unwrap_or_default();
        if !consumes.contains(&owner.produces) {
            return Err(AutomationError::IncompatibleWiring {
                owner: dependency.to_string(),
                follower: follower_id.to_string(),
                reason: format!("{:?} output cannot be consumed here", owner.produces),
            });
        }

        let owner_node = owner.node;
        self.graph.add_follower(owner_node, follower)?;
        self.graph.set_execution_mode(owner_node, self.mode)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FollowerInput;
    use crate::instruction::element::Element;
    use crate::instruction::model::{ROOT_ELEMENT, RunSettings};
    use crate::operations::LoggingExecutor;
    use crate::types::RunMode;

    fn factory(run_mode: RunMode) -> OperationFactory {
        OperationFactory::new(
            Arc::new(LoggingExecutor),
            RunSettings {
                run_mode,
                ..RunSettings::default()
            },
        )
    }

    fn op(name: &str, id: &str) -> Element {
        Element::new(name).with_text_child("id", id)
    }

    #[test]
    fn download_gets_a_search_owner_root() {
        let root = Element::new(ROOT_ELEMENT)
            .with_child(op("downloadSpectrum", "d1"))
            .with_child(op("addSpectrum", "s1").with_text_child("downloadId", "d1"));
        let built = build_graph(&InstructionSet::new("x.xml", root), &factory(RunMode::Parallel)).unwrap();

        let ids: Vec<_> = built.tasks.iter().map(|e| (e.id.as_str(), e.embedded)).collect();
        assert_eq!(ids, vec![("ownerOf_d1", false), ("d1", true), ("s1", true)]);

        let owner = built.tasks.get("ownerOf_d1").unwrap().node;
        let download = built.tasks.get("d1").unwrap().node;
        assert_eq!(built.graph.followers_of(owner).unwrap(), vec![download]);
        assert_eq!(built.graph.execution_mode(owner).unwrap(), ExecutionMode::Parallel);
    }

    #[test]
    fn repeated_references_build_one_multiple_input_follower() {
        let root = Element::new(ROOT_ELEMENT)
            .with_child(op("addHeadlessStressSequence", "h1"))
            .with_child(op("equivalentStressAnalysis", "e1").with_text_child("headlessStressSequenceId", "h1"))
            .with_child(op("equivalentStressAnalysis", "e2").with_text_child("headlessStressSequenceId", "h1"))
            .with_child(
                op("saveEquivalentStresses", "out")
                    .with_text_child("equivalentStressId", "e1")
                    .with_text_child("equivalentStressId", "e2"),
            );
        let built = build_graph(&InstructionSet::new("x.xml", root), &factory(RunMode::Sequential)).unwrap();

        let out = built.tasks.get("out").unwrap().node;
        match built.graph.input(out).unwrap() {
            FollowerInput::Multiple(buffer) => assert_eq!(buffer.threshold(), 2),
            other => panic!("expected multiple-input follower, got {other:?}"),
        }
        assert_eq!(built.graph.owners_of(out).unwrap().len(), 2);

        let e1 = built.tasks.get("e1").unwrap().node;
        assert_eq!(built.graph.execution_mode(e1).unwrap(), ExecutionMode::Sequential);
        let roots: Vec<_> = built.tasks.roots().map(|e| e.id.as_str()).collect();
        assert_eq!(roots, vec!["h1"]);
    }

    #[test]
    fn comparison_plot_gets_an_embedded_compare_owner() {
        let root = Element::new(ROOT_ELEMENT)
            .with_child(op("addHeadlessStressSequence", "h1"))
            .with_child(op("equivalentStressAnalysis", "e1").with_text_child("headlessStressSequenceId", "h1"))
            .with_child(op("equivalentStressAnalysis", "e2").with_text_child("headlessStressSequenceId", "h1"))
            .with_child(op("equivalentStressAnalysis", "e3").with_text_child("headlessStressSequenceId", "h1"))
            .with_child(
                op("plotLifeFactors", "lf")
                    .with_text_child("equivalentStressId", "e1")
                    .with_text_child("equivalentStressId", "e2")
                    .with_text_child("equivalentStressId", "e3"),
            );
        let built = build_graph(&InstructionSet::new("x.xml", root), &factory(RunMode::Parallel)).unwrap();

        let ids: Vec<_> = built
            .tasks
            .iter()
            .map(|e| (e.id.as_str(), e.embedded, e.stage))
            .collect();
        assert_eq!(
            ids[4..],
            [("ownerOf_lf", true, Stage::Compare), ("lf", true, Stage::Run)]
        );

        let compare = built.tasks.get("ownerOf_lf").unwrap().node;
        let plot = built.tasks.get("lf").unwrap().node;
        match built.graph.input(compare).unwrap() {
            FollowerInput::Multiple(buffer) => assert_eq!(buffer.threshold(), 3),
            other => panic!("expected multiple-input compare step, got {other:?}"),
        }
        assert_eq!(built.graph.owners_of(compare).unwrap().len(), 3);
        assert!(matches!(built.graph.input(plot).unwrap(), FollowerInput::Single(_)));
        assert_eq!(built.graph.owners_of(plot).unwrap(), &[compare]);
        assert_eq!(built.graph.execution_mode(compare).unwrap(), ExecutionMode::Parallel);

        let roots: Vec<_> = built.tasks.roots().map(|e| e.id.as_str()).collect();
        assert_eq!(roots, vec!["h1"]);
    }

    #[test]
    fn unregistered_dependency_is_not_ready() {
        let root = Element::new(ROOT_ELEMENT).with_child(
            op("saveSpectrum", "save1").with_text_child("spectrumId", "missing"),
        );
        let err = build_graph(&InstructionSet::new("x.xml", root), &factory(RunMode::Parallel)).unwrap_err();
        assert!(matches!(err, AutomationError::DependencyNotReady { dependency, .. } if dependency == "missing"));
    }

    #[test]
    fn mismatched_artifacts_are_rejected() {
        // shareFile accepts any save*/export*/plot* task; uploadSpectrum needs an exported file.
        let root = Element::new(ROOT_ELEMENT)
            .with_child(op("addSpectrum", "s1"))
            .with_child(op("uploadSpectrum", "u1").with_text_child("exportId", "s1"));
        let err = build_graph(&InstructionSet::new("x.xml", root), &factory(RunMode::Parallel)).unwrap_err();
        assert!(matches!(err, AutomationError::IncompatibleWiring { .. }));
    }
}
