// src/graph/propagate.rs

//! Owner contract: what a finished task pushes to its followers.

use tracing::{debug, warn};

use crate::errors::Result;
use crate::graph::node::{FollowerInput, NodeId};
use crate::graph::task_graph::TaskGraph;
use crate::task::{InputDecision, TaskOutcome};
use crate::types::ExecutionMode;

/// A follower that became runnable, and the pool it goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub node: NodeId,
    pub mode: ExecutionMode,
}

/// Apply `outcome` of `owner` to every follower, in edge insertion order.
///
/// - Success: multiple-input followers get the value appended (and are
///   submitted if that fires them); single-input followers get the value set
///   and are always submitted.
/// - Failure or cancellation: multiple-input followers are told the input is
///   lost; single-input followers are left pending.
///
/// Pure with respect to scheduling: the caller submits the returned list.
pub fn propagate<V: Clone>(
    graph: &TaskGraph<V>,
    owner: NodeId,
    outcome: &TaskOutcome<V>,
) -> Result<Vec<Submission>> {
    let owner_node = graph.node(owner)?;
    let owner_id = owner_node.id.as_str();
    let mode = owner_node.mode;

    let mut submissions = Vec::new();

    for edge in &owner_node.followers {
        let follower = graph.node(edge.follower)?;

        let submit = match (&follower.input, outcome) {
            (FollowerInput::Multiple(buffer), TaskOutcome::Succeeded(value)) => {
                matches!(buffer.add_input(owner_id, value.clone()), InputDecision::Fire(_))
            }
            (FollowerInput::Multiple(buffer), TaskOutcome::Failed(_) | TaskOutcome::Cancelled) => {
                matches!(buffer.input_failed(owner_id), InputDecision::Fire(_))
            }
            (FollowerInput::Single(slot), TaskOutcome::Succeeded(value)) => {
                if slot.set_input(value.clone()) {
                    debug!(task = %follower.id, owner = %owner_id, "single input overwritten");
                }
                true
            }
            (FollowerInput::Single(_), _) => {
                debug!(
                    task = %follower.id,
                    owner = %owner_id,
                    "owner did not succeed; single-input follower stays pending"
                );
                false
            }
            (FollowerInput::Root, _) => {
                warn!(task = %follower.id, owner = %owner_id, "root task wired as follower; ignoring");
                false
            }
        };

        if submit {
            debug!(task = %follower.id, owner = %owner_id, ?mode, "follower ready");
            submissions.push(Submission {
                node: edge.follower,
                mode,
            });
        }
    }

    Ok(submissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FollowerSpec, GraphBuilder};
    use crate::task::task_fn;

    fn graph_with_mixed_followers() -> (TaskGraph<String>, NodeId, NodeId, NodeId) {
        let mut b = GraphBuilder::new();
        let t = || task_fn("t", |_: Vec<String>| Ok(String::new()));
        let a = b.add_task("A", t(), FollowerSpec::Root).unwrap();
        let single = b.add_task("S", t(), FollowerSpec::Single).unwrap();
        let multi = b
            .add_task("M", t(), FollowerSpec::Multiple { threshold: 1 })
            .unwrap();
        b.add_follower(a, single).unwrap();
        b.add_follower(a, multi).unwrap();
        b.set_execution_mode(a, ExecutionMode::Sequential).unwrap();
        (b.build(), a, single, multi)
    }

    #[test]
    fn success_submits_every_follower_with_owner_mode() {
        let (g, a, single, multi) = graph_with_mixed_followers();
        let subs = propagate(&g, a, &TaskOutcome::Succeeded("X".to_string())).unwrap();

        assert_eq!(
            subs,
            vec![
                Submission { node: single, mode: ExecutionMode::Sequential },
                Submission { node: multi, mode: ExecutionMode::Sequential },
            ]
        );
    }

    #[test]
    fn failure_submits_nothing_and_leaves_single_slot_empty() {
        let (g, a, single, multi) = graph_with_mixed_followers();
        let subs = propagate(&g, a, &TaskOutcome::Failed("boom".into())).unwrap();
        assert!(subs.is_empty());

        match g.input(single).unwrap() {
            FollowerInput::Single(slot) => assert!(!slot.is_set()),
            other => panic!("unexpected input kind: {other:?}"),
        }
        match g.input(multi).unwrap() {
            FollowerInput::Multiple(buf) => assert!(buf.is_abandoned()),
            other => panic!("unexpected input kind: {other:?}"),
        }
    }
}
