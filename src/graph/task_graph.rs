// src/graph/task_graph.rs

//! Arena-backed task graph and its builder.
//!
//! Wiring happens on a [`GraphBuilder`] through `&mut` methods. Once built,
//! the [`TaskGraph`] topology is immutable and shared behind an `Arc`; only
//! node states and follower input buffers change while tasks run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::errors::{AutomationError, Result};
use crate::graph::node::{FollowerEdge, FollowerInput, FollowerSpec, NodeId, TaskNode, TaskRunState};
use crate::task::{CancelFlag, MultipleInputBuffer, SingleInputSlot, Task, TaskOutcome, TaskState};
use crate::types::{ExecutionMode, TaskKind};

/// Result of [`TaskGraph::request_cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelRequest {
    /// The node had not started; it is now `Cancelled` and its followers
    /// must be told.
    CancelledPending,
    /// The node is running and cancellable; its flag is set.
    FlaggedRunning,
    /// The node is running and does not support cancellation.
    NotCancellable,
    /// The node already reached a terminal state.
    AlreadyFinished,
}

/// Mutable wiring stage of a [`TaskGraph`].
pub struct GraphBuilder<V> {
    nodes: Vec<TaskNode<V>>,
    index: HashMap<String, NodeId>,
}

impl<V: Clone + Send + 'static> Default for GraphBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + 'static> GraphBuilder<V> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn add_task<T>(&mut self, id: impl Into<String>, task: T, spec: FollowerSpec) -> Result<NodeId>
    where
        T: Task<V> + 'static,
    {
        self.add_shared_task(id, Arc::new(task), spec)
    }

    pub fn add_shared_task(
        &mut self,
        id: impl Into<String>,
        task: Arc<dyn Task<V>>,
        spec: FollowerSpec,
    ) -> Result<NodeId> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(AutomationError::DuplicateTask(id));
        }

        let input = match spec {
            FollowerSpec::Root => FollowerInput::Root,
            FollowerSpec::Single => FollowerInput::Single(SingleInputSlot::new()),
            FollowerSpec::Multiple { threshold } => {
                FollowerInput::Multiple(MultipleInputBuffer::new(id.clone(), threshold)?)
            }
        };

        let node = NodeId(self.nodes.len());
        debug!(task = %id, node = %node, ?spec, "task added to graph");

        self.nodes.push(TaskNode {
            id: id.clone(),
            task,
            input,
            owners: Vec::new(),
            followers: Vec::new(),
            mode: ExecutionMode::default(),
            state: Mutex::new(TaskState::Pending),
            cancel: CancelFlag::new(),
        });
        self.index.insert(id, node);

        Ok(node)
    }

    /// Wire `follower` after `owner`. Edges keep insertion order per owner.
    pub fn add_follower(&mut self, owner: NodeId, follower: NodeId) -> Result<()> {
        let owner_id = self.node(owner)?.id.clone();
        let follower_node = self.node(follower)?;
        let follower_id = follower_node.id.clone();

        let reject = |reason: &str| AutomationError::IncompatibleWiring {
            owner: owner_id.clone(),
            follower: follower_id.clone(),
            reason: reason.to_string(),
        };

        if owner == follower {
            return Err(reject("a task cannot follow itself"));
        }
        if follower_node.owners.contains(&owner) {
            return Err(reject("follower is already wired to this owner"));
        }
        match &follower_node.input {
            FollowerInput::Root => return Err(reject("a root task cannot be a follower")),
            FollowerInput::Single(_) if !follower_node.owners.is_empty() => {
                return Err(reject("a single-input follower accepts exactly one owner"));
            }
            FollowerInput::Single(_) | FollowerInput::Multiple(_) => {}
        }

        self.nodes[follower.0].owners.push(owner);
        self.nodes[owner.0].followers.push(FollowerEdge { follower });

        debug!(owner = %owner_id, follower = %follower_id, "follower wired");
        Ok(())
    }

    /// Set the pool every follower of `owner` is submitted to.
    pub fn set_execution_mode(&mut self, owner: NodeId, mode: ExecutionMode) -> Result<()> {
        self.node(owner)?;
        self.nodes[owner.0].mode = mode;
        Ok(())
    }

    pub fn set_input_threshold(&mut self, node: NodeId, threshold: usize) -> Result<()> {
        let n = self.node(node)?;
        match &n.input {
            FollowerInput::Multiple(buffer) => buffer.set_input_threshold(threshold),
            _ => Err(AutomationError::FollowerConfig {
                task: n.id.clone(),
                reason: "only multiple-input followers have an input threshold".to_string(),
            }),
        }
    }

    pub fn node_id(&self, id: &str) -> Option<NodeId> {
        self.index.get(id).copied()
    }

    pub fn followers_of(&self, owner: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.node(owner)?.followers.iter().map(|e| e.follower).collect())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Freeze the topology.
    pub fn build(self) -> TaskGraph<V> {
        for node in &self.nodes {
            if let FollowerInput::Multiple(buffer) = &node.input {
                if buffer.threshold() > node.owners.len() {
                    warn!(
                        task = %node.id,
                        threshold = buffer.threshold(),
                        owners = node.owners.len(),
                        "input threshold exceeds number of owners; follower can never fire"
                    );
                }
            }
        }

        TaskGraph {
            nodes: self.nodes,
            index: self.index,
        }
    }

    fn node(&self, node: NodeId) -> Result<&TaskNode<V>> {
        self.nodes
            .get(node.0)
            .ok_or_else(|| AutomationError::UnknownTask(node.to_string()))
    }
}

/// Frozen owner/follower graph.
#[derive(Debug)]
pub struct TaskGraph<V> {
    nodes: Vec<TaskNode<V>>,
    index: HashMap<String, NodeId>,
}

impl<V> TaskGraph<V> {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<V: Clone> TaskGraph<V> {
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn node_id(&self, id: &str) -> Option<NodeId> {
        self.index.get(id).copied()
    }

    pub fn id_of(&self, node: NodeId) -> Result<&str> {
        Ok(self.node(node)?.id.as_str())
    }

    /// Nodes that are not followers of anything, in insertion order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.node_ids()
            .filter(|n| self.nodes[n.0].input.is_root())
            .collect()
    }

    pub fn followers_of(&self, owner: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.node(owner)?.followers.iter().map(|e| e.follower).collect())
    }

    pub fn owners_of(&self, node: NodeId) -> Result<&[NodeId]> {
        Ok(&self.node(node)?.owners)
    }

    pub fn execution_mode(&self, node: NodeId) -> Result<ExecutionMode> {
        Ok(self.node(node)?.mode)
    }

    pub fn title(&self, node: NodeId) -> Result<String> {
        Ok(self.node(node)?.task.title())
    }

    pub fn task_kind(&self, node: NodeId) -> Result<TaskKind> {
        Ok(self.node(node)?.task.kind())
    }

    pub fn input(&self, node: NodeId) -> Result<&FollowerInput<V>> {
        Ok(&self.node(node)?.input)
    }

    pub fn state(&self, node: NodeId) -> Result<TaskRunState> {
        let n = self.node(node)?;
        Ok(TaskRunState::from(&*lock(&n.state)))
    }

    /// Value produced by a succeeded node.
    pub fn output(&self, node: NodeId) -> Result<Option<V>> {
        let n = self.node(node)?;
        let state = lock(&n.state);
        Ok(match &*state {
            TaskState::Succeeded(v) => Some(v.clone()),
            _ => None,
        })
    }

    /// Id and public state of every node, in insertion order.
    pub fn snapshot(&self) -> Vec<(String, TaskRunState)> {
        self.nodes
            .iter()
            .map(|n| (n.id.clone(), TaskRunState::from(&*lock(&n.state))))
            .collect()
    }

    /// Cancel a node.
    ///
    /// A pending node moves to `Cancelled` at once; the caller must propagate
    /// that outcome. A running cancellable node only gets its flag set.
    pub fn request_cancel(&self, node: NodeId) -> Result<CancelRequest> {
        let n = self.node(node)?;
        let mut state = lock(&n.state);

        let request = match &*state {
            TaskState::Pending => {
                *state = TaskState::Cancelled;
                n.cancel.cancel();
                CancelRequest::CancelledPending
            }
            TaskState::Running if n.task.is_cancellable() => {
                n.cancel.cancel();
                CancelRequest::FlaggedRunning
            }
            TaskState::Running => CancelRequest::NotCancellable,
            _ => CancelRequest::AlreadyFinished,
        };

        debug!(task = %n.id, ?request, "cancel requested");
        Ok(request)
    }

    /// Transition `Pending -> Running` and hand out what the task needs.
    ///
    /// Returns `None` if the node already left `Pending`; a node never runs
    /// twice.
    pub(crate) fn begin(&self, node: NodeId) -> Result<Option<StartedTask<V>>> {
        let n = self.node(node)?;
        let mut state = lock(&n.state);

        if !matches!(&*state, TaskState::Pending) {
            debug!(task = %n.id, "task is no longer pending; skipping");
            return Ok(None);
        }

        let inputs = match &n.input {
            FollowerInput::Root => Vec::new(),
            FollowerInput::Single(slot) => match slot.get() {
                Some(v) => vec![v],
                None => {
                    warn!(task = %n.id, "single-input follower started without input");
                    Vec::new()
                }
            },
            FollowerInput::Multiple(buffer) => buffer.inputs(),
        };

        *state = TaskState::Running;

        Ok(Some(StartedTask {
            task: Arc::clone(&n.task),
            inputs,
            cancel: n.cancel.clone(),
        }))
    }

    pub(crate) fn finish(&self, node: NodeId, outcome: &TaskOutcome<V>) -> Result<()> {
        let n = self.node(node)?;
        *lock(&n.state) = TaskState::from(outcome.clone());
        Ok(())
    }

    pub(crate) fn node(&self, node: NodeId) -> Result<&TaskNode<V>> {
        self.nodes
            .get(node.0)
            .ok_or_else(|| AutomationError::UnknownTask(node.to_string()))
    }
}

/// Everything a worker needs to execute a node it just started.
pub(crate) struct StartedTask<V> {
    pub task: Arc<dyn Task<V>>,
    pub inputs: Vec<V>,
    pub cancel: CancelFlag,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::task_fn;

    fn noop() -> impl Task<u32> {
        task_fn("noop", |_inputs: Vec<u32>| Ok(0))
    }

    #[test]
    fn single_input_follower_rejects_second_owner() {
        let mut b = GraphBuilder::new();
        let a = b.add_task("A", noop(), FollowerSpec::Root).unwrap();
        let c = b.add_task("C", noop(), FollowerSpec::Root).unwrap();
        let f = b.add_task("F", noop(), FollowerSpec::Single).unwrap();

        b.add_follower(a, f).unwrap();
        let err = b.add_follower(c, f).unwrap_err();
        assert!(matches!(err, AutomationError::IncompatibleWiring { .. }));
    }

    #[test]
    fn roots_and_self_edges_are_rejected() {
        let mut b = GraphBuilder::new();
        let a = b.add_task("A", noop(), FollowerSpec::Root).unwrap();
        let r = b.add_task("R", noop(), FollowerSpec::Root).unwrap();
        let m = b
            .add_task("M", noop(), FollowerSpec::Multiple { threshold: 1 })
            .unwrap();

        assert!(b.add_follower(a, r).is_err());
        assert!(b.add_follower(m, m).is_err());
        b.add_follower(a, m).unwrap();
        assert!(b.add_follower(a, m).is_err(), "duplicate edge");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut b = GraphBuilder::new();
        b.add_task("A", noop(), FollowerSpec::Root).unwrap();
        let err = b.add_task("A", noop(), FollowerSpec::Root).unwrap_err();
        assert!(matches!(err, AutomationError::DuplicateTask(id) if id == "A"));
    }

    #[test]
    fn follower_edges_keep_insertion_order() {
        let mut b = GraphBuilder::new();
        let a = b.add_task("A", noop(), FollowerSpec::Root).unwrap();
        let f1 = b.add_task("F1", noop(), FollowerSpec::Single).unwrap();
        let f2 = b
            .add_task("F2", noop(), FollowerSpec::Multiple { threshold: 1 })
            .unwrap();
        let f3 = b.add_task("F3", noop(), FollowerSpec::Single).unwrap();
        for f in [f2, f1, f3] {
            b.add_follower(a, f).unwrap();
        }
        b.set_execution_mode(a, ExecutionMode::Sequential).unwrap();

        let g = b.build();
        assert_eq!(g.followers_of(a).unwrap(), vec![f2, f1, f3]);
        assert_eq!(g.execution_mode(a).unwrap(), ExecutionMode::Sequential);
        assert_eq!(g.roots(), vec![a]);
    }

    #[test]
    fn node_runs_at_most_once() {
        let mut b = GraphBuilder::new();
        let a = b.add_task("A", noop(), FollowerSpec::Root).unwrap();
        let g = b.build();

        assert!(g.begin(a).unwrap().is_some());
        assert!(g.begin(a).unwrap().is_none());
        g.finish(a, &TaskOutcome::Succeeded(5)).unwrap();
        assert!(g.begin(a).unwrap().is_none());
        assert_eq!(g.output(a).unwrap(), Some(5));
    }

    #[test]
    fn cancel_pending_node_moves_it_to_cancelled() {
        let mut b = GraphBuilder::new();
        let a = b.add_task("A", noop(), FollowerSpec::Root).unwrap();
        let g = b.build();

        assert_eq!(g.request_cancel(a).unwrap(), CancelRequest::CancelledPending);
        assert_eq!(g.state(a).unwrap(), TaskRunState::Cancelled);
        assert!(g.begin(a).unwrap().is_none());
        assert_eq!(g.request_cancel(a).unwrap(), CancelRequest::AlreadyFinished);
    }

    #[test]
    fn threshold_is_only_for_multiple_input_followers() {
        let mut b = GraphBuilder::new();
        let f = b.add_task("F", noop(), FollowerSpec::Single).unwrap();
        assert!(b.set_input_threshold(f, 2).is_err());

        let err = b
            .add_task("M", noop(), FollowerSpec::Multiple { threshold: 0 })
            .unwrap_err();
        assert!(matches!(err, AutomationError::FollowerConfig { .. }));
    }
}
