// src/graph/node.rs

//! Per-node data of the task graph.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::task::{CancelFlag, MultipleInputBuffer, SingleInputSlot, Task, TaskState};
use crate::types::ExecutionMode;

/// Typed handle into a [`TaskGraph`](super::TaskGraph) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a node receives input, fixed when the node is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerSpec {
    /// Not a follower; submitted directly by the dispatcher.
    Root,
    /// Exactly one owner, one input slot.
    Single,
    /// Several owners, fires once `threshold` inputs are buffered.
    Multiple { threshold: usize },
}

/// Runtime input state matching a [`FollowerSpec`].
#[derive(Debug)]
pub enum FollowerInput<V> {
    Root,
    Single(SingleInputSlot<V>),
    Multiple(MultipleInputBuffer<V>),
}

impl<V> FollowerInput<V> {
    pub fn is_root(&self) -> bool {
        matches!(self, FollowerInput::Root)
    }
}

/// Outgoing edge of an owner. The mode lives on the owner and is copied to
/// each submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FollowerEdge {
    pub follower: NodeId,
}

/// Public, read-only view of a node's state, without the task value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRunState {
    Pending,
    Running,
    Succeeded,
    Failed(String),
    Cancelled,
}

impl<V> From<&TaskState<V>> for TaskRunState {
    fn from(state: &TaskState<V>) -> Self {
        match state {
            TaskState::Pending => TaskRunState::Pending,
            TaskState::Running => TaskRunState::Running,
            TaskState::Succeeded(_) => TaskRunState::Succeeded,
            TaskState::Failed(reason) => TaskRunState::Failed(reason.clone()),
            TaskState::Cancelled => TaskRunState::Cancelled,
        }
    }
}

pub(crate) struct TaskNode<V> {
    pub id: String,
    pub task: Arc<dyn Task<V>>,
    pub input: FollowerInput<V>,
    pub owners: Vec<NodeId>,
    pub followers: Vec<FollowerEdge>,
    pub mode: ExecutionMode,
    pub state: Mutex<TaskState<V>>,
    pub cancel: CancelFlag,
}

impl<V> fmt::Debug for TaskNode<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("id", &self.id)
            .field("title", &self.task.title())
            .field("owners", &self.owners)
            .field("followers", &self.followers)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
