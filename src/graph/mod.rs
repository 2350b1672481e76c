// src/graph/mod.rs

//! Owner/follower task graph.
//!
//! - [`node`] holds per-task data: the task object, its follower input kind,
//!   its outgoing edges and its run state.
//! - [`task_graph`] provides the arena ([`TaskGraph`]) and the `&mut` builder
//!   used to wire it before it is frozen and shared.
//! - [`propagate`] implements the owner contract: what a finished task pushes
//!   to its followers.
//! - [`report`] summarises final task states after a run.

pub mod node;
pub mod propagate;
pub mod report;
pub mod task_graph;

pub use node::{FollowerInput, FollowerSpec, NodeId, TaskRunState};
pub use propagate::{Submission, propagate};
pub use report::{ReportEntry, RunReport};
pub use task_graph::{CancelRequest, GraphBuilder, TaskGraph};
