// src/graph/report.rs

//! End-of-run summary of node states.

use tracing::{info, warn};

use crate::graph::node::TaskRunState;
use crate::graph::task_graph::TaskGraph;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub id: String,
    pub state: TaskRunState,
}

/// Final state of every node after a run went idle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn from_graph<V: Clone>(graph: &TaskGraph<V>) -> Self {
        let entries = graph
            .snapshot()
            .into_iter()
            .map(|(id, state)| ReportEntry { id, state })
            .collect();
        Self { entries }
    }

    pub fn state_of(&self, id: &str) -> Option<&TaskRunState> {
        self.entries.iter().find(|e| e.id == id).map(|e| &e.state)
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.ids_where(|s| matches!(s, TaskRunState::Succeeded))
    }

    pub fn failed(&self) -> Vec<&str> {
        self.ids_where(|s| matches!(s, TaskRunState::Failed(_)))
    }

    pub fn cancelled(&self) -> Vec<&str> {
        self.ids_where(|s| matches!(s, TaskRunState::Cancelled))
    }

    /// Nodes that never started: their owners failed or were cancelled, or a
    /// multiple-input follower was abandoned.
    pub fn starved(&self) -> Vec<&str> {
        self.ids_where(|s| matches!(s, TaskRunState::Pending))
    }

    pub fn is_success(&self) -> bool {
        self.entries
            .iter()
            .all(|e| matches!(e.state, TaskRunState::Succeeded))
    }

    pub fn log_summary(&self) {
        for id in self.starved() {
            warn!(task = %id, "task never started");
        }
        for e in &self.entries {
            if let TaskRunState::Failed(reason) = &e.state {
                warn!(task = %e.id, reason = %reason, "task failed");
            }
        }

        info!(
            succeeded = self.succeeded().len(),
            failed = self.failed().len(),
            cancelled = self.cancelled().len(),
            starved = self.starved().len(),
            "run finished"
        );
    }

    fn ids_where(&self, pred: impl Fn(&TaskRunState) -> bool) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| pred(&e.state))
            .map(|e| e.id.as_str())
            .collect()
    }
}
