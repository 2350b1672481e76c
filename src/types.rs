// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Instruction-set-wide run mode for root tasks (`settings.runMode`).
///
/// - `Parallel`: submit every root task to the parallel pool (default).
/// - `Sequential`: submit every root task to the single-worker sequential pool.
/// - `Save`: build the tasks but persist their definitions instead of running
///   them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Parallel,
    Sequential,
    Save,
}

impl RunMode {
    pub const VALUES: [&'static str; 3] = ["parallel", "sequential", "save"];

    /// Execution mode handed to followers of tasks built under this run mode.
    ///
    /// Only `parallel` lets followers run in the parallel pool.
    pub fn follower_mode(self) -> ExecutionMode {
        match self {
            RunMode::Parallel => ExecutionMode::Parallel,
            RunMode::Sequential | RunMode::Save => ExecutionMode::Sequential,
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "parallel" => Ok(RunMode::Parallel),
            "sequential" => Ok(RunMode::Sequential),
            "save" => Ok(RunMode::Save),
            other => Err(format!(
                "invalid runMode: {other} (expected \"parallel\", \"sequential\" or \"save\")"
            )),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunMode::Parallel => "parallel",
            RunMode::Sequential => "sequential",
            RunMode::Save => "save",
        };
        f.write_str(s)
    }
}

/// Pool selection for a follower once its owner hands it an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
}

impl ExecutionMode {
    pub fn from_parallel_flag(parallel: bool) -> Self {
        if parallel {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        }
    }

    pub fn is_parallel(self) -> bool {
        matches!(self, ExecutionMode::Parallel)
    }
}

/// Declared execution profile of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskKind {
    /// Analyses, downloads, conversions: anything that may block for long.
    #[default]
    LongRunning,
    /// Transient sub-tasks (info edits, sharing); run in the short pool.
    ShortRunning,
}
