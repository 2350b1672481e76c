// src/engine/mod.rs

//! Top-level flows over instruction-set files.
//!
//! This module ties together:
//! - loading (XML or JSON) and the check phase,
//! - building the task graph,
//! - creating the execution context and dispatching per run mode,
//! - waiting for the run to go idle and summarising node states.
//!
//! Everything lives on [`Automation`], in [`runtime`].

pub mod runtime;

pub use runtime::Automation;
