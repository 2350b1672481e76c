// src/instruction/mod.rs

//! Instruction sets: the XML/JSON documents describing what to run.
//!
//! - [`element`], [`xml`] and [`json`] hold the document model and its two
//!   serializations; [`loader`] reads, writes and converts files.
//! - [`catalog`] lists the supported operation elements and their wiring.
//! - [`model`] gives typed views: settings and operations.
//! - [`check`] validates a set before anything runs.
//! - [`builder`] and [`registry`] turn a checked set into a task graph.

pub mod builder;
pub mod catalog;
pub mod check;
pub mod element;
pub mod json;
pub mod loader;
pub mod model;
pub mod registry;
pub mod xml;

pub use builder::{InstructedGraph, build_graph};
pub use catalog::{ArtifactKind, OperationKind};
pub use check::{CheckReport, check};
pub use element::Element;
pub use loader::{SourceFormat, convert, load_instruction_set};
pub use model::{InstructionSet, Operation, RunSettings};
pub use registry::{InstructedTasks, RegistryEntry};
