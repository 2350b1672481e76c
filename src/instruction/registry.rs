// src/instruction/registry.rs

//! Insertion-ordered registry of the tasks built from an instruction set.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{AutomationError, Result};
use crate::graph::NodeId;
use crate::instruction::catalog::ArtifactKind;
use crate::instruction::model::Operation;
use crate::operations::Stage;

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub id: String,
    pub node: NodeId,
    /// Embedded entries only carry ownership wiring and are never submitted
    /// directly.
    pub embedded: bool,
    pub operation: Arc<Operation>,
    pub stage: Stage,
    pub produces: ArtifactKind,
}

#[derive(Debug, Clone, Default)]
pub struct InstructedTasks {
    entries: Vec<RegistryEntry>,
    index: HashMap<String, usize>,
}

impl InstructedTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: RegistryEntry) -> Result<()> {
        if self.index.contains_key(&entry.id) {
            return Err(AutomationError::DuplicateTask(entry.id));
        }
        self.index.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn by_node(&self, node: NodeId) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.node == node)
    }

    /// Every entry in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    /// Non-embedded entries in insertion order: what the dispatcher submits.
    pub fn roots(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter().filter(|e| !e.embedded)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
