// src/operations/store.rs

//! Persisted task definitions for the `save` run mode.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::fs::FileSystem;
use crate::instruction::catalog::OperationKind;
use crate::operations::Stage;

/// Definition of a root task and the followers it would feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub id: String,
    pub operation: OperationKind,
    pub stage: Stage,
    /// The operation element, in its JSON form.
    pub element: Value,
    pub followers: Vec<FollowerDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowerDefinition {
    pub id: String,
    pub operation: OperationKind,
    pub followers: Vec<FollowerDefinition>,
}

pub trait DefinitionStore: Send + Sync {
    /// Persist `definition`, returning where it went.
    fn save(&self, definition: &TaskDefinition) -> Result<PathBuf>;
}

/// Writes `<dir>/<id>.json` through a [`FileSystem`].
pub struct FsDefinitionStore {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl fmt::Debug for FsDefinitionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsDefinitionStore")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl FsDefinitionStore {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DefinitionStore for FsDefinitionStore {
    fn save(&self, definition: &TaskDefinition) -> Result<PathBuf> {
        let path = self.dir.join(format!("{}.json", definition.id));
        let json = serde_json::to_string_pretty(definition)
            .with_context(|| format!("serialising definition of '{}'", definition.id))?;

        self.fs.write(&path, json.as_bytes())?;

        info!(task = %definition.id, path = %path.display(), "task definition saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn writes_definition_under_store_dir() {
        let fs = MockFileSystem::new();
        let store = FsDefinitionStore::new(Arc::new(fs.clone()), "saved");

        let definition = TaskDefinition {
            id: "s1".to_string(),
            operation: OperationKind::AddSpectrum,
            stage: Stage::Run,
            element: serde_json::json!({ "id": "s1" }),
            followers: vec![FollowerDefinition {
                id: "save1".to_string(),
                operation: OperationKind::SaveSpectrum,
                followers: Vec::new(),
            }],
        };

        let path = store.save(&definition).unwrap();
        assert_eq!(path, Path::new("saved/s1.json"));

        let written: Value =
            serde_json::from_str(&fs.read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["operation"], "addSpectrum");
        assert_eq!(written["followers"][0]["id"], "save1");
    }
}
