// src/fs/mock.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow};

use super::FileSystem;

/// In-memory file system. Clones share the same files.
///
/// Directories are implicit: a path exists if it is a file or a prefix of one.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.files()
            .insert(path.as_ref().to_path_buf(), content.into());
    }

    /// Paths of every file, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn files(&self) -> MutexGuard<'_, HashMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.files().get(path) {
            Some(content) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files()
            .keys()
            .any(|p| p == path || p.starts_with(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_exist_implicitly() {
        let fs = MockFileSystem::new();
        fs.add_file("/data/out/a.json", "{}");

        assert!(fs.exists(Path::new("/data/out/a.json")));
        assert!(fs.exists(Path::new("/data/out")));
        assert!(!fs.exists(Path::new("/data/other")));
        assert_eq!(fs.read_to_string(Path::new("/data/out/a.json")).unwrap(), "{}");
    }

    #[test]
    fn clones_share_files() {
        let fs = MockFileSystem::new();
        let clone = fs.clone();
        clone.write(Path::new("x.xml"), b"<a/>").unwrap();
        assert_eq!(fs.paths(), vec![PathBuf::from("x.xml")]);
    }
}
