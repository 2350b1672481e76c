#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use equinox_automation::engine::Automation;
use equinox_automation::exec::{PoolSizes, SilentProgress};
use equinox_automation::fs::mock::MockFileSystem;
use equinox_automation_test_utils::fake_executor::RecordingExecutor;

pub use equinox_automation_test_utils::{init_tracing, with_timeout};

/// An automation over an in-memory file system with `xml` stored at
/// `path`, running operations through `executor`.
pub fn automation_with(
    fs: &MockFileSystem,
    path: &Path,
    xml: String,
    executor: &RecordingExecutor,
) -> Automation {
    fs.add_file(path, xml);
    Automation::new(Arc::new(fs.clone()))
        .with_executor(Arc::new(executor.clone()))
        .with_progress(Arc::new(SilentProgress))
        .with_pools(PoolSizes {
            parallel_workers: 2,
            short_workers: 1,
        })
}
