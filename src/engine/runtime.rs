// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::exec::{
    ExecutionContext, PoolSizes, ProgressSink, SilentProgress, StdoutProgress, TaskRunner, dispatch,
};
use crate::fs::FileSystem;
use crate::graph::RunReport;
use crate::instruction::builder::build_graph;
use crate::instruction::catalog::OperationKind;
use crate::instruction::check::{CheckReport, check};
use crate::instruction::loader::{convert, load_instruction_set};
use crate::instruction::model::InstructionSet;
use crate::operations::{
    CommandExecutor, DefinitionStore, FsDefinitionStore, LoggingExecutor, OperationExecutor,
    OperationFactory,
};
use crate::types::RunMode;

/// Loads, checks and runs instruction sets against a set of collaborators.
///
/// Every run creates its own execution context and shuts it down before
/// returning; nothing outlives a call to [`Automation::run`].
pub struct Automation {
    fs: Arc<dyn FileSystem>,
    executor: Arc<dyn OperationExecutor>,
    store: Arc<dyn DefinitionStore>,
    pools: PoolSizes,
    short_running: HashMap<OperationKind, bool>,
    progress: Arc<dyn ProgressSink>,
    cancel_on_ctrl_c: bool,
}

impl fmt::Debug for Automation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Automation")
            .field("fs", &self.fs)
            .field("pools", &self.pools)
            .field("short_running", &self.short_running)
            .finish_non_exhaustive()
    }
}

impl Automation {
    /// Logging executor, definitions saved under `saved_tasks`, default pools.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        let store = Arc::new(FsDefinitionStore::new(Arc::clone(&fs), "saved_tasks"));
        Self {
            fs,
            executor: Arc::new(LoggingExecutor),
            store,
            pools: PoolSizes::default(),
            short_running: HashMap::new(),
            progress: Arc::new(StdoutProgress),
            cancel_on_ctrl_c: false,
        }
    }

    /// Collaborators as described by a validated config file.
    pub fn from_config(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> Self {
        let store = Arc::new(FsDefinitionStore::new(Arc::clone(&fs), cfg.store.dir.clone()));
        Self::new(fs)
            .with_executor(Arc::new(CommandExecutor::new(cfg.commands())))
            .with_store(store)
            .with_pools(cfg.pool_sizes())
            .with_short_running(cfg.short_running_overrides())
    }

    pub fn with_executor(mut self, executor: Arc<dyn OperationExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn DefinitionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_pools(mut self, pools: PoolSizes) -> Self {
        self.pools = pools;
        self
    }

    pub fn with_short_running(mut self, overrides: HashMap<OperationKind, bool>) -> Self {
        self.short_running = overrides;
        self
    }

    /// Progress sink for sets that are not `runSilent`.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// On Ctrl-C, cancel every task that has not finished yet.
    pub fn cancel_on_ctrl_c(mut self, enabled: bool) -> Self {
        self.cancel_on_ctrl_c = enabled;
        self
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn load(&self, path: &Path) -> Result<InstructionSet> {
        load_instruction_set(self.fs.as_ref(), path)
    }

    /// Load and check; nothing is built or executed.
    pub fn check(&self, path: &Path) -> Result<CheckReport> {
        let set = self.load(path)?;
        check(&set, self.fs.as_ref())
    }

    pub fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        convert(self.fs.as_ref(), input, output)
    }

    /// Load, check, build, dispatch and wait until every task has finished
    /// or starved.
    pub async fn run(&self, path: &Path) -> Result<RunReport> {
        let set = self.load(path)?;
        self.run_set(&set).await
    }

    /// Run an already loaded instruction set. Must be called inside a Tokio
    /// runtime.
    pub async fn run_set(&self, set: &InstructionSet) -> Result<RunReport> {
        let CheckReport { settings, .. } = check(set, self.fs.as_ref())?;
        let run_mode = settings.run_mode;
        let progress = if settings.run_silent {
            Arc::new(SilentProgress) as Arc<dyn ProgressSink>
        } else {
            Arc::clone(&self.progress)
        };

        let factory = OperationFactory::new(Arc::clone(&self.executor), settings)
            .with_short_running(self.short_running.clone());
        let built = build_graph(set, &factory)?;

        let context = Arc::new(ExecutionContext::new(self.pools)?);
        let runner = TaskRunner::new(Arc::clone(&built.graph), context.clone(), progress);

        let dispatched = match dispatch(&built, run_mode, &runner, Arc::clone(&self.store)) {
            Ok(summary) => summary,
            Err(e) => {
                context.wait_idle().await;
                context.shutdown().await;
                return Err(e);
            }
        };
        debug!(roots = ?dispatched.submitted, "waiting for tasks");

        self.wait(&context, &runner).await;
        context.shutdown().await;

        let report = RunReport::from_graph(&built.graph);
        if run_mode == RunMode::Save {
            info!(saved = dispatched.submitted.len(), "task definitions saved");
        } else {
            report.log_summary();
        }

        info!(file = %set.source.display(), %run_mode, "instruction set finished");
        Ok(report)
    }

    async fn wait<V>(&self, context: &ExecutionContext, runner: &TaskRunner<V>)
    where
        V: Clone + Send + Sync + 'static,
    {
        if !self.cancel_on_ctrl_c {
            context.wait_idle().await;
            return;
        }

        tokio::select! {
            _ = context.wait_idle() => {}
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                } else {
                    warn!("Ctrl+C received; cancelling unfinished tasks");
                    for node in runner.graph().node_ids() {
                        if let Err(e) = runner.cancel(node) {
                            warn!(node = %node, error = %e, "cancel failed");
                        }
                    }
                }
                context.wait_idle().await;
            }
        }
    }
}
