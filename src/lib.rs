// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod graph;
pub mod instruction;
pub mod logging;
pub mod operations;
pub mod task;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::load_or_default;
use crate::engine::Automation;
use crate::fs::{FileSystem, RealFileSystem};
use crate::graph::RunReport;
use crate::instruction::check::CheckReport;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (defaults when the file is missing)
/// - conversion, check-only, or a full run of the instruction set
/// - Ctrl-C handling (cancels unfinished tasks)
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(PathBuf::from(&args.config))?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let automation = Automation::from_config(&cfg, fs).cancel_on_ctrl_c(true);
    let instructions = PathBuf::from(&args.instructions);

    if let Some(out) = &args.convert {
        automation.convert(&instructions, Path::new(out))?;
        println!("converted {} -> {out}", instructions.display());
        return Ok(());
    }

    if args.check_only {
        let report = automation.check(&instructions)?;
        print_plan(&instructions, &report);
        return Ok(());
    }

    let report = automation.run(&instructions).await?;
    if !report.failed().is_empty() {
        bail!(
            "{} task(s) failed: {}",
            report.failed().len(),
            report.failed().join(", ")
        );
    }
    Ok(())
}

/// Load and check an instruction set from the real file system.
pub fn check_instruction_set(path: impl AsRef<Path>) -> Result<CheckReport> {
    let automation = Automation::new(Arc::new(RealFileSystem));
    let path = path.as_ref();
    automation
        .check(path)
        .with_context(|| format!("checking {}", path.display()))
}

/// Run an instruction set with the collaborators described by `config`.
pub async fn run_instruction_set(
    path: impl AsRef<Path>,
    config: impl AsRef<Path>,
) -> Result<RunReport> {
    let cfg = load_or_default(config.as_ref())?;
    let automation = Automation::from_config(&cfg, Arc::new(RealFileSystem));
    let path = path.as_ref();
    let report = automation
        .run(path)
        .await
        .with_context(|| format!("running {}", path.display()))?;
    Ok(report)
}

/// Convert between the XML and JSON serializations, by output extension.
pub fn convert_instruction_set(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<()> {
    let automation = Automation::new(Arc::new(RealFileSystem));
    automation.convert(input.as_ref(), output.as_ref())?;
    Ok(())
}

/// Check-only output: settings and operations in processing order.
fn print_plan(path: &Path, report: &CheckReport) {
    println!("equinox-automation check: {}", path.display());
    println!("  runMode = {}", report.settings.run_mode);
    println!("  runSilent = {}", report.settings.run_silent);
    println!("  overwriteFiles = {}", report.settings.overwrite_files);
    println!();

    println!("operations ({}):", report.plan.len());
    for op in &report.plan {
        println!("  - {} <{}>", op.id, op.kind);
        if !op.references.is_empty() {
            println!("      after: {:?}", op.references);
        }
        let spec = op.kind.spec();
        if let Some(fan_out) = spec.fan_out {
            println!("      search: {}", fan_out.title);
        }
        if let Some(compare) = spec.compare {
            println!("      compare: {}", compare.title);
        }
    }

    info!(operations = report.plan.len(), "check passed");
    debug!("check-only complete (no execution)");
}
