// src/operations/command.rs

//! Shell-command operation executor.

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, info};

use crate::instruction::catalog::OperationKind;
use crate::operations::{LoggingExecutor, OperationExecutor, OperationRequest, Stage};

/// Commands configured for one operation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationCommand {
    pub cmd: String,
    /// Command for the synthetic search step of download operations.
    pub search_cmd: Option<String>,
    /// Command for the compare step of comparison plots.
    pub compare_cmd: Option<String>,
}

/// Runs the configured command for each operation kind.
///
/// The request is written as JSON to the command's stdin. Its stdout, parsed
/// as JSON if possible and as plain text otherwise, becomes the artifact
/// value. A non-zero exit status is a failure. Kinds without a command fall
/// back to [`LoggingExecutor`].
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    commands: HashMap<OperationKind, OperationCommand>,
    fallback: LoggingExecutor,
}

impl CommandExecutor {
    pub fn new(commands: HashMap<OperationKind, OperationCommand>) -> Self {
        Self {
            commands,
            fallback: LoggingExecutor,
        }
    }

    fn command_for(&self, kind: OperationKind, stage: Stage) -> Option<&str> {
        let configured = self.commands.get(&kind)?;
        match stage {
            Stage::Run => Some(configured.cmd.as_str()),
            Stage::Search => configured.search_cmd.as_deref(),
            Stage::Compare => configured.compare_cmd.as_deref(),
        }
    }
}

impl OperationExecutor for CommandExecutor {
    fn execute(&self, request: &OperationRequest<'_>) -> Result<Value> {
        match self.command_for(request.kind, request.stage) {
            Some(cmd) => {
                info!(
                    operation = %request.kind,
                    task = %request.id,
                    cmd = %cmd,
                    "running operation command"
                );
                run_command(cmd, &request.to_json())
            }
            None => self.fallback.execute(request),
        }
    }
}

fn shell(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

fn run_command(cmd: &str, request: &Value) -> Result<Value> {
    let payload = serde_json::to_vec(request).context("serialising operation request")?;

    let mut child = shell(cmd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning command '{cmd}'"))?;

    // Feed stdin from a separate thread so a command that writes before it
    // reads cannot deadlock against us.
    let writer = child.stdin.take().map(|mut stdin| {
        std::thread::spawn(move || match stdin.write_all(&payload) {
            Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
            _ => Ok(()),
        })
    });

    let output = child
        .wait_with_output()
        .with_context(|| format!("waiting for command '{cmd}'"))?;

    if let Some(writer) = writer {
        match writer.join() {
            Ok(result) => result.with_context(|| format!("writing request to '{cmd}'"))?,
            Err(_) => bail!("stdin writer for '{cmd}' panicked"),
        }
    }

    for line in String::from_utf8_lossy(&output.stderr).lines() {
        debug!(cmd = %cmd, "stderr: {}", line);
    }

    if !output.status.success() {
        bail!(
            "command '{cmd}' exited with code {}",
            output.status.code().unwrap_or(-1)
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(stdout).unwrap_or_else(|_| Value::String(stdout.to_string())))
}
