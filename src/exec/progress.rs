// src/exec/progress.rs

//! User-facing progress lines, separate from tracing diagnostics.

use std::io::Write;

/// Receives task start/finish notifications for display.
pub trait ProgressSink: Send + Sync {
    fn started(&self, id: &str, title: &str);
    fn finished(&self, id: &str, title: &str, status: &str);
}

/// Prints one line per event to STDOUT.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutProgress;

impl ProgressSink for StdoutProgress {
    fn started(&self, id: &str, title: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "[{id}] {title}: started");
    }

    fn finished(&self, id: &str, title: &str, status: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "[{id}] {title}: {status}");
    }
}

/// Used for `runSilent` instruction sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn started(&self, _id: &str, _title: &str) {}

    fn finished(&self, _id: &str, _title: &str, _status: &str) {}
}
