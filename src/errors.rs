// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Structured warning produced by the instruction-set check phase.
///
/// `element` is the dotted family tree of the offending element, e.g.
/// `equinoxInput.saveSpectrum.spectrumId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub element: String,
    pub file: PathBuf,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(element: impl Into<String>, file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            file: file.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (element '{}' in instruction set '{}')",
            self.message,
            self.element,
            self.file.display()
        )
    }
}

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Check failed: {0}")]
    Validation(ValidationWarning),

    #[error("Dependency '{dependency}' of task '{task}' is not registered as a task")]
    DependencyNotReady { task: String, dependency: String },

    #[error("Cannot wire '{follower}' after '{owner}': {reason}")]
    IncompatibleWiring {
        owner: String,
        follower: String,
        reason: String,
    },

    #[error("Invalid follower configuration for '{task}': {reason}")]
    FollowerConfig { task: String, reason: String },

    #[error("Unknown task handle: {0}")]
    UnknownTask(String),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Execution context requires a running Tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AutomationError>;
