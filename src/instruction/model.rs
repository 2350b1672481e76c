// src/instruction/model.rs

//! Typed views over a parsed instruction set.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::{AutomationError, Result};
use crate::instruction::catalog::{DependencyRule, OperationKind};
use crate::instruction::element::Element;
use crate::types::RunMode;

/// Name of the root element of every instruction set.
pub const ROOT_ELEMENT: &str = "equinoxInput";
pub const SETTINGS_ELEMENT: &str = "settings";

/// A loaded instruction set: its source file and root element.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionSet {
    pub source: PathBuf,
    pub root: Element,
}

impl InstructionSet {
    pub fn new(source: impl Into<PathBuf>, root: Element) -> Self {
        Self {
            source: source.into(),
            root,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn settings(&self) -> Option<&Element> {
        self.root.child(SETTINGS_ELEMENT)
    }

    /// Operation elements of `kind`, in document order.
    pub fn elements_of<'a>(&'a self, kind: OperationKind) -> impl Iterator<Item = &'a Element> + 'a {
        self.root.children_named(kind.element_name())
    }

    /// Every operation in builder processing order: catalog order first,
    /// document order within a kind.
    pub fn operations(&self) -> Result<Vec<Operation>> {
        let mut ops = Vec::new();
        for kind in OperationKind::ALL {
            for element in self.elements_of(kind) {
                ops.push(Operation::from_element(kind, element)?);
            }
        }
        Ok(ops)
    }
}

/// Instruction-set-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSettings {
    pub run_mode: RunMode,
    pub run_silent: bool,
    pub overwrite_files: bool,
    /// Opaque; handed to operation executors.
    pub analysis_engine: Option<Element>,
    /// Opaque; handed to operation executors.
    pub search_engine: Option<Element>,
}

impl RunSettings {
    pub fn from_set(set: &InstructionSet) -> Result<Self> {
        let Some(settings) = set.settings() else {
            return Ok(Self::default());
        };

        let run_mode = match settings.non_empty_child_text("runMode") {
            Some(s) => s.parse::<RunMode>().map_err(AutomationError::ConfigError)?,
            None => RunMode::default(),
        };

        Ok(Self {
            run_mode,
            run_silent: parse_flag(settings, "runSilent")?,
            overwrite_files: parse_flag(settings, "overwriteFiles")?,
            analysis_engine: settings.child("analysisEngine").cloned(),
            search_engine: settings.child("searchEngine").cloned(),
        })
    }
}

/// `true`/`false`, absent means false.
pub(crate) fn parse_flag(parent: &Element, name: &str) -> Result<bool> {
    match parent.non_empty_child_text(name) {
        None => Ok(false),
        Some(s) => parse_bool(s).ok_or_else(|| {
            AutomationError::ConfigError(format!("invalid {name}: {s} (expected \"true\" or \"false\")"))
        }),
    }
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// One operation element with its id and resolved reference ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub id: String,
    pub element: Element,
    /// Ids this operation depends on, in document order.
    pub references: Vec<String>,
}

impl Operation {
    pub fn from_element(kind: OperationKind, element: &Element) -> Result<Self> {
        let id = element
            .non_empty_child_text("id")
            .ok_or_else(|| {
                AutomationError::ConfigError(format!("<{}> element without an id", kind.element_name()))
            })?
            .to_string();

        let references = match kind.spec().dependency {
            DependencyRule::None => Vec::new(),
            DependencyRule::One { alternatives, .. } => alternatives
                .iter()
                .find_map(|r| element.non_empty_child_text(r.field))
                .map(|s| vec![s.to_string()])
                .unwrap_or_default(),
            DependencyRule::Many { reference, .. } => element
                .children_named(reference.field)
                .map(|c| c.text.trim().to_string())
                .collect(),
        };

        Ok(Self {
            kind,
            id,
            element: element.clone(),
            references,
        })
    }
}
