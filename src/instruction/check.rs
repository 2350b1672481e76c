// src/instruction/check.rs

//! Check phase: validate an instruction set before anything is built.
//!
//! Stateless and fail-fast: the first problem found is returned as
//! [`AutomationError::Validation`], naming the offending element by its
//! dotted family tree and the source file.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, info};

use crate::errors::{AutomationError, Result, ValidationWarning};
use crate::fs::FileSystem;
use crate::instruction::builder::synthetic_owner_id;
use crate::instruction::catalog::{DependencyRule, OperationKind, Reference};
use crate::instruction::element::Element;
use crate::instruction::model::{
    InstructionSet, Operation, ROOT_ELEMENT, RunSettings, SETTINGS_ELEMENT, parse_bool,
};
use crate::types::RunMode;

const SEARCH_CRITERIA: [&str; 4] = ["Contains", "Equals", "Starts with", "Ends with"];
const CDF_SET_PARTS: [&str; 5] = ["anaPath", "cvtPath", "flsPath", "xlsPath", "convSheet"];

/// What a successful check hands back: the parsed settings and the
/// operations in builder processing order.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub settings: RunSettings,
    pub plan: Vec<Operation>,
}

pub fn check(set: &InstructionSet, fs: &dyn FileSystem) -> Result<CheckReport> {
    let checker = Checker { set, fs };
    let report = checker.run()?;
    info!(
        file = %set.source.display(),
        operations = report.plan.len(),
        run_mode = %report.settings.run_mode,
        "instruction set check passed"
    );
    Ok(report)
}

struct Checker<'a> {
    set: &'a InstructionSet,
    fs: &'a dyn FileSystem,
}

impl Checker<'_> {
    fn run(&self) -> Result<CheckReport> {
        let root = &self.set.root;
        if root.name != ROOT_ELEMENT {
            return Err(self.warning(
                &root.name,
                format!("Root element must be <{ROOT_ELEMENT}>, found <{}>.", root.name),
            ));
        }

        self.check_known_elements()?;
        let settings = self.check_settings()?;
        let ids = self.check_ids()?;

        for kind in OperationKind::ALL {
            for element in self.set.elements_of(kind) {
                self.check_operation(kind, element, &ids, &settings)?;
            }
        }

        let plan = self.set.operations()?;
        self.check_acyclic(&plan)?;

        Ok(CheckReport { settings, plan })
    }

    fn check_known_elements(&self) -> Result<()> {
        for child in &self.set.root.children {
            if child.name != SETTINGS_ELEMENT && OperationKind::from_element_name(&child.name).is_none() {
                return Err(self.warning(
                    &family(&[&child.name]),
                    format!("Unknown operation element <{}>.", child.name),
                ));
            }
        }
        Ok(())
    }

    fn check_settings(&self) -> Result<RunSettings> {
        let Some(settings) = self.set.settings() else {
            return Ok(RunSettings::default());
        };

        if self.set.root.children_named(SETTINGS_ELEMENT).count() > 1 {
            return Err(self.warning(
                &family(&[SETTINGS_ELEMENT]),
                "Only one <settings> element is allowed.",
            ));
        }

        if let Some(mode) = settings.child_text("runMode") {
            if mode.parse::<RunMode>().is_err() {
                return Err(self.warning(
                    &family(&[SETTINGS_ELEMENT, "runMode"]),
                    format!(
                        "Invalid value '{mode}'. Run mode must be one of {}.",
                        RunMode::VALUES.join(", ")
                    ),
                ));
            }
        }

        for flag in ["runSilent", "overwriteFiles"] {
            if let Some(value) = settings.child_text(flag) {
                if parse_bool(value).is_none() {
                    return Err(self.warning(
                        &family(&[SETTINGS_ELEMENT, flag]),
                        format!("Invalid value '{value}'. Expected 'true' or 'false'."),
                    ));
                }
            }
        }

        RunSettings::from_set(self.set)
    }

    /// Every operation needs a non-empty, unique id, and no id may take the
    /// place of the `ownerOf_<id>` step of a download or comparison plot.
    fn check_ids(&self) -> Result<HashMap<&str, OperationKind>> {
        let mut ids = HashMap::new();

        for kind in OperationKind::ALL {
            for element in self.set.elements_of(kind) {
                let name = kind.element_name();
                let Some(id) = element.non_empty_child_text("id") else {
                    return Err(self.obligatory(&[name], "id"));
                };
                if ids.insert(id, kind).is_some() {
                    return Err(self.warning(
                        &family(&[name, "id"]),
                        format!("Task id '{id}' is not unique."),
                    ));
                }
            }
        }

        let owned = OperationKind::ALL
            .into_iter()
            .filter(|k| k.spec().has_synthetic_owner())
            .flat_map(|k| self.set.elements_of(k).map(move |e| (k, e)));
        for (kind, element) in owned {
            let Some(id) = element.non_empty_child_text("id") else {
                continue;
            };
            let reserved = synthetic_owner_id(id);
            if let Some(taken_by) = ids.get(reserved.as_str()) {
                return Err(self.warning(
                    &family(&[taken_by.element_name(), "id"]),
                    format!("Task id '{reserved}' is reserved for <{kind}> '{id}'."),
                ));
            }
        }

        Ok(ids)
    }

    fn check_operation(
        &self,
        kind: OperationKind,
        element: &Element,
        ids: &HashMap<&str, OperationKind>,
        settings: &RunSettings,
    ) -> Result<()> {
        let name = kind.element_name();
        let spec = kind.spec();
        debug!(operation = %name, "checking operation");

        match spec.dependency {
            DependencyRule::None => {}
            DependencyRule::One {
                alternatives,
                optional,
            } => {
                let present: Vec<&Reference> = alternatives
                    .iter()
                    .filter(|r| element.child(r.field).is_some())
                    .collect();

                match present.as_slice() {
                    [] if optional => {}
                    [] => {
                        let fields: Vec<_> = alternatives.iter().map(|r| r.field).collect();
                        return Err(self.obligatory(&[name], &fields.join("' or '")));
                    }
                    [reference] => {
                        let count = element.children_named(reference.field).count();
                        if count > 1 {
                            return Err(self.warning(
                                &family(&[name, reference.field]),
                                format!("Only one <{}> element is allowed.", reference.field),
                            ));
                        }
                        self.check_reference(name, element, reference, ids)?;
                    }
                    [_, second, ..] => {
                        return Err(self.warning(
                            &family(&[name, second.field]),
                            "Only one dependency may be given for this operation.",
                        ));
                    }
                }
            }
            DependencyRule::Many { reference, min } => {
                let count = element.children_named(reference.field).count();
                if count < min {
                    return Err(self.warning(
                        &family(&[name, reference.field]),
                        format!("Minimum {min} <{}> elements are required.", reference.field),
                    ));
                }

                let mut seen = HashSet::new();
                for child in element.children_named(reference.field) {
                    let target = child.text.trim();
                    if !seen.insert(target) {
                        return Err(self.warning(
                            &family(&[name, reference.field]),
                            format!("Dependency '{target}' is listed more than once."),
                        ));
                    }
                    self.check_reference_target(name, element, &reference, target, ids)?;
                }
            }
        }

        if spec.output_path {
            self.check_output_path(name, element, settings)?;
        }
        if spec.recipient {
            self.require_text(name, element, "recipient")?;
        }
        for field in spec.required {
            self.require_text(name, element, field)?;
        }
        if spec.mission_parameters {
            self.check_mission_parameters(name, element)?;
        }
        if spec.fan_out.is_some() {
            self.check_search_entries(name, element)?;
        }
        if kind == OperationKind::AddSpectrum {
            self.check_spectrum_source(name, element)?;
        }

        Ok(())
    }

    fn check_reference(
        &self,
        name: &str,
        element: &Element,
        reference: &Reference,
        ids: &HashMap<&str, OperationKind>,
    ) -> Result<()> {
        let target = self.require_text(name, element, reference.field)?;
        self.check_reference_target(name, element, reference, target, ids)
    }

    fn check_reference_target(
        &self,
        name: &str,
        element: &Element,
        reference: &Reference,
        target: &str,
        ids: &HashMap<&str, OperationKind>,
    ) -> Result<()> {
        let path = family(&[name, reference.field]);
        let owner = element.child_text("id").unwrap_or_default();

        if target.is_empty() {
            return Err(self.warning(&path, "Empty value. A task id is required."));
        }

        match ids.get(target) {
            None => Err(self.warning(
                &path,
                format!(
                    "Cannot find element with task id '{target}' which appears to be a dependency of <{name}> '{owner}'."
                ),
            )),
            Some(kind) if !reference.targets.accepts(*kind) => Err(self.warning(
                &path,
                format!(
                    "Task id '{target}' refers to <{}>, expected {}.",
                    kind.element_name(),
                    reference.targets.describe()
                ),
            )),
            Some(_) => Ok(()),
        }
    }

    fn check_output_path(&self, name: &str, element: &Element, settings: &RunSettings) -> Result<()> {
        let path = self.require_text(name, element, "outputPath")?;
        if !settings.overwrite_files && self.fs.exists(Path::new(path)) {
            return Err(self.warning(
                &family(&[name, "outputPath"]),
                format!(
                    "Output file '{path}' already exists. Set overwriteFiles to true to replace it."
                ),
            ));
        }
        Ok(())
    }

    fn check_mission_parameters(&self, name: &str, element: &Element) -> Result<()> {
        let params: Vec<&Element> = element.children_named("missionParameter").collect();
        if params.is_empty() {
            return Err(self.obligatory(&[name], "missionParameter"));
        }

        for param in params {
            self.require_text(name, param, "name")
                .map_err(|_| self.obligatory(&[name, "missionParameter"], "name"))?;
            let value = param
                .non_empty_child_text("value")
                .ok_or_else(|| self.obligatory(&[name, "missionParameter"], "value"))?;
            if value.parse::<f64>().is_err() {
                return Err(self.warning(
                    &family(&[name, "missionParameter", "value"]),
                    format!("Invalid value '{value}'. Mission parameter values must be numeric."),
                ));
            }
        }
        Ok(())
    }

    fn check_search_entries(&self, name: &str, element: &Element) -> Result<()> {
        let entries: Vec<&Element> = element.children_named("searchEntry").collect();
        if entries.is_empty() {
            return Err(self.obligatory(&[name], "searchEntry"));
        }

        for entry in entries {
            for field in ["attributeName", "keyword"] {
                if entry.non_empty_child_text(field).is_none() {
                    return Err(self.obligatory(&[name, "searchEntry"], field));
                }
            }
            if let Some(criteria) = entry.child_text("criteria") {
                if !SEARCH_CRITERIA.contains(&criteria) {
                    return Err(self.warning(
                        &family(&[name, "searchEntry", "criteria"]),
                        format!(
                            "Invalid value '{criteria}'. Search criteria must be one of {}.",
                            SEARCH_CRITERIA.join(", ")
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// A spectrum comes from a download, a `.spec` bundle, or a full CDF set.
    fn check_spectrum_source(&self, name: &str, element: &Element) -> Result<()> {
        if element.child("downloadId").is_some() || element.non_empty_child_text("specPath").is_some() {
            return Ok(());
        }
        if CDF_SET_PARTS.iter().all(|p| element.child(p).is_none()) {
            return Err(self.obligatory(&[name], "specPath"));
        }
        for part in CDF_SET_PARTS {
            self.require_text(name, element, part)?;
        }
        Ok(())
    }

    fn check_acyclic(&self, plan: &[Operation]) -> Result<()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for op in plan {
            graph.add_node(op.id.as_str());
        }
        for op in plan {
            for dep in &op.references {
                graph.add_edge(dep.as_str(), op.id.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(self.warning(
                ROOT_ELEMENT,
                format!("Dependency cycle detected involving task id '{}'.", cycle.node_id()),
            )),
        }
    }

    fn require_text<'e>(&self, name: &str, element: &'e Element, field: &str) -> Result<&'e str> {
        element
            .non_empty_child_text(field)
            .ok_or_else(|| self.obligatory(&[name], field))
    }

    fn obligatory(&self, parents: &[&str], field: &str) -> AutomationError {
        self.warning(
            &family(parents),
            format!("Cannot locate element '{field}'. This element is obligatory."),
        )
    }

    fn warning(&self, element: &str, message: impl Into<String>) -> AutomationError {
        AutomationError::Validation(ValidationWarning::new(
            element,
            self.set.source.clone(),
            message,
        ))
    }
}

/// Dotted family tree below the root, e.g. `equinoxInput.saveSpectrum.id`.
fn family(parts: &[&str]) -> String {
    let mut path = ROOT_ELEMENT.to_string();
    for part in parts {
        path.push('.');
        path.push_str(part);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn op(name: &str, id: &str) -> Element {
        Element::new(name).with_text_child("id", id)
    }

    fn check_root(root: Element) -> Result<CheckReport> {
        check(&InstructionSet::new("set.xml", root), &MockFileSystem::new())
    }

    fn warning_of(result: Result<CheckReport>) -> ValidationWarning {
        match result {
            Err(AutomationError::Validation(w)) => w,
            other => panic!("expected a validation warning, got {other:?}"),
        }
    }

    #[test]
    fn missing_dependency_names_element_and_file() {
        let root = Element::new(ROOT_ELEMENT)
            .with_child(op("saveSpectrum", "save1").with_text_child("spectrumId", "ghost").with_text_child("outputPath", "/o.sp"));

        let w = warning_of(check_root(root));
        assert_eq!(w.element, "equinoxInput.saveSpectrum.spectrumId");
        assert_eq!(w.file, Path::new("set.xml"));
        assert!(w.message.contains("'ghost'"), "{}", w.message);
    }

    #[test]
    fn dependency_must_point_at_an_accepted_kind() {
        let root = Element::new(ROOT_ELEMENT)
            .with_child(op("addHeadlessStressSequence", "h1").with_text_child("inputPath", "/a.sth"))
            .with_child(
                op("saveSpectrum", "save1")
                    .with_text_child("spectrumId", "h1")
                    .with_text_child("outputPath", "/o.sp"),
            );

        let w = warning_of(check_root(root));
        assert!(w.message.contains("<addSpectrum>"), "{}", w.message);
    }

    #[test]
    fn ids_are_obligatory_and_unique() {
        let root = Element::new(ROOT_ELEMENT).with_child(Element::new("addSpectrum").with_text_child("specPath", "/a"));
        assert_eq!(warning_of(check_root(root)).element, "equinoxInput.addSpectrum");

        let root = Element::new(ROOT_ELEMENT)
            .with_child(op("addSpectrum", "s1").with_text_child("specPath", "/a"))
            .with_child(op("addHeadlessStressSequence", "s1").with_text_child("inputPath", "/b"));
        assert!(warning_of(check_root(root)).message.contains("not unique"));
    }

    #[test]
    fn multiple_input_minimum_is_enforced() {
        let root = Element::new(ROOT_ELEMENT)
            .with_child(op("addHeadlessStressSequence", "h1").with_text_child("inputPath", "/a"))
            .with_child(op("equivalentStressAnalysis", "e1").with_text_child("headlessStressSequenceId", "h1"))
            .with_child(
                op("plotLifeFactors", "p1")
                    .with_text_child("equivalentStressId", "e1")
                    .with_text_child("outputPath", "/p.png"),
            );

        let w = warning_of(check_root(root));
        assert!(w.message.contains("Minimum 2"), "{}", w.message);
    }

    #[test]
    fn settings_values_are_validated() {
        let root = Element::new(ROOT_ELEMENT)
            .with_child(Element::new(SETTINGS_ELEMENT).with_text_child("runMode", "fast"));
        assert_eq!(warning_of(check_root(root)).element, "equinoxInput.settings.runMode");

        let root = Element::new(ROOT_ELEMENT)
            .with_child(Element::new(SETTINGS_ELEMENT).with_text_child("overwriteFiles", "yes"));
        assert_eq!(
            warning_of(check_root(root)).element,
            "equinoxInput.settings.overwriteFiles"
        );
    }

    #[test]
    fn existing_output_requires_overwrite() {
        let fs = MockFileSystem::new();
        fs.add_file("/out/s.sp", "old");

        let build = |overwrite: &str| {
            Element::new(ROOT_ELEMENT)
                .with_child(Element::new(SETTINGS_ELEMENT).with_text_child("overwriteFiles", overwrite))
                .with_child(op("addSpectrum", "s1").with_text_child("specPath", "/a.spec"))
                .with_child(
                    op("saveSpectrum", "save1")
                        .with_text_child("spectrumId", "s1")
                        .with_text_child("outputPath", "/out/s.sp"),
                )
        };

        let blocked = check(&InstructionSet::new("set.xml", build("false")), &fs);
        assert!(warning_of(blocked).message.contains("already exists"));

        let report = check(&InstructionSet::new("set.xml", build("true")), &fs).unwrap();
        assert_eq!(report.plan.len(), 2);
        assert!(report.settings.overwrite_files);
    }

    #[test]
    fn search_entries_are_validated() {
        let entry = Element::new("searchEntry")
            .with_text_child("attributeName", "name")
            .with_text_child("keyword", "A320")
            .with_text_child("criteria", "Sounds like");
        let root = Element::new(ROOT_ELEMENT).with_child(
            op("downloadSpectrum", "d1")
                .with_text_child("outputPath", "/d")
                .with_child(entry),
        );

        let w = warning_of(check_root(root));
        assert_eq!(w.element, "equinoxInput.downloadSpectrum.searchEntry.criteria");
    }

    #[test]
    fn unknown_elements_are_rejected() {
        let root = Element::new(ROOT_ELEMENT).with_child(op("launchRocket", "x"));
        assert!(warning_of(check_root(root)).message.contains("launchRocket"));
    }

    #[test]
    fn valid_set_returns_plan_in_processing_order() {
        let root = Element::new(ROOT_ELEMENT)
            .with_child(
                op("shareFile", "share1")
                    .with_text_child("fileId", "save1")
                    .with_text_child("recipient", "alice"),
            )
            .with_child(
                op("saveSpectrum", "save1")
                    .with_text_child("spectrumId", "s1")
                    .with_text_child("outputPath", "/o.sp"),
            )
            .with_child(op("addSpectrum", "s1").with_text_child("specPath", "/a.spec"));

        let report = check_root(root).unwrap();
        let ids: Vec<_> = report.plan.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "save1", "share1"]);
    }
}
