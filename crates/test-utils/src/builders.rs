#![allow(dead_code)]

use equinox_automation::instruction::element::Element;
use equinox_automation::instruction::json::element_to_json;
use equinox_automation::instruction::model::{InstructionSet, ROOT_ELEMENT};
use equinox_automation::instruction::xml::write_xml;

/// Builder for instruction sets to simplify test setup.
pub struct InstructionSetBuilder {
    settings: Element,
    operations: Vec<Element>,
}

impl InstructionSetBuilder {
    pub fn new() -> Self {
        Self {
            settings: Element::new("settings"),
            operations: Vec::new(),
        }
    }

    pub fn run_mode(self, mode: &str) -> Self {
        self.setting("runMode", mode)
    }

    pub fn run_silent(self, silent: bool) -> Self {
        self.setting("runSilent", &silent.to_string())
    }

    pub fn overwrite_files(self, overwrite: bool) -> Self {
        self.setting("overwriteFiles", &overwrite.to_string())
    }

    pub fn setting(mut self, name: &str, value: &str) -> Self {
        self.settings = self.settings.with_text_child(name, value);
        self
    }

    pub fn op(mut self, op: OperationBuilder) -> Self {
        self.operations.push(op.build());
        self
    }

    pub fn element(self) -> Element {
        let mut root = Element::new(ROOT_ELEMENT);
        if !self.settings.children.is_empty() {
            root = root.with_child(self.settings);
        }
        for op in self.operations {
            root = root.with_child(op);
        }
        root
    }

    pub fn build(self) -> InstructionSet {
        InstructionSet::new("test.xml", self.element())
    }

    pub fn to_xml(self) -> String {
        write_xml(&self.element()).expect("Failed to render instruction set as XML")
    }

    pub fn to_json(self) -> String {
        serde_json::to_string_pretty(&element_to_json(&self.element()))
            .expect("Failed to render instruction set as JSON")
    }
}

impl Default for InstructionSetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one operation element.
pub struct OperationBuilder {
    element: Element,
}

impl OperationBuilder {
    pub fn new(name: &str, id: &str) -> Self {
        Self {
            element: Element::new(name).with_text_child("id", id),
        }
    }

    pub fn child(mut self, name: &str, text: &str) -> Self {
        self.element = self.element.with_text_child(name, text);
        self
    }

    pub fn search_entry(mut self, attribute: &str, keyword: &str) -> Self {
        let entry = Element::new("searchEntry")
            .with_text_child("attributeName", attribute)
            .with_text_child("keyword", keyword);
        self.element = self.element.with_child(entry);
        self
    }

    pub fn mission_parameter(mut self, name: &str, value: &str) -> Self {
        let param = Element::new("missionParameter")
            .with_text_child("name", name)
            .with_text_child("value", value);
        self.element = self.element.with_child(param);
        self
    }

    pub fn build(self) -> Element {
        self.element
    }
}

/// `<addSpectrum>` loaded from a `.spec` bundle.
pub fn add_spectrum(id: &str) -> OperationBuilder {
    OperationBuilder::new("addSpectrum", id).child("specPath", &format!("/data/{id}.spec"))
}

/// `<downloadSpectrum>` with one search entry.
pub fn download_spectrum(id: &str, output: &str) -> OperationBuilder {
    OperationBuilder::new("downloadSpectrum", id)
        .search_entry("name", id)
        .child("outputPath", output)
}

/// `<addSpectrum>` fed by a download.
pub fn add_downloaded_spectrum(id: &str, download: &str) -> OperationBuilder {
    OperationBuilder::new("addSpectrum", id).child("downloadId", download)
}

pub fn save_spectrum(id: &str, spectrum: &str, output: &str) -> OperationBuilder {
    OperationBuilder::new("saveSpectrum", id)
        .child("spectrumId", spectrum)
        .child("outputPath", output)
}

pub fn add_headless_sequence(id: &str) -> OperationBuilder {
    OperationBuilder::new("addHeadlessStressSequence", id)
        .child("inputPath", &format!("/data/{id}.sth"))
}

pub fn equivalent_stress(id: &str, sequence: &str) -> OperationBuilder {
    OperationBuilder::new("equivalentStressAnalysis", id).child("headlessStressSequenceId", sequence)
}

/// `<saveEquivalentStresses>` over several analyses.
pub fn save_equivalent_stresses(id: &str, analyses: &[&str], output: &str) -> OperationBuilder {
    let mut op = OperationBuilder::new("saveEquivalentStresses", id);
    for analysis in analyses {
        op = op.child("equivalentStressId", analysis);
    }
    op.child("outputPath", output)
}

/// `<plotLifeFactors>` comparing several analyses.
pub fn plot_life_factors(id: &str, analyses: &[&str], output: &str) -> OperationBuilder {
    let mut op = OperationBuilder::new("plotLifeFactors", id);
    for analysis in analyses {
        op = op.child("equivalentStressId", analysis);
    }
    op.child("outputPath", output)
}
