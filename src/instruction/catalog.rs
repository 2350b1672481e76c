// src/instruction/catalog.rs

//! Table of supported operation elements.
//!
//! Declaration order of [`OperationKind`] is the processing order of the graph
//! builder. Every kind an operation can depend on is declared before it, which
//! is what rules out cycles at construction time.

use std::fmt;

use serde::Serialize;

/// Value flowing between operations, used to check wiring compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    SearchHit,
    DownloadedFile,
    Spectrum,
    Stf,
    HeadlessStressSequence,
    StressSequence,
    EquivalentStress,
    /// Collected comparison data, handed from a compare step to its plot.
    Dataset,
    OutputFile,
    Receipt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    DownloadSpectrum,
    AddSpectrum,
    AssignMissionParametersToSpectrum,
    EditSpectrumInfo,
    SaveSpectrum,
    SaveSpectrumFile,
    ShareSpectrum,
    ShareSpectrumFile,
    ExportSpectrum,
    UploadSpectrum,
    DownloadStf,
    AddStf,
    OverrideFatigueMission,
    AssignMissionParametersToStf,
    SaveStf,
    ShareStf,
    ExportStf,
    UploadStf,
    AddHeadlessStressSequence,
    GenerateStressSequence,
    AssignMissionParametersToStressSequence,
    EditStressSequenceInfo,
    SaveStressSequence,
    PlotMissionProfile,
    SaveMissionProfileInfo,
    PlotTypicalFlight,
    EquivalentStressAnalysis,
    PlotLevelCrossing,
    PlotRainflowHistogram,
    SaveRainflowCycleInfo,
    SaveAnalysisOutputFile,
    PlotStressSequenceComparison,
    PlotLevelCrossingComparison,
    PlotEquivalentStressComparison,
    PlotLifeFactors,
    PlotEquivalentStressRatios,
    SaveEquivalentStresses,
    SaveLifeFactors,
    SaveEquivalentStressRatios,
    ShareFile,
}

/// Where a reference field may point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Targets {
    Kinds(&'static [OperationKind]),
    /// Any operation whose element name starts with one of these prefixes.
    Prefixes(&'static [&'static str]),
}

impl Targets {
    pub fn accepts(&self, kind: OperationKind) -> bool {
        match self {
            Targets::Kinds(kinds) => kinds.contains(&kind),
            Targets::Prefixes(prefixes) => prefixes
                .iter()
                .any(|p| kind.element_name().starts_with(p)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Targets::Kinds(kinds) => kinds
                .iter()
                .map(|k| format!("<{}>", k.element_name()))
                .collect::<Vec<_>>()
                .join(" or "),
            Targets::Prefixes(prefixes) => {
                let names: Vec<_> = prefixes.iter().map(|p| format!("{p}*")).collect();
                format!("an element named {}", names.join(", "))
            }
        }
    }
}

/// A child element whose text is the id of another operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub targets: Targets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyRule {
    /// Root operation.
    None,
    /// Exactly one of `alternatives` must be present, unless `optional`.
    One {
        alternatives: &'static [Reference],
        optional: bool,
    },
    /// Repeated reference field; the operation is a multiple-input follower.
    Many { reference: Reference, min: usize },
}

/// Synthetic search step placed in front of a download operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    pub title: &'static str,
    pub produces: ArtifactKind,
}

/// Multiple-input compare step placed in front of a comparison plot. It
/// collects every referenced input; the plot itself follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compare {
    pub title: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    pub dependency: DependencyRule,
    pub consumes: &'static [ArtifactKind],
    pub produces: ArtifactKind,
    pub short_running: bool,
    pub fan_out: Option<FanOut>,
    pub compare: Option<Compare>,
    /// Requires a non-empty `outputPath` child.
    pub output_path: bool,
    /// Requires a non-empty `recipient` child.
    pub recipient: bool,
    /// Requires at least one well-formed `missionParameter` child.
    pub mission_parameters: bool,
    /// Other children that must be present and non-empty.
    pub required: &'static [&'static str],
}

impl OperationSpec {
    const fn root(produces: ArtifactKind) -> Self {
        Self {
            dependency: DependencyRule::None,
            consumes: &[],
            produces,
            short_running: false,
            fan_out: None,
            compare: None,
            output_path: false,
            recipient: false,
            mission_parameters: false,
            required: &[],
        }
    }

    const fn after(
        alternatives: &'static [Reference],
        consumes: &'static [ArtifactKind],
        produces: ArtifactKind,
    ) -> Self {
        Self {
            dependency: DependencyRule::One {
                alternatives,
                optional: false,
            },
            consumes,
            ..Self::root(produces)
        }
    }

    const fn after_many(
        reference: Reference,
        min: usize,
        consumes: &'static [ArtifactKind],
        produces: ArtifactKind,
    ) -> Self {
        Self {
            dependency: DependencyRule::Many { reference, min },
            consumes,
            ..Self::root(produces)
        }
    }

    const fn compared(mut self, title: &'static str) -> Self {
        self.compare = Some(Compare { title });
        self
    }

    const fn short(mut self) -> Self {
        self.short_running = true;
        self
    }

    const fn writes_output(mut self) -> Self {
        self.output_path = true;
        self
    }

    const fn shared(mut self) -> Self {
        self.recipient = true;
        self.short_running = true;
        self
    }

    const fn with_mission_parameters(mut self) -> Self {
        self.mission_parameters = true;
        self
    }

    const fn requires(mut self, required: &'static [&'static str]) -> Self {
        self.required = required;
        self
    }

    /// Whether the builder registers an `ownerOf_<id>` step for this kind.
    pub fn has_synthetic_owner(&self) -> bool {
        self.fan_out.is_some() || self.compare.is_some()
    }
}

use ArtifactKind as A;
use OperationKind as K;

const SPECTRUM: &[Reference] = &[Reference {
    field: "spectrumId",
    targets: Targets::Kinds(&[K::AddSpectrum]),
}];
const DOWNLOADED_SPECTRUM: &[Reference] = &[Reference {
    field: "downloadId",
    targets: Targets::Kinds(&[K::DownloadSpectrum]),
}];
const EXPORTED_SPECTRUM: &[Reference] = &[Reference {
    field: "exportId",
    targets: Targets::Kinds(&[K::ExportSpectrum]),
}];
const STF: &[Reference] = &[Reference {
    field: "stfId",
    targets: Targets::Kinds(&[K::AddStf]),
}];
const EXPORTED_STF: &[Reference] = &[Reference {
    field: "exportId",
    targets: Targets::Kinds(&[K::ExportStf]),
}];
const HEADLESS_SEQUENCE: Reference = Reference {
    field: "headlessStressSequenceId",
    targets: Targets::Kinds(&[K::AddHeadlessStressSequence]),
};
const STRESS_SEQUENCE: Reference = Reference {
    field: "stressSequenceId",
    targets: Targets::Kinds(&[K::GenerateStressSequence]),
};
const EQUIVALENT_STRESS: Reference = Reference {
    field: "equivalentStressId",
    targets: Targets::Kinds(&[K::EquivalentStressAnalysis]),
};
const ANY_SEQUENCE: &[Reference] = &[STRESS_SEQUENCE, HEADLESS_SEQUENCE];
const HEADLESS_ONLY: &[Reference] = &[HEADLESS_SEQUENCE];
const GENERATED_ONLY: &[Reference] = &[STRESS_SEQUENCE];
const EQUIVALENT_ONLY: &[Reference] = &[EQUIVALENT_STRESS];
const SAVED_FILE: &[Reference] = &[Reference {
    field: "fileId",
    targets: Targets::Prefixes(&["save", "export", "plot"]),
}];

const SEQUENCES: &[ArtifactKind] = &[A::StressSequence, A::HeadlessStressSequence];
const COMPARED_SEQUENCES: &[ArtifactKind] = &[A::StressSequence, A::Dataset];
const COMPARED_EQUIVALENTS: &[ArtifactKind] = &[A::EquivalentStress, A::Dataset];

impl OperationKind {
    pub const ALL: [OperationKind; 40] = [
        K::DownloadSpectrum,
        K::AddSpectrum,
        K::AssignMissionParametersToSpectrum,
        K::EditSpectrumInfo,
        K::SaveSpectrum,
        K::SaveSpectrumFile,
        K::ShareSpectrum,
        K::ShareSpectrumFile,
        K::ExportSpectrum,
        K::UploadSpectrum,
        K::DownloadStf,
        K::AddStf,
        K::OverrideFatigueMission,
        K::AssignMissionParametersToStf,
        K::SaveStf,
        K::ShareStf,
        K::ExportStf,
        K::UploadStf,
        K::AddHeadlessStressSequence,
        K::GenerateStressSequence,
        K::AssignMissionParametersToStressSequence,
        K::EditStressSequenceInfo,
        K::SaveStressSequence,
        K::PlotMissionProfile,
        K::SaveMissionProfileInfo,
        K::PlotTypicalFlight,
        K::EquivalentStressAnalysis,
        K::PlotLevelCrossing,
        K::PlotRainflowHistogram,
        K::SaveRainflowCycleInfo,
        K::SaveAnalysisOutputFile,
        K::PlotStressSequenceComparison,
        K::PlotLevelCrossingComparison,
        K::PlotEquivalentStressComparison,
        K::PlotLifeFactors,
        K::PlotEquivalentStressRatios,
        K::SaveEquivalentStresses,
        K::SaveLifeFactors,
        K::SaveEquivalentStressRatios,
        K::ShareFile,
    ];

    pub fn element_name(self) -> &'static str {
        match self {
            K::DownloadSpectrum => "downloadSpectrum",
            K::AddSpectrum => "addSpectrum",
            K::AssignMissionParametersToSpectrum => "assignMissionParametersToSpectrum",
            K::EditSpectrumInfo => "editSpectrumInfo",
            K::SaveSpectrum => "saveSpectrum",
            K::SaveSpectrumFile => "saveSpectrumFile",
            K::ShareSpectrum => "shareSpectrum",
            K::ShareSpectrumFile => "shareSpectrumFile",
            K::ExportSpectrum => "exportSpectrum",
            K::UploadSpectrum => "uploadSpectrum",
            K::DownloadStf => "downloadStf",
            K::AddStf => "addStf",
            K::OverrideFatigueMission => "overrideFatigueMission",
            K::AssignMissionParametersToStf => "assignMissionParametersToStf",
            K::SaveStf => "saveStf",
            K::ShareStf => "shareStf",
            K::ExportStf => "exportStf",
            K::UploadStf => "uploadStf",
            K::AddHeadlessStressSequence => "addHeadlessStressSequence",
            K::GenerateStressSequence => "generateStressSequence",
            K::AssignMissionParametersToStressSequence => "assignMissionParametersToStressSequence",
            K::EditStressSequenceInfo => "editStressSequenceInfo",
            K::SaveStressSequence => "saveStressSequence",
            K::PlotMissionProfile => "plotMissionProfile",
            K::SaveMissionProfileInfo => "saveMissionProfileInfo",
            K::PlotTypicalFlight => "plotTypicalFlight",
            K::EquivalentStressAnalysis => "equivalentStressAnalysis",
            K::PlotLevelCrossing => "plotLevelCrossing",
            K::PlotRainflowHistogram => "plotRainflowHistogram",
            K::SaveRainflowCycleInfo => "saveRainflowCycleInfo",
            K::SaveAnalysisOutputFile => "saveAnalysisOutputFile",
            K::PlotStressSequenceComparison => "plotStressSequenceComparison",
            K::PlotLevelCrossingComparison => "plotLevelCrossingComparison",
            K::PlotEquivalentStressComparison => "plotEquivalentStressComparison",
            K::PlotLifeFactors => "plotLifeFactors",
            K::PlotEquivalentStressRatios => "plotEquivalentStressRatios",
            K::SaveEquivalentStresses => "saveEquivalentStresses",
            K::SaveLifeFactors => "saveLifeFactors",
            K::SaveEquivalentStressRatios => "saveEquivalentStressRatios",
            K::ShareFile => "shareFile",
        }
    }

    pub fn from_element_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.element_name() == name)
    }

    pub fn spec(self) -> OperationSpec {
        type S = OperationSpec;
        let search = |title| FanOut {
            title,
            produces: A::SearchHit,
        };

        match self {
            K::DownloadSpectrum => S {
                fan_out: Some(search("Search spectra")),
                consumes: &[A::SearchHit],
                ..S::root(A::DownloadedFile)
            }
            .writes_output(),
            K::AddSpectrum => S {
                dependency: DependencyRule::One {
                    alternatives: DOWNLOADED_SPECTRUM,
                    optional: true,
                },
                consumes: &[A::DownloadedFile],
                ..S::root(A::Spectrum)
            },
            K::AssignMissionParametersToSpectrum => {
                S::after(SPECTRUM, &[A::Spectrum], A::Spectrum).with_mission_parameters()
            }
            K::EditSpectrumInfo => S::after(SPECTRUM, &[A::Spectrum], A::Spectrum).short(),
            K::SaveSpectrum | K::SaveSpectrumFile | K::ExportSpectrum => {
                S::after(SPECTRUM, &[A::Spectrum], A::OutputFile).writes_output()
            }
            K::ShareSpectrum | K::ShareSpectrumFile => {
                S::after(SPECTRUM, &[A::Spectrum], A::Receipt).shared()
            }
            K::UploadSpectrum => S::after(EXPORTED_SPECTRUM, &[A::OutputFile], A::Receipt),
            K::DownloadStf => S {
                fan_out: Some(search("Search STF files")),
                consumes: &[A::SearchHit],
                ..S::root(A::DownloadedFile)
            }
            .writes_output(),
            K::AddStf => S::after(SPECTRUM, &[A::Spectrum], A::Stf).requires(&["stfPath"]),
            K::OverrideFatigueMission => S::after(STF, &[A::Stf], A::Stf)
                .requires(&["fatigueMission"])
                .short(),
            K::AssignMissionParametersToStf => {
                S::after(STF, &[A::Stf], A::Stf).with_mission_parameters()
            }
            K::SaveStf | K::ExportStf => S::after(STF, &[A::Stf], A::OutputFile).writes_output(),
            K::ShareStf => S::after(STF, &[A::Stf], A::Receipt).shared(),
            K::UploadStf => S::after(EXPORTED_STF, &[A::OutputFile], A::Receipt),
            K::AddHeadlessStressSequence => {
                S::root(A::HeadlessStressSequence).requires(&["inputPath"])
            }
            K::GenerateStressSequence => S::after(STF, &[A::Stf], A::StressSequence),
            K::AssignMissionParametersToStressSequence => S::after(
                HEADLESS_ONLY,
                &[A::HeadlessStressSequence],
                A::HeadlessStressSequence,
            )
            .with_mission_parameters(),
            K::EditStressSequenceInfo => S::after(
                HEADLESS_ONLY,
                &[A::HeadlessStressSequence],
                A::HeadlessStressSequence,
            )
            .short(),
            K::SaveStressSequence | K::PlotTypicalFlight => {
                S::after(ANY_SEQUENCE, SEQUENCES, A::OutputFile).writes_output()
            }
            K::PlotMissionProfile | K::SaveMissionProfileInfo => {
                S::after(GENERATED_ONLY, &[A::StressSequence], A::OutputFile).writes_output()
            }
            K::EquivalentStressAnalysis => S::after(ANY_SEQUENCE, SEQUENCES, A::EquivalentStress),
            K::PlotLevelCrossing
            | K::PlotRainflowHistogram
            | K::SaveRainflowCycleInfo
            | K::SaveAnalysisOutputFile => {
                S::after(EQUIVALENT_ONLY, &[A::EquivalentStress], A::OutputFile)
                    .writes_output()
            }
            K::PlotStressSequenceComparison => {
                S::after_many(STRESS_SEQUENCE, 2, COMPARED_SEQUENCES, A::OutputFile)
                    .compared("Compare stress sequences")
                    .writes_output()
            }
            K::PlotLevelCrossingComparison => {
                S::after_many(EQUIVALENT_STRESS, 2, COMPARED_EQUIVALENTS, A::OutputFile)
                    .compared("Compare level crossings")
                    .writes_output()
            }
            K::PlotEquivalentStressComparison => {
                S::after_many(EQUIVALENT_STRESS, 2, COMPARED_EQUIVALENTS, A::OutputFile)
                    .compared("Compare equivalent stresses")
                    .writes_output()
            }
            K::PlotLifeFactors => {
                S::after_many(EQUIVALENT_STRESS, 2, COMPARED_EQUIVALENTS, A::OutputFile)
                    .compared("Generate life factors")
                    .writes_output()
            }
            K::PlotEquivalentStressRatios => {
                S::after_many(EQUIVALENT_STRESS, 2, COMPARED_EQUIVALENTS, A::OutputFile)
                    .compared("Generate stress ratios")
                    .writes_output()
            }
            K::SaveEquivalentStresses | K::SaveLifeFactors | K::SaveEquivalentStressRatios => {
                S::after_many(EQUIVALENT_STRESS, 1, &[A::EquivalentStress], A::OutputFile)
                    .writes_output()
            }
            K::ShareFile => S::after(SAVED_FILE, &[A::OutputFile], A::Receipt).shared(),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}
