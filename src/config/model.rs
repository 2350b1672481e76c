// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Configuration file as read from TOML, before validation.
///
/// ```toml
/// [pools]
/// parallel_workers = 4
/// short_workers = 2
///
/// [operation.addSpectrum]
/// cmd = "python add_spectrum.py"
///
/// [operation.downloadSpectrum]
/// cmd = "python download.py"
/// search_cmd = "python search.py"
///
/// [operation.plotLifeFactors]
/// cmd = "python plot.py"
/// compare_cmd = "python life_factors.py"
///
/// [store]
/// dir = "saved_tasks"
/// ```
///
/// All sections are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub pools: PoolsSection,

    /// Keyed by operation element name (e.g. `"saveSpectrum"`).
    #[serde(default)]
    pub operation: BTreeMap<String, OperationConfig>,

    #[serde(default)]
    pub store: StoreSection,
}

/// Validated configuration. Built through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub pools: PoolsSection,
    pub operation: BTreeMap<String, OperationConfig>,
    pub store: StoreSection,
}

impl ConfigFile {
    /// Used by validation once invariants hold.
    pub(crate) fn new_unchecked(
        pools: PoolsSection,
        operation: BTreeMap<String, OperationConfig>,
        store: StoreSection,
    ) -> Self {
        Self {
            pools,
            operation,
            store,
        }
    }
}

/// `[pools]` section. The sequential pool always has one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolsSection {
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: usize,

    #[serde(default = "default_short_workers")]
    pub short_workers: usize,
}

fn default_parallel_workers() -> usize {
    4
}

fn default_short_workers() -> usize {
    2
}

impl Default for PoolsSection {
    fn default() -> Self {
        Self {
            parallel_workers: default_parallel_workers(),
            short_workers: default_short_workers(),
        }
    }
}

/// `[operation.<elementName>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationConfig {
    /// Shell command run for the operation.
    pub cmd: String,

    /// Command for the search step of download operations.
    #[serde(default)]
    pub search_cmd: Option<String>,

    /// Command for the compare step of comparison plots.
    #[serde(default)]
    pub compare_cmd: Option<String>,

    /// Overrides the catalog's short-running flag.
    #[serde(default)]
    pub short_running: Option<bool>,
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// Where `save` run mode writes task definitions.
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("saved_tasks")
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}
