// src/config/mod.rs

//! Collaborator configuration.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate pool sizes and operation commands (`validate.rs`).
//!
//! Instruction-set settings (`runMode`, `runSilent`, ...) live in the
//! instruction set itself, not here.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{ConfigFile, OperationConfig, PoolsSection, RawConfigFile, StoreSection};
pub use validate::validate_config;
