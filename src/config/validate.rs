// src/config/validate.rs

use std::collections::HashMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{AutomationError, Result};
use crate::exec::PoolSizes;
use crate::instruction::catalog::OperationKind;
use crate::operations::OperationCommand;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AutomationError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.pools, raw.operation, raw.store))
    }
}

pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_pools(cfg)?;
    validate_operations(cfg)?;
    Ok(())
}

fn validate_pools(cfg: &RawConfigFile) -> Result<()> {
    if cfg.pools.parallel_workers == 0 {
        return Err(AutomationError::ConfigError(
            "[pools].parallel_workers must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.pools.short_workers == 0 {
        return Err(AutomationError::ConfigError(
            "[pools].short_workers must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_operations(cfg: &RawConfigFile) -> Result<()> {
    for (name, op) in cfg.operation.iter() {
        let Some(kind) = OperationKind::from_element_name(name) else {
            return Err(AutomationError::ConfigError(format!(
                "[operation.{name}] does not name a supported operation"
            )));
        };
        if op.cmd.trim().is_empty() {
            return Err(AutomationError::ConfigError(format!(
                "[operation.{name}].cmd must not be empty"
            )));
        }
        if op.search_cmd.is_some() && kind.spec().fan_out.is_none() {
            return Err(AutomationError::ConfigError(format!(
                "[operation.{name}].search_cmd is only valid for download operations"
            )));
        }
        if op.compare_cmd.is_some() && kind.spec().compare.is_none() {
            return Err(AutomationError::ConfigError(format!(
                "[operation.{name}].compare_cmd is only valid for comparison plots"
            )));
        }
    }
    Ok(())
}

impl ConfigFile {
    pub fn pool_sizes(&self) -> PoolSizes {
        PoolSizes {
            parallel_workers: self.pools.parallel_workers,
            short_workers: self.pools.short_workers,
        }
    }

    /// Commands per operation kind, for the command executor.
    pub fn commands(&self) -> HashMap<OperationKind, OperationCommand> {
        self.known_operations()
            .map(|(kind, op)| {
                (
                    kind,
                    OperationCommand {
                        cmd: op.cmd.clone(),
                        search_cmd: op.search_cmd.clone(),
                        compare_cmd: op.compare_cmd.clone(),
                    },
                )
            })
            .collect()
    }

    /// Short-running overrides per operation kind.
    pub fn short_running_overrides(&self) -> HashMap<OperationKind, bool> {
        self.known_operations()
            .filter_map(|(kind, op)| op.short_running.map(|s| (kind, s)))
            .collect()
    }

    fn known_operations(
        &self,
    ) -> impl Iterator<Item = (OperationKind, &crate::config::model::OperationConfig)> {
        self.operation
            .iter()
            .filter_map(|(name, op)| OperationKind::from_element_name(name).map(|k| (k, op)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_file_gets_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.pool_sizes(), PoolSizes::default());
        assert_eq!(cfg.store.dir, std::path::PathBuf::from("saved_tasks"));
        assert!(cfg.commands().is_empty());
    }

    #[test]
    fn operations_map_to_commands_and_overrides() {
        let cfg = parse(
            r#"
            [operation.downloadSpectrum]
            cmd = "download"
            search_cmd = "search"

            [operation.shareSpectrum]
            cmd = "share"
            short_running = false
            "#,
        )
        .unwrap();

        let commands = cfg.commands();
        assert_eq!(
            commands[&OperationKind::DownloadSpectrum].search_cmd.as_deref(),
            Some("search")
        );
        assert_eq!(
            cfg.short_running_overrides(),
            HashMap::from([(OperationKind::ShareSpectrum, false)])
        );
    }

    #[test]
    fn zero_workers_are_rejected() {
        let err = parse("[pools]\nparallel_workers = 0\n").unwrap_err();
        assert!(err.to_string().contains("parallel_workers"));
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let err = parse("[operation.launchRocket]\ncmd = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("launchRocket"));
    }

    #[test]
    fn search_cmd_needs_a_download_operation() {
        let err = parse("[operation.addStf]\ncmd = \"x\"\nsearch_cmd = \"y\"\n").unwrap_err();
        assert!(err.to_string().contains("search_cmd"));
    }

    #[test]
    fn compare_cmd_belongs_to_comparison_plots() {
        let cfg = parse("[operation.plotLifeFactors]\ncmd = \"plot\"\ncompare_cmd = \"lf\"\n").unwrap();
        assert_eq!(
            cfg.commands()[&OperationKind::PlotLifeFactors].compare_cmd.as_deref(),
            Some("lf")
        );

        let err = parse("[operation.saveLifeFactors]\ncmd = \"x\"\ncompare_cmd = \"y\"\n").unwrap_err();
        assert!(err.to_string().contains("compare_cmd"));
    }
}
