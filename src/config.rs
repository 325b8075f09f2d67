//! Tracer configuration
//!
//! Loaded from a JSON file; every field is optional and falls back to the
//! values in [`TraceConfig::default`]. Relative paths are resolved against a
//! base directory chosen by the caller.

use crate::compiler::{CompilerSettings, OptimizerSettings, DEFAULT_OUTPUT_SELECTION, DEFAULT_SOLC};
use crate::core::{DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE};
use crate::crypto::{KeyError, KeyPair};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Account used when no key is configured
pub const DEFAULT_PRIVATE_KEY: &str =
    "e331b6d69882b4cb4ea581d88e0b604039a3de5967688d3dcffdd2270c0fd109";

/// 1 ether
pub const DEFAULT_BALANCE_WEI: u128 = 1_000_000_000_000_000_000;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid private key: {0}")]
    Key(#[from] KeyError),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Solidity compiler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Compiler executable
    pub binary: String,
    pub optimizer: OptimizerSettings,
    pub evm_version: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_SOLC.to_string(),
            optimizer: OptimizerSettings::default(),
            evm_version: "petersburg".to_string(),
        }
    }
}

impl CompilerConfig {
    pub fn settings(&self) -> CompilerSettings {
        CompilerSettings::new(
            self.optimizer.clone(),
            &self.evm_version,
            &DEFAULT_OUTPUT_SELECTION,
        )
    }
}

/// One contract function to deploy, call and trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractTarget {
    /// Contract name inside the compiled source
    pub name: String,
    /// Source file on disk
    pub source_path: PathBuf,
    /// Name the source is given in the compiler input
    pub source_name: String,
    /// Human-readable signature of the traced function
    pub function: String,
    /// String argument passed to the function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
    /// Trace output file
    pub output: PathBuf,
}

impl ContractTarget {
    /// Target following the `contracts/<Name>/` layout
    pub fn new(name: &str, function: &str) -> Self {
        let dir = Path::new("contracts").join(name);
        Self {
            name: name.to_string(),
            source_path: dir.join(format!("{}.sol", name)),
            source_name: format!("contracts/{}.sol", name),
            function: function.to_string(),
            argument: None,
            output: dir.join("vmTrace.json"),
        }
    }

    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.argument = Some(argument.into());
        self
    }
}

/// Complete tracer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    /// Hex private key of the funded account
    pub private_key: String,
    pub initial_balance_wei: u128,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub compiler: CompilerConfig,
    /// Traced functions, in deployment and call order
    pub targets: Vec<ContractTarget>,
    /// Keep the partial trace of a failed call
    pub persist_partial: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            private_key: DEFAULT_PRIVATE_KEY.to_string(),
            initial_balance_wei: DEFAULT_BALANCE_WEI,
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_price: DEFAULT_GAS_PRICE,
            compiler: CompilerConfig::default(),
            targets: vec![
                ContractTarget::new("StackPushPop", "function push_pop()"),
                ContractTarget::new("Memory", "function memory_sample()"),
                ContractTarget::new("Storage", "function storage()"),
            ],
            persist_partial: false,
        }
    }
}

impl TraceConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content)?;
        log::debug!("loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.key_pair()?;
        if self.gas_limit == 0 {
            return Err(ConfigError::Invalid("gas_limit must be positive".to_string()));
        }

        let mut names = HashSet::new();
        let mut outputs = HashSet::new();
        for target in &self.targets {
            if !names.insert(&target.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate target {}",
                    target.name
                )));
            }
            if !outputs.insert(&target.output) {
                return Err(ConfigError::Invalid(format!(
                    "output {:?} used by more than one target",
                    target.output
                )));
            }
        }
        Ok(())
    }

    pub fn key_pair(&self) -> Result<KeyPair, KeyError> {
        KeyPair::from_private_key_hex(&self.private_key)
    }

    /// Resolve a configured path against `base_dir`
    pub fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets() {
        let config = TraceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gas_limit, 2_000_000);
        assert_eq!(config.gas_price, 1);
        assert_eq!(config.targets.len(), 3);

        let stack = &config.targets[0];
        assert_eq!(stack.source_name, "contracts/StackPushPop.sol");
        assert_eq!(
            stack.source_path,
            Path::new("contracts/StackPushPop/StackPushPop.sol")
        );
        assert_eq!(stack.output, Path::new("contracts/StackPushPop/vmTrace.json"));
        assert_eq!(config.targets[2].function, "function storage()");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = TraceConfig::from_json(
            r#"{"gas_limit": 3000000, "compiler": {"binary": "solc-0.5.10"}}"#,
        )
        .unwrap();

        assert_eq!(config.gas_limit, 3_000_000);
        assert_eq!(config.compiler.binary, "solc-0.5.10");
        assert_eq!(config.compiler.evm_version, "petersburg");
        assert_eq!(config.private_key, DEFAULT_PRIVATE_KEY);
        assert_eq!(config.targets.len(), 3);
    }

    #[test]
    fn test_custom_target() {
        let config = TraceConfig::from_json(
            r#"{"targets": [{
                "name": "Greeter",
                "source_path": "src/Greeter.sol",
                "source_name": "Greeter.sol",
                "function": "function greet(string)",
                "argument": "hi",
                "output": "out/greet.json"
            }]}"#,
        )
        .unwrap();

        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].argument.as_deref(), Some("hi"));
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(matches!(
            TraceConfig::from_json(r#"{"gas_limt": 1}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            TraceConfig::from_json(r#"{"private_key": "zz"}"#),
            Err(ConfigError::Key(_))
        ));
        assert!(matches!(
            TraceConfig::from_json(r#"{"gas_limit": 0}"#),
            Err(ConfigError::Invalid(_))
        ));

        let mut config = TraceConfig::default();
        config.targets.push(ContractTarget::new("Memory", "function other()"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracer.json");
        std::fs::write(&path, "{}").unwrap();

        assert_eq!(TraceConfig::load(&path).unwrap(), TraceConfig::default());
        assert!(matches!(
            TraceConfig::load(&dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));

        let resolved = TraceConfig::resolve(dir.path(), Path::new("contracts/A/vmTrace.json"));
        assert_eq!(resolved, dir.path().join("contracts/A/vmTrace.json"));
        assert_eq!(
            TraceConfig::resolve(dir.path(), dir.path()),
            dir.path().to_path_buf()
        );
    }
}
