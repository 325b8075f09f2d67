//! Solidity standard-JSON input and output model
//!
//! Only the parts of the format the tracer reads or writes are modelled;
//! unknown output fields are ignored.

use crate::compiler::CompilerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Artifacts requested for every contract
pub const DEFAULT_OUTPUT_SELECTION: [&str; 2] = ["abi", "evm.bytecode"];

/// Optimizer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerSettings {
    pub enabled: bool,
    pub runs: u32,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            runs: 200,
        }
    }
}

/// Compiler settings shared by every source of one compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerSettings {
    pub optimizer: OptimizerSettings,
    pub evm_version: String,
    /// file -> contract -> artifacts
    pub output_selection: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl CompilerSettings {
    /// Settings selecting `artifacts` for every contract of every file
    pub fn new(optimizer: OptimizerSettings, evm_version: &str, artifacts: &[&str]) -> Self {
        let mut per_contract = BTreeMap::new();
        per_contract.insert(
            "*".to_string(),
            artifacts.iter().map(|a| a.to_string()).collect(),
        );
        let mut output_selection = BTreeMap::new();
        output_selection.insert("*".to_string(), per_contract);

        Self {
            optimizer,
            evm_version: evm_version.to_string(),
            output_selection,
        }
    }
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self::new(
            OptimizerSettings::default(),
            "petersburg",
            &DEFAULT_OUTPUT_SELECTION,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContent {
    pub content: String,
}

/// `solc --standard-json` input document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInput {
    pub language: String,
    pub sources: BTreeMap<String, SourceContent>,
    pub settings: CompilerSettings,
}

impl CompilerInput {
    /// Create a Solidity input with no sources
    pub fn new(settings: CompilerSettings) -> Self {
        Self {
            language: "Solidity".to_string(),
            sources: BTreeMap::new(),
            settings,
        }
    }

    /// Add a source under its compiler-visible name
    pub fn add_source(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.sources.insert(
            name.into(),
            SourceContent {
                content: content.into(),
            },
        );
    }

    /// Read a source file from disk and add it under `name`
    pub fn add_source_file(&mut self, name: impl Into<String>, path: &Path) -> Result<(), CompilerError> {
        let content = fs::read_to_string(path).map_err(|source| CompilerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.add_source(name, content);
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, CompilerError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One compiler diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: String,
    #[serde(default)]
    pub formatted_message: String,
    #[serde(default)]
    pub message: String,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }

    /// Human-readable text, preferring the formatted form
    pub fn text(&self) -> &str {
        if self.formatted_message.is_empty() {
            &self.message
        } else {
            &self.formatted_message
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytecodeArtifact {
    /// Hex without `0x`
    #[serde(default)]
    pub object: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmArtifacts {
    #[serde(default)]
    pub bytecode: Option<BytecodeArtifact>,
}

/// Artifacts of one compiled contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractArtifacts {
    #[serde(default)]
    pub abi: Value,
    #[serde(default)]
    pub evm: Option<EvmArtifacts>,
}

/// `solc --standard-json` output document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilerOutput {
    #[serde(default)]
    pub errors: Vec<Diagnostic>,
    /// source name -> contract name -> artifacts
    #[serde(default)]
    pub contracts: BTreeMap<String, BTreeMap<String, ContractArtifacts>>,
}

impl CompilerOutput {
    pub fn from_json(json: &str) -> Result<Self, CompilerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Report diagnostics and fail if any has error severity
    ///
    /// Warnings are logged and otherwise ignored. Every error-severity message
    /// is logged and returned in [`CompilerError::Compilation`].
    pub fn check(&self) -> Result<(), CompilerError> {
        let mut errors = Vec::new();
        for diagnostic in &self.errors {
            if diagnostic.is_error() {
                log::error!("{}", diagnostic.text());
                errors.push(diagnostic.text().to_string());
            } else {
                log::warn!("{}", diagnostic.text());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CompilerError::Compilation(errors))
        }
    }

    pub fn contract(&self, source: &str, name: &str) -> Result<&ContractArtifacts, CompilerError> {
        self.contracts
            .get(source)
            .and_then(|contracts| contracts.get(name))
            .ok_or_else(|| CompilerError::MissingArtifact {
                source_name: source.to_string(),
                contract: name.to_string(),
            })
    }

    /// Decoded deployment bytecode of a contract
    pub fn deployment_bytecode(&self, source: &str, name: &str) -> Result<Vec<u8>, CompilerError> {
        let object = self
            .contract(source, name)?
            .evm
            .as_ref()
            .and_then(|evm| evm.bytecode.as_ref())
            .map(|bytecode| bytecode.object.as_str())
            .unwrap_or_default();

        if object.is_empty() {
            return Err(CompilerError::MissingArtifact {
                source_name: source.to_string(),
                contract: name.to_string(),
            });
        }

        // Unlinked library references leave `__$...$__` placeholders
        hex::decode(object.trim_start_matches("0x")).map_err(|e| CompilerError::InvalidBytecode {
            contract: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// ABI of a contract as raw JSON
    pub fn abi(&self, source: &str, name: &str) -> Result<&Value, CompilerError> {
        Ok(&self.contract(source, name)?.abi)
    }
}
