//! Solidity compilation
//!
//! Contracts are compiled through the compiler's standard-JSON interface:
//! a [`CompilerInput`] document goes in, a [`CompilerOutput`] comes back.
//! [`CompilerService`] is the seam the session compiles through, with
//! [`Solc`] as the native implementation.

pub mod solc;
pub mod standard_json;

pub use self::solc::{Solc, DEFAULT_SOLC};
pub use standard_json::{
    BytecodeArtifact, CompilerInput, CompilerOutput, CompilerSettings, ContractArtifacts,
    Diagnostic, EvmArtifacts, OptimizerSettings, SourceContent, DEFAULT_OUTPUT_SELECTION,
};

use std::path::PathBuf;
use thiserror::Error;

/// Compiler errors
#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("Compilation failed:\n{}", .0.join("\n"))]
    Compilation(Vec<String>),
    #[error("Failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },
    #[error("Compiler exited with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },
    #[error("No bytecode for {contract} in {source_name}")]
    MissingArtifact { source_name: String, contract: String },
    #[error("Invalid bytecode for {contract}: {reason}")]
    InvalidBytecode { contract: String, reason: String },
    #[error("Compiler JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Something that turns standard-JSON input into standard-JSON output
pub trait CompilerService {
    /// Compile every source of `input` in one invocation
    ///
    /// Diagnostics are returned inside the output; call
    /// [`CompilerOutput::check`] to turn error-severity ones into a failure.
    fn compile(&self, input: &CompilerInput) -> Result<CompilerOutput, CompilerError>;
}
