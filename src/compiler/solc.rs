//! `solc --standard-json` subprocess runner

use crate::compiler::{CompilerError, CompilerInput, CompilerOutput, CompilerService};
use std::io::Write;
use std::process::{Command, Stdio};

/// Default compiler executable, resolved through `PATH`
pub const DEFAULT_SOLC: &str = "solc";

/// Native Solidity compiler invoked as a child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solc {
    binary: String,
}

impl Solc {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl Default for Solc {
    fn default() -> Self {
        Self::new(DEFAULT_SOLC)
    }
}

impl CompilerService for Solc {
    fn compile(&self, input: &CompilerInput) -> Result<CompilerOutput, CompilerError> {
        let json = input.to_json()?;
        log::debug!(
            "running {} --standard-json on {} source(s)",
            self.binary,
            input.sources.len()
        );

        let spawn_error = |source| CompilerError::Spawn {
            binary: self.binary.clone(),
            source,
        };
        let mut child = Command::new(&self.binary)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(json.as_bytes()).map_err(spawn_error)?;
        }
        let result = child.wait_with_output().map_err(spawn_error)?;

        if !result.status.success() {
            return Err(CompilerError::Failed {
                status: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        CompilerOutput::from_json(&String::from_utf8_lossy(&result.stdout))
    }
}
