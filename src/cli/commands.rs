//! CLI commands for the tracer
//!
//! Implements all command handlers for the CLI interface.

use crate::asm::{disassemble, Assembler};
use crate::compiler::Solc;
use crate::config::TraceConfig;
use crate::engine::{EmbeddedEvm, ExecutionEngine};
use crate::session::{self, TraceSession};
use crate::trace::{RecorderOptions, TraceRecorder, TraceSummary};
use revm::primitives::U256;
use std::fs;
use std::path::Path;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Decode hex input, with or without `0x` and surrounding whitespace
pub fn decode_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    Ok(hex::decode(digits)?)
}

/// Load the config file if given, then apply command-line overrides
pub fn load_config(path: Option<&Path>, private_key: Option<&str>) -> CliResult<TraceConfig> {
    let mut config = match path {
        Some(path) => TraceConfig::load(path)?,
        None => TraceConfig::default(),
    };
    if let Some(key) = private_key {
        config.private_key = key.to_string();
        config.validate()?;
    }
    Ok(config)
}

fn print_summary(summary: &TraceSummary) {
    println!("   📄 {}", summary.path.display());
    println!("      ├─ Records: {}", summary.records);
    println!("      └─ Gas used: {}", summary.gas_used);
}

/// Compile, deploy and trace every configured target
pub fn cmd_run(config_path: Option<&Path>, base_dir: &Path, private_key: Option<&str>) -> CliResult<()> {
    let config = load_config(config_path, private_key)?;
    let key = config.key_pair()?;
    println!("🔑 Account: {}", key.address());

    let compiler = Solc::new(config.compiler.binary.clone());
    let mut session = TraceSession::new(config, base_dir, compiler, EmbeddedEvm::new());
    let summaries = session.run()?;

    println!("✅ Traced {} call(s):", summaries.len());
    for summary in &summaries {
        print_summary(summary);
    }
    Ok(())
}

/// Where the traced program comes from
pub enum CodeSource<'a> {
    Hex(&'a str),
    Assembly(&'a Path),
}

impl CodeSource<'_> {
    fn load(&self) -> CliResult<Vec<u8>> {
        match self {
            CodeSource::Hex(code) => decode_hex(code),
            CodeSource::Assembly(path) => {
                let source = fs::read_to_string(path)?;
                Ok(Assembler::new().assemble(&source)?)
            }
        }
    }
}

/// Trace a raw program, either as called runtime code or as init code
pub fn cmd_trace_code(
    source: CodeSource<'_>,
    calldata: Option<&str>,
    deploy: bool,
    output: &Path,
    private_key: Option<&str>,
    persist_partial: bool,
) -> CliResult<()> {
    let config = load_config(None, private_key)?;
    let key = config.key_pair()?;
    let code = source.load()?;
    let calldata = calldata.map(decode_hex).transpose()?.unwrap_or_default();

    let mut engine = EmbeddedEvm::new();
    engine.fund_account(key.address(), U256::from(config.initial_balance_wei));
    let recorder = TraceRecorder::with_options(RecorderOptions { persist_partial });

    println!("🔬 Tracing {} byte(s) of code...", code.len());
    let summary = if deploy {
        let mut init_code = code;
        init_code.extend_from_slice(&calldata);
        session::trace_deployment(&mut engine, &key, &init_code, output, &recorder)?
    } else {
        session::trace_code(&mut engine, &key, &code, &calldata, output, &recorder)?
    };

    println!("✅ Trace written!");
    print_summary(&summary);
    Ok(())
}

/// Assemble a mnemonic source file and print the bytecode
pub fn cmd_assemble(input: &Path) -> CliResult<()> {
    let source = fs::read_to_string(input)?;
    let bytecode = Assembler::new().assemble(&source)?;
    println!("0x{}", hex::encode(bytecode));
    Ok(())
}

/// Print the disassembly of hex bytecode
pub fn cmd_disassemble(code: &str) -> CliResult<()> {
    let bytecode = decode_hex(code)?;
    print!("{}", disassemble(&bytecode));
    Ok(())
}
