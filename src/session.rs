//! End-to-end tracing session
//!
//! Funds the configured account, compiles every configured source in one
//! compiler call, deploys each target and records a trace of one call per
//! target. Every step runs once; the first failure aborts the session.

use crate::compiler::{CompilerError, CompilerInput, CompilerOutput, CompilerService};
use crate::config::{ConfigError, TraceConfig};
use crate::contract::{ContractError, ContractManager};
use crate::core::{TransactionBuilder, TransactionError};
use crate::crypto::{KeyError, KeyPair};
use crate::engine::{EmbeddedEvm, ExecutionEngine, CODE_ADDRESS};
use crate::trace::{RecorderOptions, TraceError, TraceRecorder, TraceSummary};
use revm::primitives::U256;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Compiler error: {0}")]
    Compiler(#[from] CompilerError),
    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),
    #[error("Failed to create {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Compile, deploy and trace the configured targets
pub struct TraceSession<C, E> {
    config: TraceConfig,
    base_dir: PathBuf,
    compiler: C,
    engine: E,
    recorder: TraceRecorder,
}

impl<C: CompilerService, E: ExecutionEngine> TraceSession<C, E> {
    /// Create a session; relative config paths resolve against `base_dir`
    pub fn new(config: TraceConfig, base_dir: impl Into<PathBuf>, compiler: C, engine: E) -> Self {
        let recorder = TraceRecorder::with_options(RecorderOptions {
            persist_partial: config.persist_partial,
        });
        Self {
            config,
            base_dir: base_dir.into(),
            compiler,
            engine,
            recorder,
        }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        TraceConfig::resolve(&self.base_dir, path)
    }

    /// Compile all target sources in a single compiler invocation
    pub fn compile(&self) -> Result<CompilerOutput, SessionError> {
        let mut input = CompilerInput::new(self.config.compiler.settings());
        for target in &self.config.targets {
            if !input.sources.contains_key(&target.source_name) {
                input.add_source_file(target.source_name.clone(), &self.resolve(&target.source_path))?;
            }
        }

        log::info!("Compiling {} source(s)...", input.sources.len());
        let output = self.compiler.compile(&input)?;
        output.check()?;
        log::info!("Compiled the contracts");
        Ok(output)
    }

    /// Run the whole pipeline and return one summary per target
    pub fn run(&mut self) -> Result<Vec<TraceSummary>, SessionError> {
        let key = self.config.key_pair()?;
        let balance = U256::from(self.config.initial_balance_wei);
        self.engine.fund_account(key.address(), balance);
        log::info!("Account {} funded with {} wei", key.address(), balance);

        let output = self.compile()?;

        // Resolve every artifact before the first deployment
        let mut bytecodes = Vec::with_capacity(self.config.targets.len());
        for target in &self.config.targets {
            bytecodes.push(output.deployment_bytecode(&target.source_name, &target.name)?);
        }

        log::info!("Deploying {} contract(s)...", bytecodes.len());
        let mut manager = ContractManager::new(key)
            .with_gas(self.config.gas_limit, U256::from(self.config.gas_price));
        for (target, bytecode) in self.config.targets.iter().zip(&bytecodes) {
            manager.deploy(&mut self.engine, &target.name, bytecode)?;
        }

        let mut summaries = Vec::with_capacity(self.config.targets.len());
        for target in &self.config.targets {
            let tx = manager.build_call_by_name(
                &self.engine,
                &target.name,
                &target.function,
                target.argument.as_deref(),
            )?;
            let destination = self.resolve(&target.output);
            ensure_parent(&destination)?;

            log::info!("Tracing {}.{}", target.name, target.function);
            let summary = self.recorder.record(&mut self.engine, &tx, &destination)?;
            summaries.push(summary);
        }

        Ok(summaries)
    }
}

fn ensure_parent(path: &Path) -> Result<(), SessionError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| SessionError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Trace a call to raw runtime code installed at [`CODE_ADDRESS`]
///
/// The sender must already be funded.
pub fn trace_code(
    engine: &mut EmbeddedEvm,
    key: &KeyPair,
    code: &[u8],
    calldata: &[u8],
    destination: &Path,
    recorder: &TraceRecorder,
) -> Result<TraceSummary, SessionError> {
    engine.install_code(CODE_ADDRESS, code.to_vec());
    let tx = TransactionBuilder::new()
        .nonce(engine.nonce(key.address()))
        .to(CODE_ADDRESS)
        .data(calldata.to_vec())
        .build_and_sign(key)?;

    ensure_parent(destination)?;
    Ok(recorder.record(engine, &tx, destination)?)
}

/// Trace a contract creation transaction running `init_code`
pub fn trace_deployment<E: ExecutionEngine + ?Sized>(
    engine: &mut E,
    key: &KeyPair,
    init_code: &[u8],
    destination: &Path,
    recorder: &TraceRecorder,
) -> Result<TraceSummary, SessionError> {
    let tx = TransactionBuilder::new()
        .nonce(engine.nonce(key.address()))
        .data(init_code.to_vec())
        .build_and_sign(key)?;

    ensure_parent(destination)?;
    Ok(recorder.record(engine, &tx, destination)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{wrap_deployment, Assembler};
    use crate::compiler::{BytecodeArtifact, ContractArtifacts, Diagnostic, EvmArtifacts};
    use crate::config::ContractTarget;
    use crate::storage;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// Compiler returning fixed artifacts and remembering its input
    struct FakeCompiler {
        output: CompilerOutput,
        seen: RefCell<Option<CompilerInput>>,
    }

    impl FakeCompiler {
        fn new(contracts: &[(&str, Vec<u8>)]) -> Self {
            let mut output = CompilerOutput::default();
            for (name, init_code) in contracts {
                let artifacts = ContractArtifacts {
                    abi: serde_json::json!([]),
                    evm: Some(EvmArtifacts {
                        bytecode: Some(BytecodeArtifact {
                            object: hex::encode(init_code),
                        }),
                    }),
                };
                output
                    .contracts
                    .entry(format!("contracts/{}.sol", name))
                    .or_insert_with(BTreeMap::new)
                    .insert(name.to_string(), artifacts);
            }
            Self {
                output,
                seen: RefCell::new(None),
            }
        }
    }

    impl CompilerService for FakeCompiler {
        fn compile(&self, input: &CompilerInput) -> Result<CompilerOutput, CompilerError> {
            *self.seen.borrow_mut() = Some(input.clone());
            Ok(self.output.clone())
        }
    }

    fn assemble(source: &str) -> Vec<u8> {
        Assembler::new().assemble(source).unwrap()
    }

    fn deployable(runtime: &str) -> Vec<u8> {
        wrap_deployment(&assemble(runtime)).unwrap()
    }

    fn default_contracts() -> Vec<(&'static str, Vec<u8>)> {
        vec![
            ("StackPushPop", deployable("PUSH1 0x01\nPUSH1 0x02\nPOP\nPOP\nSTOP")),
            ("Memory", deployable("PUSH1 0x2a\nPUSH1 0x40\nMSTORE\nSTOP")),
            ("Storage", deployable("PUSH1 0x07\nPUSH1 0x00\nSSTORE\nSTOP")),
        ]
    }

    /// Base directory holding the default contract sources
    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for target in TraceConfig::default().targets {
            let path = dir.path().join(&target.source_path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("contract {} {{}}", target.name)).unwrap();
        }
        dir
    }

    #[test]
    fn test_full_session() {
        let dir = workspace();
        let compiler = FakeCompiler::new(&default_contracts());
        let mut session = TraceSession::new(
            TraceConfig::default(),
            dir.path(),
            compiler,
            EmbeddedEvm::new(),
        );

        let summaries = session.run().unwrap();

        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries.iter().map(|s| s.records).collect::<Vec<_>>(), vec![5, 4, 4]);

        let stack = storage::load_trace(&dir.path().join("contracts/StackPushPop/vmTrace.json")).unwrap();
        assert_eq!(stack[2].opcode, "POP");
        assert_eq!(stack[2].stack, vec!["1", "2"]);

        let memory = storage::load_trace(&dir.path().join("contracts/Memory/vmTrace.json")).unwrap();
        let last = memory.last().unwrap();
        assert_eq!(last.opcode, "STOP");
        assert_eq!(last.memory.len(), 3);
        assert!(last.memory.get(0x40).unwrap().ends_with("2a"));

        assert!(dir.path().join("contracts/Storage/vmTrace.json").exists());

        let engine = session.into_engine();
        let key = TraceConfig::default().key_pair().unwrap();
        assert_eq!(engine.nonce(key.address()), 6);
        assert_eq!(engine.listener_count(), 0);
    }

    #[test]
    fn test_compiler_receives_all_sources_once() {
        let dir = workspace();
        let session = TraceSession::new(
            TraceConfig::default(),
            dir.path(),
            FakeCompiler::new(&default_contracts()),
            EmbeddedEvm::new(),
        );

        session.compile().unwrap();

        let input = session.compiler.seen.borrow().clone().unwrap();
        let names: Vec<&String> = input.sources.keys().collect();
        assert_eq!(
            names,
            vec!["contracts/Memory.sol", "contracts/StackPushPop.sol", "contracts/Storage.sol"]
        );
        assert_eq!(input.sources["contracts/Memory.sol"].content, "contract Memory {}");
        assert_eq!(input.settings.evm_version, "petersburg");
    }

    #[test]
    fn test_compilation_error_aborts_before_deployment() {
        let dir = workspace();
        let mut compiler = FakeCompiler::new(&default_contracts());
        compiler.output.errors.push(Diagnostic {
            severity: "error".to_string(),
            formatted_message: "ParserError: Expected ';'".to_string(),
            message: String::new(),
        });
        let mut session = TraceSession::new(TraceConfig::default(), dir.path(), compiler, EmbeddedEvm::new());

        let err = session.run().unwrap_err();

        assert!(matches!(err, SessionError::Compiler(CompilerError::Compilation(_))));
        let key = TraceConfig::default().key_pair().unwrap();
        assert_eq!(session.engine().nonce(key.address()), 0);
        assert!(!dir.path().join("contracts/StackPushPop/vmTrace.json").exists());
    }

    #[test]
    fn test_missing_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = TraceSession::new(
            TraceConfig::default(),
            dir.path(),
            FakeCompiler::new(&default_contracts()),
            EmbeddedEvm::new(),
        );

        assert!(matches!(
            session.run(),
            Err(SessionError::Compiler(CompilerError::Io { .. }))
        ));
    }

    #[test]
    fn test_deployment_failure_aborts() {
        let dir = workspace();
        let mut contracts = default_contracts();
        contracts[1].1 = assemble("PUSH1 0x00\nDUP1\nREVERT");
        let mut session = TraceSession::new(
            TraceConfig::default(),
            dir.path(),
            FakeCompiler::new(&contracts),
            EmbeddedEvm::new(),
        );

        let err = session.run().unwrap_err();

        assert!(matches!(err, SessionError::Contract(ContractError::Deployment(_))));
        assert!(!dir.path().join("contracts/StackPushPop/vmTrace.json").exists());
    }

    #[test]
    fn test_failed_call_stops_session() {
        let dir = workspace();
        let mut contracts = default_contracts();
        contracts[1].1 = deployable("PUSH1 0x00\nDUP1\nREVERT");
        let mut session = TraceSession::new(
            TraceConfig::default(),
            dir.path(),
            FakeCompiler::new(&contracts),
            EmbeddedEvm::new(),
        );

        let err = session.run().unwrap_err();

        assert!(matches!(err, SessionError::Trace(TraceError::Execution(_))));
        assert!(dir.path().join("contracts/StackPushPop/vmTrace.json").exists());
        assert!(!dir.path().join("contracts/Memory/vmTrace.json").exists());
        assert!(!dir.path().join("contracts/Storage/vmTrace.json").exists());
    }

    #[test]
    fn test_call_with_string_argument() {
        let dir = workspace();
        let mut config = TraceConfig::default();
        config.targets = vec![ContractTarget::new("Memory", "function echo(string)").with_argument("hi")];
        // Copy the calldata into memory: CALLDATASIZE 0 0 CALLDATACOPY
        let contracts = vec![(
            "Memory",
            deployable("CALLDATASIZE\nPUSH1 0x00\nPUSH1 0x00\nCALLDATACOPY\nSTOP"),
        )];
        let mut session = TraceSession::new(config, dir.path(), FakeCompiler::new(&contracts), EmbeddedEvm::new());

        session.run().unwrap();

        let trace = storage::load_trace(&dir.path().join("contracts/Memory/vmTrace.json")).unwrap();
        let last = trace.last().unwrap();
        // 4-byte selector + 3 words of string encoding = 100 bytes = 4 words
        assert_eq!(last.memory.len(), 4);
        assert_eq!(trace[0].stack.len(), 0);
        assert_eq!(trace[1].stack, vec!["64"]);
    }

    #[test]
    fn test_trace_code_add_program() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("vmTrace.json");
        let key = TraceConfig::default().key_pair().unwrap();
        let mut engine = EmbeddedEvm::new();
        engine.fund_account(key.address(), U256::from(10u64).pow(U256::from(18u64)));

        let summary = trace_code(
            &mut engine,
            &key,
            &assemble("PUSH1 0x01\nPUSH1 0x02\nADD"),
            &[],
            &path,
            &TraceRecorder::new(),
        )
        .unwrap();

        assert_eq!(summary.records, 3);
        let trace = storage::load_trace(&path).unwrap();
        assert_eq!(trace[2].opcode, "ADD");
        assert_eq!(trace[2].stack, vec!["1", "2"]);
    }

    #[test]
    fn test_trace_deployment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.json");
        let key = TraceConfig::default().key_pair().unwrap();
        let mut engine = EmbeddedEvm::new();
        engine.fund_account(key.address(), U256::from(10u64).pow(U256::from(18u64)));
        let init_code = deployable("STOP");

        let summary = trace_deployment(&mut engine, &key, &init_code, &path, &TraceRecorder::new()).unwrap();

        // PUSH2 DUP1 PUSH2 PUSH1 CODECOPY PUSH1 RETURN
        assert_eq!(summary.records, 7);
        assert_eq!(storage::load_trace(&path).unwrap()[6].opcode, "RETURN");
    }
}
