//! EVM Tracer: per-instruction execution traces of EVM transactions
//!
//! This crate provides:
//! - An embedded EVM (`revm`) raising one step event per executed instruction
//! - A trace recorder that turns step events into JSON trace files
//! - Solidity compilation through `solc --standard-json`
//! - Contract deployment and signed legacy call transactions
//! - A small EVM assembler for hand-written test programs
//!
//! # Example
//!
//! ```rust
//! use evm_tracer::asm::Assembler;
//! use evm_tracer::core::TransactionBuilder;
//! use evm_tracer::crypto::KeyPair;
//! use evm_tracer::engine::{EmbeddedEvm, ExecutionEngine, CODE_ADDRESS};
//! use evm_tracer::trace::TraceRecorder;
//! use revm::primitives::U256;
//!
//! let key = KeyPair::from_private_key_hex(
//!     "e331b6d69882b4cb4ea581d88e0b604039a3de5967688d3dcffdd2270c0fd109",
//! ).unwrap();
//! let mut engine = EmbeddedEvm::new();
//! engine.fund_account(key.address(), U256::from(1_000_000_000_000_000_000u64));
//!
//! // Install a program and call it
//! let code = Assembler::new().assemble("PUSH1 0x01\nPUSH1 0x02\nADD").unwrap();
//! engine.install_code(CODE_ADDRESS, code);
//! let tx = TransactionBuilder::new()
//!     .nonce(engine.nonce(key.address()))
//!     .to(CODE_ADDRESS)
//!     .build_and_sign(&key)
//!     .unwrap();
//!
//! let capture = TraceRecorder::new().capture(&mut engine, &tx).unwrap();
//! assert_eq!(capture.records.len(), 3);
//! assert_eq!(capture.records[2].opcode, "ADD");
//! ```

pub mod asm;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod contract;
pub mod core;
pub mod crypto;
pub mod engine;
pub mod session;
pub mod storage;
pub mod trace;

// Re-export commonly used types
pub use compiler::{CompilerService, Solc};
pub use config::{ContractTarget, TraceConfig};
pub use contract::ContractManager;
pub use core::{SignedTransaction, Transaction, TransactionBuilder};
pub use crypto::KeyPair;
pub use engine::{EmbeddedEvm, ExecutionEngine, StepEvent};
pub use session::{trace_code, TraceSession};
pub use trace::{TraceRecord, TraceRecorder};
