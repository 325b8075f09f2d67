//! Contract deployment and invocation
//!
//! # Overview
//!
//! This module implements:
//! - Function selectors and string-argument encoding ([`abi`])
//! - Deployment of compiled contracts through creation transactions
//! - Signed call transactions against deployed contracts
//!
//! # Example
//!
//! ```rust
//! use evm_tracer::asm::{wrap_deployment, Assembler};
//! use evm_tracer::contract::ContractManager;
//! use evm_tracer::crypto::KeyPair;
//! use evm_tracer::engine::{EmbeddedEvm, ExecutionEngine};
//! use revm::primitives::U256;
//!
//! let key = KeyPair::from_private_key_hex(
//!     "e331b6d69882b4cb4ea581d88e0b604039a3de5967688d3dcffdd2270c0fd109",
//! ).unwrap();
//! let mut engine = EmbeddedEvm::new();
//! engine.fund_account(key.address(), U256::from(1_000_000_000_000_000_000u64));
//!
//! // Deploy a contract whose runtime code stores 42
//! let runtime = Assembler::new().assemble("PUSH1 0x2a\nPUSH1 0x00\nSSTORE").unwrap();
//! let mut manager = ContractManager::new(key);
//! let address = manager.deploy(&mut engine, "Store", &wrap_deployment(&runtime).unwrap()).unwrap();
//!
//! // Call it
//! let tx = manager.build_call(&engine, address, "function store()", None).unwrap();
//! assert!(engine.execute(&tx).unwrap().is_success());
//! ```

pub mod abi;
pub mod manager;

pub use abi::{canonical_signature, encode_call, encode_string, selector};
pub use manager::{ContractManager, DeployedContract};

use crate::core::TransactionError;
use crate::engine::EngineError;
use thiserror::Error;

/// Contract errors
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Contract not found: {0}")]
    NotFound(String),
    #[error("Contract already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid bytecode")]
    InvalidBytecode,
    #[error("Deployment failed: {0}")]
    Deployment(String),
    #[error("Deployment of {0} created no contract")]
    NoCreatedAddress(String),
    #[error("Invalid function signature: {0}")]
    InvalidSignature(String),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}
