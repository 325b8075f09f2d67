//! Execution engine interface
//!
//! The engine runs signed transactions to completion and raises one
//! [`StepEvent`] per executed instruction to its registered listeners.
//!
//! # Overview
//!
//! This module provides:
//! - [`ExecutionEngine`], the contract the trace recorder and session use
//! - [`EmbeddedEvm`], an in-memory engine backed by `revm`
//! - Step events and the [`Subscription`] handle for listener registration
//!
//! # Example
//!
//! ```rust
//! use evm_tracer::engine::{EmbeddedEvm, ExecutionEngine, StepEvent};
//!
//! let engine = EmbeddedEvm::new();
//! let subscription = engine.subscribe(Box::new(|step: &StepEvent| println!("{} {}", step.pc, step.opcode)));
//! assert_eq!(engine.listener_count(), 1);
//! drop(subscription);
//! assert_eq!(engine.listener_count(), 0);
//! ```

pub mod events;
pub mod evm;

#[cfg(test)]
pub(crate) mod testing;

pub use events::{
    MemorySnapshot, Opcode, StepEvent, StepListener, StepListeners, Subscription, WORD_SIZE,
};
pub use evm::{EmbeddedEvm, CODE_ADDRESS};

use crate::core::{SignedTransaction, TransactionError};
use revm::primitives::{Address, Bytes, U256};
use thiserror::Error;

/// Errors raised before or outside instruction execution
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid transaction signature: {0}")]
    InvalidSignature(#[from] TransactionError),
    #[error("Nonce mismatch for {address}: expected {expected}, got {actual}")]
    NonceMismatch {
        address: Address,
        expected: u64,
        actual: u64,
    },
    #[error("Transaction rejected: {0}")]
    Rejected(String),
}

/// Result of running one transaction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionOutcome {
    /// Exception reported by the execution (revert or exceptional halt)
    pub exception: Option<String>,
    /// Address of the contract created by a deployment
    pub created_address: Option<Address>,
    /// Return data
    pub output: Bytes,
    /// Gas used by the transaction
    pub gas_used: u64,
    /// Instructions executed, counted by the engine itself
    pub instructions: u64,
}

impl ExecutionOutcome {
    /// Whether execution completed without exception
    pub fn is_success(&self) -> bool {
        self.exception.is_none()
    }
}

/// A virtual machine that executes transactions and reports steps
pub trait ExecutionEngine {
    /// Register a step listener for as long as the returned handle lives
    fn subscribe(&self, listener: StepListener) -> Subscription;

    /// Number of currently registered step listeners
    fn listener_count(&self) -> usize;

    /// Current nonce of an account (0 for unknown accounts)
    fn nonce(&self, address: Address) -> u64;

    /// Set the balance of an account, creating it if needed
    fn fund_account(&mut self, address: Address, balance: U256);

    /// Run a transaction to completion and commit its state changes
    ///
    /// Step events are delivered synchronously, in program order, from
    /// inside this call.
    fn execute(&mut self, tx: &SignedTransaction) -> Result<ExecutionOutcome, EngineError>;
}
