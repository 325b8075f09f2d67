//! Core transaction components
//!
//! This module contains:
//! - Legacy transactions with EIP-155 signing
//! - The RLP encoding used for signing hashes and transaction hashes

pub mod rlp;
pub mod transaction;

pub use transaction::{
    SignedTransaction, Transaction, TransactionBuilder, TransactionError, DEFAULT_CHAIN_ID,
    DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE,
};
