//! Cryptographic utilities
//!
//! This module provides:
//! - ECDSA key management (secp256k1)
//! - Ethereum address derivation
//! - Recoverable signatures for transaction signing

pub mod keys;

pub use keys::{
    public_key_to_address, recover_address, sign_recoverable, KeyError, KeyPair, RecoverableSig,
};
