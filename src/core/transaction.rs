//! Legacy Ethereum transactions
//!
//! Transactions are signed with EIP-155 replay protection: the signing hash
//! covers `chain_id` and `v` carries it as `recovery_id + 35 + 2 * chain_id`.

use crate::core::rlp;
use crate::crypto::{recover_address, KeyError, KeyPair, RecoverableSig};
use revm::primitives::{keccak256, Address, Bytes, B256, U256};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Default chain ID (mainnet, as used by the embedded engine)
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Default gas limit for traced transactions
pub const DEFAULT_GAS_LIMIT: u64 = 2_000_000;

/// Default gas price in wei
pub const DEFAULT_GAS_PRICE: u64 = 1;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Invalid signature: v = {0}")]
    InvalidV(u64),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// An unsigned legacy transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    /// Recipient; `None` creates a contract
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub chain_id: u64,
}

impl Transaction {
    /// Whether this transaction deploys a contract
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// RLP payload items shared by the signing and signed encodings
    fn encode_fields(&self, out: &mut Vec<u8>) {
        rlp::encode_u64(self.nonce, out);
        rlp::encode_u256(self.gas_price, out);
        rlp::encode_u64(self.gas_limit, out);
        match &self.to {
            Some(to) => rlp::encode_bytes(to.as_slice(), out),
            None => rlp::encode_bytes(&[], out),
        }
        rlp::encode_u256(self.value, out);
        rlp::encode_bytes(&self.data, out);
    }

    /// Get the data to be signed
    pub fn signing_data(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        self.encode_fields(&mut payload);
        rlp::encode_u64(self.chain_id, &mut payload);
        rlp::encode_u64(0, &mut payload);
        rlp::encode_u64(0, &mut payload);
        rlp::encode_list(&payload)
    }

    /// Hash that the sender signs
    pub fn signing_hash(&self) -> B256 {
        keccak256(self.signing_data())
    }

    /// Sign the transaction
    pub fn sign(self, key_pair: &KeyPair) -> Result<SignedTransaction, TransactionError> {
        let signature = key_pair.sign_recoverable(&self.signing_hash())?;
        let v = signature.recovery_id as u64 + 35 + 2 * self.chain_id;
        Ok(SignedTransaction {
            tx: self,
            v,
            r: signature.r,
            s: signature.s,
        })
    }
}

/// A signed legacy transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub v: u64,
    pub r: B256,
    pub s: B256,
}

impl SignedTransaction {
    /// Recover the sender address from the signature
    pub fn sender(&self) -> Result<Address, TransactionError> {
        let base = 35 + 2 * self.tx.chain_id;
        if self.v != base && self.v != base + 1 {
            return Err(TransactionError::InvalidV(self.v));
        }
        let sig = RecoverableSig {
            recovery_id: (self.v - base) as u8,
            r: self.r,
            s: self.s,
        };
        Ok(recover_address(&self.tx.signing_hash(), &sig)?)
    }

    /// RLP encoding of the signed transaction
    pub fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        self.tx.encode_fields(&mut payload);
        rlp::encode_u64(self.v, &mut payload);
        rlp::encode_u256(U256::from_be_bytes(self.r.0), &mut payload);
        rlp::encode_u256(U256::from_be_bytes(self.s.0), &mut payload);
        rlp::encode_list(&payload)
    }

    /// Transaction hash
    pub fn hash(&self) -> B256 {
        keccak256(self.encode())
    }
}

/// Builder for legacy transactions
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    tx: Transaction,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self {
            tx: Transaction {
                nonce: 0,
                gas_price: U256::from(DEFAULT_GAS_PRICE),
                gas_limit: DEFAULT_GAS_LIMIT,
                to: None,
                value: U256::ZERO,
                data: Bytes::new(),
                chain_id: DEFAULT_CHAIN_ID,
            },
        }
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.tx.nonce = nonce;
        self
    }

    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.tx.gas_price = gas_price;
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.tx.gas_limit = gas_limit;
        self
    }

    /// Call an existing account (omit to deploy)
    pub fn to(mut self, to: Address) -> Self {
        self.tx.to = Some(to);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.tx.value = value;
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.tx.data = data.into();
        self
    }

    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.tx.chain_id = chain_id;
        self
    }

    /// Build and sign the transaction
    pub fn build_and_sign(self, key_pair: &KeyPair) -> Result<SignedTransaction, TransactionError> {
        self.build().sign(key_pair)
    }

    /// Build without signing
    pub fn build(self) -> Transaction {
        self.tx
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
