//! ECDSA key management for transaction signing
//!
//! Provides key pairs, Ethereum address derivation, recoverable signing
//! and public key recovery on the secp256k1 curve.

use revm::primitives::{keccak256, Address, B256};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u64),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// Compact recoverable signature split into its Ethereum components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSig {
    /// Recovery id (0 or 1)
    pub recovery_id: u8,
    pub r: B256,
    pub s: B256,
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key (with or without `0x`)
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let hex_key = hex_key.trim();
        let hex_key = hex_key.strip_prefix("0x").unwrap_or(hex_key);
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Ethereum address of this key pair
    pub fn address(&self) -> Address {
        public_key_to_address(&self.public_key)
    }

    /// Sign a 32-byte message hash
    pub fn sign_recoverable(&self, message_hash: &B256) -> Result<RecoverableSig, KeyError> {
        sign_recoverable(&self.secret_key, message_hash)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Convert a public key to an Ethereum address
///
/// The address is the last 20 bytes of keccak256 over the uncompressed key
/// without its `0x04` prefix.
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

/// Sign a message hash with a secret key
pub fn sign_recoverable(
    secret_key: &SecretKey,
    message_hash: &B256,
) -> Result<RecoverableSig, KeyError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(message_hash.as_slice())?;
    let signature = secp.sign_ecdsa_recoverable(&message, secret_key);
    let (recovery_id, compact) = signature.serialize_compact();

    Ok(RecoverableSig {
        recovery_id: recovery_id.to_i32() as u8,
        r: B256::from_slice(&compact[..32]),
        s: B256::from_slice(&compact[32..]),
    })
}

/// Recover the signer address of a message hash
pub fn recover_address(message_hash: &B256, sig: &RecoverableSig) -> Result<Address, KeyError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(message_hash.as_slice())?;
    let recovery_id = RecoveryId::from_i32(sig.recovery_id as i32)
        .map_err(|_| KeyError::InvalidRecoveryId(sig.recovery_id as u64))?;

    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(sig.r.as_slice());
    compact[32..].copy_from_slice(sig.s.as_slice());
    let signature = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|_| KeyError::InvalidSignature)?;

    let public_key = secp.recover_ecdsa(&message, &signature)?;
    Ok(public_key_to_address(&public_key))
}
