//! Contract deployment and call transactions
//!
//! Deploys compiled contracts through creation transactions and builds the
//! signed call transactions that are later traced.

use crate::contract::{abi, ContractError};
use crate::core::{SignedTransaction, TransactionBuilder, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE};
use crate::crypto::KeyPair;
use crate::engine::ExecutionEngine;
use revm::primitives::{Address, U256};
use std::collections::BTreeMap;

/// A contract deployed by the manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedContract {
    pub name: String,
    pub address: Address,
    pub gas_used: u64,
}

/// Deploys contracts and prepares calls on behalf of one account
pub struct ContractManager {
    key: KeyPair,
    gas_limit: u64,
    gas_price: U256,
    /// Deployed contracts by name
    contracts: BTreeMap<String, DeployedContract>,
}

impl ContractManager {
    /// Create a manager signing with `key` and default gas settings
    pub fn new(key: KeyPair) -> Self {
        Self {
            key,
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_price: U256::from(DEFAULT_GAS_PRICE),
            contracts: BTreeMap::new(),
        }
    }

    pub fn with_gas(mut self, gas_limit: u64, gas_price: U256) -> Self {
        self.gas_limit = gas_limit;
        self.gas_price = gas_price;
        self
    }

    /// Address transactions are sent from
    pub fn sender(&self) -> Address {
        self.key.address()
    }

    fn builder<E: ExecutionEngine + ?Sized>(&self, engine: &E) -> TransactionBuilder {
        TransactionBuilder::new()
            .nonce(engine.nonce(self.sender()))
            .gas_limit(self.gas_limit)
            .gas_price(self.gas_price)
    }

    /// Deploy a contract from its deployment bytecode
    ///
    /// The nonce is read from the engine right before signing. A deployment
    /// whose execution raises an exception is a [`ContractError::Deployment`].
    pub fn deploy<E: ExecutionEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        name: &str,
        bytecode: &[u8],
    ) -> Result<Address, ContractError> {
        if bytecode.is_empty() {
            return Err(ContractError::InvalidBytecode);
        }
        if self.contracts.contains_key(name) {
            return Err(ContractError::AlreadyExists(name.to_string()));
        }

        let tx = self.builder(engine).data(bytecode.to_vec()).build_and_sign(&self.key)?;
        let outcome = engine.execute(&tx)?;

        if let Some(exception) = outcome.exception {
            return Err(ContractError::Deployment(format!("{}: {}", name, exception)));
        }
        let address = outcome
            .created_address
            .ok_or_else(|| ContractError::NoCreatedAddress(name.to_string()))?;

        self.contracts.insert(
            name.to_string(),
            DeployedContract {
                name: name.to_string(),
                address,
                gas_used: outcome.gas_used,
            },
        );

        log::info!("Contract {} deployed at {}", name, address);
        Ok(address)
    }

    /// Build a signed call to `signature` on the contract at `address`
    ///
    /// `argument`, when present, is ABI-encoded as a single `string`.
    pub fn build_call<E: ExecutionEngine + ?Sized>(
        &self,
        engine: &E,
        address: Address,
        signature: &str,
        argument: Option<&str>,
    ) -> Result<SignedTransaction, ContractError> {
        let data = abi::encode_call(signature, argument)?;
        let tx = self.builder(engine).to(address).data(data).build_and_sign(&self.key)?;
        log::debug!("call {} on {} as tx {}", signature, address, tx.hash());
        Ok(tx)
    }

    /// Build a call to a contract deployed by this manager
    pub fn build_call_by_name<E: ExecutionEngine + ?Sized>(
        &self,
        engine: &E,
        name: &str,
        signature: &str,
        argument: Option<&str>,
    ) -> Result<SignedTransaction, ContractError> {
        let address = self
            .get(name)
            .map(|contract| contract.address)
            .ok_or_else(|| ContractError::NotFound(name.to_string()))?;
        self.build_call(engine, address, signature, argument)
    }

    pub fn get(&self, name: &str) -> Option<&DeployedContract> {
        self.contracts.get(name)
    }

    /// Names of all deployed contracts
    pub fn list(&self) -> Vec<String> {
        self.contracts.keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.contracts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{wrap_deployment, Assembler};
    use crate::engine::EmbeddedEvm;

    const TEST_KEY: &str = "e331b6d69882b4cb4ea581d88e0b604039a3de5967688d3dcffdd2270c0fd109";

    fn setup() -> (EmbeddedEvm, ContractManager) {
        let key = KeyPair::from_private_key_hex(TEST_KEY).unwrap();
        let mut engine = EmbeddedEvm::new();
        engine.fund_account(key.address(), U256::from(10u64).pow(U256::from(18u64)));
        (engine, ContractManager::new(key))
    }

    fn runtime() -> Vec<u8> {
        Assembler::new().assemble("PUSH1 0x2a\nPUSH1 0x00\nSSTORE\nSTOP").unwrap()
    }

    #[test]
    fn test_contract_deployment() {
        let (mut engine, mut manager) = setup();
        let sender = manager.sender();

        let first = manager
            .deploy(&mut engine, "First", &wrap_deployment(&runtime()).unwrap())
            .unwrap();
        let second = manager
            .deploy(&mut engine, "Second", &wrap_deployment(&runtime()).unwrap())
            .unwrap();

        assert_eq!(first, sender.create(0));
        assert_eq!(second, sender.create(1));
        assert_eq!(engine.code(first).to_vec(), runtime());
        assert_eq!(manager.count(), 2);
        assert_eq!(manager.list(), vec!["First", "Second"]);
        assert!(manager.get("First").unwrap().gas_used > 0);
    }

    #[test]
    fn test_failed_deployment() {
        let (mut engine, mut manager) = setup();
        let reverting = Assembler::new().assemble("PUSH1 0x00\nDUP1\nREVERT").unwrap();

        let err = manager.deploy(&mut engine, "Bad", &reverting).unwrap_err();

        assert!(matches!(err, ContractError::Deployment(ref m) if m.starts_with("Bad")));
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn test_invalid_deployments() {
        let (mut engine, mut manager) = setup();
        assert!(matches!(
            manager.deploy(&mut engine, "Empty", &[]),
            Err(ContractError::InvalidBytecode)
        ));

        let init = wrap_deployment(&runtime()).unwrap();
        manager.deploy(&mut engine, "Twice", &init).unwrap();
        assert!(matches!(
            manager.deploy(&mut engine, "Twice", &init),
            Err(ContractError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_build_call_uses_current_nonce() {
        let (mut engine, mut manager) = setup();
        let address = manager
            .deploy(&mut engine, "Target", &wrap_deployment(&runtime()).unwrap())
            .unwrap();

        let tx = manager
            .build_call_by_name(&engine, "Target", "function storage()", None)
            .unwrap();

        assert_eq!(tx.tx.nonce, 1);
        assert_eq!(tx.tx.to, Some(address));
        assert_eq!(tx.tx.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(tx.tx.data.to_vec(), abi::selector("storage()").unwrap().to_vec());
        assert_eq!(tx.sender().unwrap(), manager.sender());

        let outcome = engine.execute(&tx).unwrap();
        assert!(outcome.is_success());
    }

    #[test]
    fn test_call_unknown_contract() {
        let (engine, manager) = setup();
        assert!(matches!(
            manager.build_call_by_name(&engine, "Missing", "function f()", None),
            Err(ContractError::NotFound(_))
        ));
    }
}
