//! Embedded EVM backed by `revm`
//!
//! Holds all state in memory. Every transaction is executed with a step
//! inspector that forwards instruction-level events to the registered
//! listeners.

use crate::core::{SignedTransaction, DEFAULT_CHAIN_ID};
use crate::engine::events::{MemorySnapshot, Opcode, StepEvent, StepListener, StepListeners, Subscription};
use crate::engine::{EngineError, ExecutionEngine, ExecutionOutcome};
use revm::db::{CacheDB, EmptyDB};
use revm::interpreter::Interpreter;
use revm::primitives::{
    AccountInfo, Address, Bytecode, Bytes, ExecutionResult, Output, SpecId, TxKind, U256,
};
use revm::{inspector_handle_register, Database, Evm, EvmContext, Inspector};

/// Address raw programs are installed at
pub const CODE_ADDRESS: Address = Address::new([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff,
]);

/// Inspector that counts instructions and forwards them to listeners
struct StepDispatcher {
    listeners: StepListeners,
    instructions: u64,
}

impl<DB: Database> Inspector<DB> for StepDispatcher {
    fn step(&mut self, interp: &mut Interpreter, _context: &mut EvmContext<DB>) {
        let pc = interp.program_counter();

        // The interpreter executes a padding STOP past the end of code
        if pc >= interp.contract.bytecode.len() {
            return;
        }
        self.instructions += 1;

        if self.listeners.is_empty() {
            return;
        }

        let event = StepEvent {
            stack: interp.stack.data().clone(),
            memory: MemorySnapshot::from_buffer(interp.shared_memory.context_memory().to_vec()),
            opcode: Opcode::new(interp.current_opcode()),
            pc,
        };
        self.listeners.dispatch(&event);
    }
}

/// In-memory EVM execution engine
pub struct EmbeddedEvm {
    db: CacheDB<EmptyDB>,
    listeners: StepListeners,
    spec_id: SpecId,
    chain_id: u64,
}

impl EmbeddedEvm {
    /// Create an empty engine using the Petersburg rules
    pub fn new() -> Self {
        Self::with_spec(SpecId::PETERSBURG)
    }

    /// Create an empty engine for a specific hardfork
    pub fn with_spec(spec_id: SpecId) -> Self {
        Self {
            db: CacheDB::new(EmptyDB::default()),
            listeners: StepListeners::new(),
            spec_id,
            chain_id: DEFAULT_CHAIN_ID,
        }
    }

    pub fn spec_id(&self) -> SpecId {
        self.spec_id
    }

    fn account_info(&self, address: Address) -> AccountInfo {
        self.db
            .accounts
            .get(&address)
            .map(|account| account.info.clone())
            .unwrap_or_default()
    }

    /// Place runtime code at an address without a deployment transaction
    pub fn install_code(&mut self, address: Address, code: impl Into<Bytes>) {
        let bytecode = Bytecode::new_raw(code.into());
        let mut info = self.account_info(address);
        info.code_hash = bytecode.hash_slow();
        info.code = Some(bytecode);
        self.db.insert_account_info(address, info);
    }

    /// Balance of an account
    pub fn balance(&self, address: Address) -> U256 {
        self.account_info(address).balance
    }

    /// Runtime code stored at an address
    pub fn code(&self, address: Address) -> Bytes {
        let info = self.account_info(address);
        info.code
            .or_else(|| self.db.contracts.get(&info.code_hash).cloned())
            .map(|code| code.original_bytes())
            .unwrap_or_default()
    }
}

impl Default for EmbeddedEvm {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionEngine for EmbeddedEvm {
    fn subscribe(&self, listener: StepListener) -> Subscription {
        self.listeners.subscribe(listener)
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn nonce(&self, address: Address) -> u64 {
        self.db
            .accounts
            .get(&address)
            .map(|account| account.info.nonce)
            .unwrap_or(0)
    }

    fn fund_account(&mut self, address: Address, balance: U256) {
        let mut info = self.account_info(address);
        info.balance = balance;
        self.db.insert_account_info(address, info);
        log::debug!("funded {} with {} wei", address, balance);
    }

    fn execute(&mut self, tx: &SignedTransaction) -> Result<ExecutionOutcome, EngineError> {
        let sender = tx.sender()?;
        let expected = self.nonce(sender);
        if tx.tx.nonce != expected {
            return Err(EngineError::NonceMismatch {
                address: sender,
                expected,
                actual: tx.tx.nonce,
            });
        }

        log::debug!("executing tx {} from {}", tx.hash(), sender);

        let transact_to = match tx.tx.to {
            Some(to) => TxKind::Call(to),
            None => TxKind::Create,
        };
        let chain_id = self.chain_id;
        let dispatcher = StepDispatcher {
            listeners: self.listeners.clone(),
            instructions: 0,
        };

        let mut evm = Evm::builder()
            .with_db(&mut self.db)
            .with_external_context(dispatcher)
            .with_spec_id(self.spec_id)
            .modify_cfg_env(|cfg| cfg.chain_id = chain_id)
            .modify_tx_env(|env| {
                env.caller = sender;
                env.gas_limit = tx.tx.gas_limit;
                env.gas_price = tx.tx.gas_price;
                env.transact_to = transact_to;
                env.value = tx.tx.value;
                env.data = tx.tx.data.clone();
                env.nonce = Some(tx.tx.nonce);
                env.chain_id = Some(tx.tx.chain_id);
            })
            .append_handler_register(inspector_handle_register)
            .build();

        let result = evm.transact_commit();
        let instructions = evm.context.external.instructions;
        drop(evm);

        let result = result.map_err(|e| EngineError::Rejected(e.to_string()))?;

        let outcome = match result {
            ExecutionResult::Success {
                gas_used, output, ..
            } => {
                let (output, created_address) = match output {
                    Output::Create(bytes, address) => (bytes, address),
                    Output::Call(bytes) => (bytes, None),
                };
                ExecutionOutcome {
                    exception: None,
                    created_address,
                    output,
                    gas_used,
                    instructions,
                }
            }
            ExecutionResult::Revert { gas_used, output } => ExecutionOutcome {
                exception: Some(format!("execution reverted (0x{})", hex::encode(&output))),
                created_address: None,
                output,
                gas_used,
                instructions,
            },
            ExecutionResult::Halt { reason, gas_used } => ExecutionOutcome {
                exception: Some(format!("execution halted: {:?}", reason)),
                created_address: None,
                output: Bytes::new(),
                gas_used,
                instructions,
            },
        };

        log::debug!(
            "tx finished: {} instruction(s), {} gas, exception: {:?}",
            outcome.instructions,
            outcome.gas_used,
            outcome.exception
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{wrap_deployment, Assembler};
    use crate::core::TransactionBuilder;
    use crate::crypto::KeyPair;
    use std::cell::RefCell;
    use std::rc::Rc;

    const TEST_KEY: &str = "e331b6d69882b4cb4ea581d88e0b604039a3de5967688d3dcffdd2270c0fd109";

    fn setup() -> (EmbeddedEvm, KeyPair) {
        let key = KeyPair::from_private_key_hex(TEST_KEY).unwrap();
        let mut engine = EmbeddedEvm::new();
        engine.fund_account(key.address(), U256::from(10u64).pow(U256::from(18u64)));
        (engine, key)
    }

    fn call(engine: &EmbeddedEvm, key: &KeyPair, to: Address) -> SignedTransaction {
        TransactionBuilder::new()
            .nonce(engine.nonce(key.address()))
            .to(to)
            .build_and_sign(key)
            .unwrap()
    }

    fn collect_steps(engine: &EmbeddedEvm) -> (Rc<RefCell<Vec<StepEvent>>>, Subscription) {
        let steps = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&steps);
        let sub = engine.subscribe(Box::new(move |e: &StepEvent| sink.borrow_mut().push(e.clone())));
        (steps, sub)
    }

    #[test]
    fn test_steps_for_add_program() {
        let (mut engine, key) = setup();
        engine.install_code(CODE_ADDRESS, vec![0x60, 0x01, 0x60, 0x02, 0x01]);
        let (steps, _sub) = collect_steps(&engine);

        let tx = call(&engine, &key, CODE_ADDRESS);
        let outcome = engine.execute(&tx).unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.instructions, 3);
        let steps = steps.borrow();
        let names: Vec<&str> = steps.iter().map(|s| s.opcode.name).collect();
        assert_eq!(names, vec!["PUSH1", "PUSH1", "ADD"]);
        assert_eq!(steps[2].pc, 4);
        assert_eq!(steps[2].stack, vec![U256::from(1), U256::from(2)]);
        assert_eq!(engine.nonce(key.address()), 1);
    }

    #[test]
    fn test_memory_in_steps() {
        let (mut engine, key) = setup();
        let code = Assembler::new()
            .assemble("PUSH1 0x2a\nPUSH1 0x20\nMSTORE\nSTOP")
            .unwrap();
        engine.install_code(CODE_ADDRESS, code);
        let (steps, _sub) = collect_steps(&engine);

        engine.execute(&call(&engine, &key, CODE_ADDRESS)).unwrap();

        let steps = steps.borrow();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[2].memory.word_count, 0);
        let last = &steps[3];
        assert_eq!(last.opcode.name, "STOP");
        assert_eq!(last.memory.word_count, 2);
        assert_eq!(last.memory.bytes[63], 0x2a);
    }

    #[test]
    fn test_call_without_code() {
        let (mut engine, key) = setup();
        let (steps, _sub) = collect_steps(&engine);
        let empty: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();

        let outcome = engine.execute(&call(&engine, &key, empty)).unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.instructions, 0);
        assert!(steps.borrow().is_empty());
    }

    #[test]
    fn test_deploy_returns_address_and_code() {
        let (mut engine, key) = setup();
        let runtime = vec![0x60, 0x01, 0x00];
        let tx = TransactionBuilder::new()
            .nonce(0)
            .data(wrap_deployment(&runtime).unwrap())
            .build_and_sign(&key)
            .unwrap();

        let outcome = engine.execute(&tx).unwrap();

        let address = outcome.created_address.unwrap();
        assert_eq!(address, key.address().create(0));
        assert_eq!(engine.code(address).to_vec(), runtime);
    }

    #[test]
    fn test_revert_reported_as_exception() {
        let (mut engine, key) = setup();
        let code = Assembler::new()
            .assemble("PUSH1 0x00\nPUSH1 0x00\nREVERT")
            .unwrap();
        engine.install_code(CODE_ADDRESS, code);

        let outcome = engine.execute(&call(&engine, &key, CODE_ADDRESS)).unwrap();

        assert!(!outcome.is_success());
        assert!(outcome.exception.unwrap().contains("reverted"));
        assert_eq!(outcome.instructions, 3);
    }

    #[test]
    fn test_nonce_mismatch_rejected() {
        let (mut engine, key) = setup();
        let tx = TransactionBuilder::new()
            .nonce(5)
            .to(CODE_ADDRESS)
            .build_and_sign(&key)
            .unwrap();

        assert!(matches!(
            engine.execute(&tx),
            Err(EngineError::NonceMismatch {
                expected: 0,
                actual: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_unfunded_sender_rejected() {
        let mut engine = EmbeddedEvm::new();
        let key = KeyPair::from_private_key_hex(TEST_KEY).unwrap();
        let tx = call(&engine, &key, CODE_ADDRESS);
        assert!(matches!(engine.execute(&tx), Err(EngineError::Rejected(_))));
    }
}
