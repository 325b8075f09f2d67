//! Scripted engine for exercising consumers without a real VM

use crate::core::SignedTransaction;
use crate::engine::events::{StepEvent, StepListener, StepListeners, Subscription};
use crate::engine::{EngineError, ExecutionEngine, ExecutionOutcome};
use revm::primitives::{Address, U256};

/// Replays a fixed list of step events for every transaction
pub(crate) struct ScriptedEngine {
    listeners: StepListeners,
    pub events: Vec<StepEvent>,
    pub exception: Option<String>,
    pub reject: bool,
    pub executed: usize,
    pub funded: Vec<(Address, U256)>,
}

impl ScriptedEngine {
    pub fn new(events: Vec<StepEvent>) -> Self {
        Self {
            listeners: StepListeners::new(),
            events,
            exception: None,
            reject: false,
            executed: 0,
            funded: Vec::new(),
        }
    }

    pub fn failing(events: Vec<StepEvent>, exception: &str) -> Self {
        Self {
            exception: Some(exception.to_string()),
            ..Self::new(events)
        }
    }
}

impl ExecutionEngine for ScriptedEngine {
    fn subscribe(&self, listener: StepListener) -> Subscription {
        self.listeners.subscribe(listener)
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn nonce(&self, _address: Address) -> u64 {
        self.executed as u64
    }

    fn fund_account(&mut self, address: Address, balance: U256) {
        self.funded.push((address, balance));
    }

    fn execute(&mut self, _tx: &SignedTransaction) -> Result<ExecutionOutcome, EngineError> {
        if self.reject {
            return Err(EngineError::Rejected("scripted rejection".to_string()));
        }
        self.executed += 1;
        for event in &self.events {
            self.listeners.dispatch(event);
        }
        Ok(ExecutionOutcome {
            exception: self.exception.clone(),
            instructions: self.events.len() as u64,
            ..Default::default()
        })
    }
}
