//! Canonical per-instruction trace records

use crate::engine::StepEvent;
use crate::trace::memory::{format_memory, MemoryMap};
use crate::trace::TraceError;
use serde::{Deserialize, Serialize};

/// One executed instruction as written to the trace file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Active memory words keyed by hex offset
    pub memory: MemoryMap,
    /// Stack words as minimal lowercase hex, in engine order
    pub stack: Vec<String>,
    /// Instruction mnemonic
    pub opcode: String,
    /// Program counter
    pub pc: usize,
}

impl TraceRecord {
    /// Map a step event to its trace record
    pub fn from_step(event: &StepEvent) -> Result<Self, TraceError> {
        Ok(Self {
            memory: format_memory(&event.memory)?,
            stack: event.stack.iter().map(|word| format!("{:x}", word)).collect(),
            opcode: event.opcode.name.to_string(),
            pc: event.pc,
        })
    }
}
