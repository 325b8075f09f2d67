//! Per-instruction step events and listener registration
//!
//! The engine raises one [`StepEvent`] immediately before each instruction.
//! Consumers register a listener with [`StepListeners::subscribe`] and get a
//! [`Subscription`] back; dropping the subscription unregisters the listener.

use revm::primitives::U256;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::asm::opcodes;

/// Size of one EVM memory word in bytes
pub const WORD_SIZE: usize = 32;

/// Callback invoked for every step event
pub type StepListener = Box<dyn FnMut(&StepEvent)>;

/// Machine memory at the time of a step
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemorySnapshot {
    /// Raw memory contents
    pub bytes: Vec<u8>,
    /// Number of 32-byte words that have been touched
    pub word_count: usize,
}

impl MemorySnapshot {
    /// Snapshot a fully word-aligned buffer (every word counts as active)
    pub fn from_buffer(bytes: Vec<u8>) -> Self {
        let word_count = bytes.len().div_ceil(WORD_SIZE);
        Self { bytes, word_count }
    }

    /// Snapshot with an explicit active word count
    pub fn with_word_count(bytes: Vec<u8>, word_count: usize) -> Self {
        Self { bytes, word_count }
    }
}

/// Opcode executed by a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    /// Numeric opcode byte
    pub code: u8,
    /// Mnemonic, e.g. `PUSH1`
    pub name: &'static str,
}

impl Opcode {
    pub fn new(code: u8) -> Self {
        Self {
            code,
            name: opcodes::mnemonic(code),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02x})", self.name, self.code)
    }
}

/// Machine state before executing one instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepEvent {
    /// Stack words, bottom first, in engine order
    pub stack: Vec<U256>,
    /// Memory snapshot
    pub memory: MemorySnapshot,
    /// Instruction about to execute
    pub opcode: Opcode,
    /// Offset of the instruction within the running code
    pub pc: usize,
}

// =============================================================================
// Listener registration
// =============================================================================

#[derive(Default)]
struct ListenerSet {
    next_id: u64,
    entries: Vec<(u64, StepListener)>,
}

/// Shared set of step listeners owned by an engine
///
/// Listeners are invoked in registration order. A listener must not
/// subscribe or cancel subscriptions from inside its own callback.
#[derive(Clone, Default)]
pub struct StepListeners {
    inner: Rc<RefCell<ListenerSet>>,
}

impl StepListeners {
    /// Create an empty listener set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; it stays registered until the returned handle is dropped
    pub fn subscribe(&self, listener: StepListener) -> Subscription {
        let mut set = self.inner.borrow_mut();
        let id = set.next_id;
        set.next_id += 1;
        set.entries.push((id, listener));
        log::debug!("step listener {} registered ({} active)", id, set.entries.len());

        Subscription {
            set: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every registered listener
    pub fn dispatch(&self, event: &StepEvent) {
        let mut set = self.inner.borrow_mut();
        for (_, listener) in set.entries.iter_mut() {
            listener(event);
        }
    }
}

/// Cancellation handle for a registered step listener
///
/// Unregisters the listener exactly once, either through [`Subscription::cancel`]
/// or when dropped.
#[must_use = "dropping a subscription unregisters its listener immediately"]
pub struct Subscription {
    set: Weak<RefCell<ListenerSet>>,
    id: u64,
}

impl Subscription {
    /// Unregister the listener now
    pub fn cancel(self) {}

    /// Identifier of the registered listener
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(set) = self.set.upgrade() {
            let mut set = set.borrow_mut();
            set.entries.retain(|(id, _)| *id != self.id);
            log::debug!("step listener {} removed ({} active)", self.id, set.entries.len());
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
