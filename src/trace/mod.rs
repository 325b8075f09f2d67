//! Instruction trace capture
//!
//! Turns the engine's step events into serializable [`TraceRecord`]s and
//! writes whole-transaction traces to disk.
//!
//! # Overview
//!
//! - [`format_memory`] renders the active memory words as an offset-keyed map
//! - [`TraceRecord::from_step`] maps one step event to its persisted form
//! - [`TraceRecorder`] subscribes to an engine for one transaction and
//!   persists the ordered records

pub mod error;
pub mod memory;
pub mod record;
pub mod recorder;

pub use error::TraceError;
pub use memory::{format_memory, format_words, MemoryMap};
pub use record::TraceRecord;
pub use recorder::{Capture, RecorderOptions, TraceRecorder, TraceSummary};
