//! Trace capture errors

use crate::engine::EngineError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors raised while capturing or persisting a trace
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Memory out of range: {word_count} word(s) requested from a {len}-byte buffer")]
    MemoryOutOfRange { word_count: usize, len: usize },
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
