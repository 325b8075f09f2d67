//! Transaction trace recorder
//!
//! Captures every step event raised while one transaction executes, maps
//! each to a [`TraceRecord`] and persists the ordered sequence.

use crate::core::SignedTransaction;
use crate::engine::{ExecutionEngine, ExecutionOutcome, StepEvent};
use crate::storage;
use crate::trace::{TraceError, TraceRecord};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Recorder behaviour switches
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderOptions {
    /// Write the records captured so far when execution fails
    pub persist_partial: bool,
}

/// Records produced by one execution, with the engine's outcome
#[derive(Debug, Clone)]
pub struct Capture {
    pub records: Vec<TraceRecord>,
    pub outcome: ExecutionOutcome,
}

/// Result of a recorded and persisted trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSummary {
    pub path: PathBuf,
    pub records: usize,
    pub gas_used: u64,
}

/// Records accumulated by the step listener
#[derive(Default)]
struct CaptureBuffer {
    records: Vec<TraceRecord>,
    error: Option<TraceError>,
}

impl CaptureBuffer {
    fn push(&mut self, event: &StepEvent) {
        if self.error.is_some() {
            return;
        }
        match TraceRecord::from_step(event) {
            Ok(record) => {
                log::trace!("{:?}", record);
                self.records.push(record);
            }
            Err(e) => self.error = Some(e),
        }
    }
}

/// Captures instruction traces of single transactions
///
/// One recorder may be reused for any number of transactions, but calls
/// must not overlap.
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    options: RecorderOptions,
}

impl TraceRecorder {
    /// Create a recorder that discards traces of failed executions
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RecorderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> RecorderOptions {
        self.options
    }

    /// Execute `tx` and collect its step records without persisting them
    ///
    /// The listener is registered only for the duration of this call and is
    /// removed on every exit path. An execution exception is reported in the
    /// returned outcome, not as an error.
    pub fn capture<E>(&self, engine: &mut E, tx: &SignedTransaction) -> Result<Capture, TraceError>
    where
        E: ExecutionEngine + ?Sized,
    {
        let buffer = Rc::new(RefCell::new(CaptureBuffer::default()));
        let sink = Rc::clone(&buffer);
        let subscription = engine.subscribe(Box::new(move |event: &StepEvent| sink.borrow_mut().push(event)));

        let result = engine.execute(tx);
        subscription.cancel();
        let outcome = result?;

        let CaptureBuffer { records, error } = buffer.take();
        if let Some(error) = error {
            return Err(error);
        }

        Ok(Capture { records, outcome })
    }

    /// Execute `tx` and write its trace to `destination`
    ///
    /// Fails with [`TraceError::Execution`] if the execution reports an
    /// exception. The partial trace is then discarded unless
    /// [`RecorderOptions::persist_partial`] is set.
    pub fn record<E>(
        &self,
        engine: &mut E,
        tx: &SignedTransaction,
        destination: &Path,
    ) -> Result<TraceSummary, TraceError>
    where
        E: ExecutionEngine + ?Sized,
    {
        let Capture { records, outcome } = self.capture(engine, tx)?;

        if let Some(exception) = outcome.exception {
            if self.options.persist_partial {
                match storage::save_trace(destination, &records) {
                    Ok(()) => log::warn!(
                        "partial trace of {} record(s) written to {}",
                        records.len(),
                        destination.display()
                    ),
                    Err(e) => log::warn!(
                        "failed to write partial trace to {}: {}",
                        destination.display(),
                        e
                    ),
                }
            }
            return Err(TraceError::Execution(exception));
        }

        storage::save_trace(destination, &records)?;
        log::info!(
            "trace of {} record(s) written to {}",
            records.len(),
            destination.display()
        );

        Ok(TraceSummary {
            path: destination.to_path_buf(),
            records: records.len(),
            gas_used: outcome.gas_used,
        })
    }
}
