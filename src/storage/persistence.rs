//! Trace file persistence
//!
//! Traces are written as a JSON array with 4-space indentation. Writes go to
//! a sibling `.tmp` file which is renamed over the destination only once
//! fully written.

use crate::trace::TraceRecord;
use serde::Serialize;
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Indentation of trace files
const INDENT: &[u8] = b"    ";

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Serialize records in the trace file format
pub fn write_records<W: Write>(writer: W, records: &[TraceRecord]) -> Result<(), StorageError> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
    records.serialize(&mut serializer)?;
    Ok(())
}

/// Render records as a trace file string
pub fn to_json_string(records: &[TraceRecord]) -> Result<String, StorageError> {
    let mut buf = Vec::new();
    write_records(&mut buf, records)?;
    // serde_json only emits valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write a trace file, replacing `path` atomically
pub fn save_trace(path: &Path, records: &[TraceRecord]) -> Result<(), StorageError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "trace path has no file name"))?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(file_name);
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    // Write to temporary file first
    let written = write_file(&temp_path, records);
    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
        return written;
    }

    // Atomic rename
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StorageError::IoError(e)
    })
}

fn write_file(path: &Path, records: &[TraceRecord]) -> Result<(), StorageError> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(&file);
    write_records(&mut writer, records)?;
    writer.flush()?;
    drop(writer);
    file.sync_all()?;
    Ok(())
}

/// Load a trace file
pub fn load_trace(path: &Path) -> Result<Vec<TraceRecord>, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}
