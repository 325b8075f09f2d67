pub mod persistence;

pub use persistence::{load_trace, save_trace, to_json_string, write_records, StorageError};
