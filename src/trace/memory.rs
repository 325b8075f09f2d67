//! Sparse memory formatting
//!
//! Only the active words of a memory snapshot are kept, keyed by their byte
//! offset. Offsets serialize as hex without `0x`, words as 64 lowercase hex
//! digits, in ascending offset order.

use crate::engine::{MemorySnapshot, WORD_SIZE};
use crate::trace::TraceError;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Offset → word mapping of the active part of memory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryMap {
    /// `(offset, hex word)` in ascending offset order
    entries: Vec<(usize, String)>,
}

impl MemoryMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hex word stored at a byte offset
    pub fn get(&self, offset: usize) -> Option<&str> {
        self.entries
            .binary_search_by_key(&offset, |(o, _)| *o)
            .ok()
            .map(|idx| self.entries[idx].1.as_str())
    }

    /// `(hex offset, hex word)` pairs as they appear in the trace file
    pub fn iter(&self) -> impl Iterator<Item = (String, &str)> {
        self.entries
            .iter()
            .map(|(offset, word)| (format!("{:x}", offset), word.as_str()))
    }
}

/// Format the active words of a memory snapshot
pub fn format_memory(snapshot: &MemorySnapshot) -> Result<MemoryMap, TraceError> {
    format_words(&snapshot.bytes, snapshot.word_count)
}

/// Format the first `word_count` 32-byte words of `bytes`
///
/// Fails with [`TraceError::MemoryOutOfRange`] if the buffer is shorter than
/// `word_count * 32` bytes; missing bytes are never padded.
pub fn format_words(bytes: &[u8], word_count: usize) -> Result<MemoryMap, TraceError> {
    let out_of_range = || TraceError::MemoryOutOfRange {
        word_count,
        len: bytes.len(),
    };
    let needed = word_count.checked_mul(WORD_SIZE).ok_or_else(out_of_range)?;
    if needed > bytes.len() {
        return Err(out_of_range());
    }

    let entries = bytes[..needed]
        .chunks_exact(WORD_SIZE)
        .enumerate()
        .map(|(i, word)| (i * WORD_SIZE, hex::encode(word)))
        .collect();

    Ok(MemoryMap { entries })
}

impl Serialize for MemoryMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, word) in self.iter() {
            map.serialize_entry(&key, word)?;
        }
        map.end()
    }
}

struct MemoryMapVisitor;

impl<'de> Visitor<'de> for MemoryMapVisitor {
    type Value = MemoryMap;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of hex offsets to 32-byte hex words")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<MemoryMap, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, word)) = access.next_entry::<String, String>()? {
            let offset = usize::from_str_radix(&key, 16)
                .map_err(|_| de::Error::custom(format!("invalid memory offset {:?}", key)))?;
            if offset % WORD_SIZE != 0 {
                return Err(de::Error::custom(format!("unaligned memory offset {:?}", key)));
            }
            if word.len() != WORD_SIZE * 2 || !word.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(de::Error::custom(format!("invalid memory word at {:?}", key)));
            }
            entries.push((offset, word));
        }
        entries.sort_by_key(|(offset, _)| *offset);
        Ok(MemoryMap { entries })
    }
}

impl<'de> Deserialize<'de> for MemoryMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MemoryMapVisitor)
    }
}
