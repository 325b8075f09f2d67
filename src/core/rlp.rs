//! Minimal RLP encoding for transaction payloads

use revm::primitives::U256;

/// Encode a byte string
pub fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        out.push(bytes[0]);
    } else {
        encode_length(bytes.len(), 0x80, out);
        out.extend_from_slice(bytes);
    }
}

/// Encode an unsigned integer as its minimal big-endian byte string
pub fn encode_u64(value: u64, out: &mut Vec<u8>) {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    encode_bytes(&bytes[start..], out);
}

pub fn encode_u256(value: U256, out: &mut Vec<u8>) {
    let bytes: [u8; 32] = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    encode_bytes(&bytes[start..], out);
}

/// Wrap already-encoded items in a list header
pub fn encode_list(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 9);
    encode_length(payload.len(), 0xc0, &mut out);
    out.extend_from_slice(payload);
    out
}

fn encode_length(len: usize, offset: u8, out: &mut Vec<u8>) {
    if len < 56 {
        out.push(offset + len as u8);
    } else {
        let bytes = (len as u64).to_be_bytes();
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        out.push(offset + 55 + (bytes.len() - start) as u8);
        out.extend_from_slice(&bytes[start..]);
    }
}
