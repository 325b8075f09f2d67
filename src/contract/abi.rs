//! Minimal contract ABI support
//!
//! Covers what call transactions need: 4-byte function selectors from
//! human-readable signatures and the encoding of a single `string` argument.

use crate::contract::ContractError;
use revm::primitives::keccak256;

/// Size of one ABI head/tail slot
const SLOT: usize = 32;

/// Canonical form of a human-readable function signature
///
/// Accepts `function name(type a, ...)` or `name(type, ...)`; parameter
/// names, data locations and modifiers are dropped and `uint`/`int`/`byte`
/// aliases are widened, so `function f(uint a, string memory b) external`
/// becomes `f(uint256,string)`.
pub fn canonical_signature(signature: &str) -> Result<String, ContractError> {
    let invalid = || ContractError::InvalidSignature(signature.to_string());

    let signature = signature.trim();
    let signature = signature.strip_prefix("function ").unwrap_or(signature).trim();
    let open = signature.find('(').ok_or_else(invalid)?;
    let close = signature.rfind(')').ok_or_else(invalid)?;
    if close < open {
        return Err(invalid());
    }

    let name = signature[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return Err(invalid());
    }

    let params = signature[open + 1..close].trim();
    let types = if params.is_empty() {
        Vec::new()
    } else {
        split_params(params)
            .into_iter()
            .map(|param| {
                param
                    .split_whitespace()
                    .next()
                    .map(canonical_type)
                    .ok_or_else(invalid)
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(format!("{}({})", name, types.join(",")))
}

/// Split a parameter list on top-level commas
fn split_params(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(params[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(params[start..].trim());
    parts
}

fn canonical_type(ty: &str) -> String {
    // Array suffixes survive the alias rewrite
    let (base, suffix) = match ty.find('[') {
        Some(idx) => ty.split_at(idx),
        None => (ty, ""),
    };
    let base = match base {
        "uint" => "uint256",
        "int" => "int256",
        "byte" => "bytes1",
        other => other,
    };
    format!("{}{}", base, suffix)
}

/// 4-byte selector of a function signature
pub fn selector(signature: &str) -> Result<[u8; 4], ContractError> {
    let canonical = canonical_signature(signature)?;
    let hash = keccak256(canonical.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    Ok(out)
}

/// ABI encoding of a single dynamic `string` argument
///
/// Head slot holding the tail offset, then the byte length and the UTF-8
/// bytes right-padded to a multiple of 32.
pub fn encode_string(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let padded = bytes.len().div_ceil(SLOT) * SLOT;
    let mut out = Vec::with_capacity(2 * SLOT + padded);
    out.extend_from_slice(&slot(SLOT as u64));
    out.extend_from_slice(&slot(bytes.len() as u64));
    out.extend_from_slice(bytes);
    out.resize(2 * SLOT + padded, 0);
    out
}

fn slot(value: u64) -> [u8; SLOT] {
    let mut word = [0u8; SLOT];
    word[SLOT - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Calldata for a call to `signature`, with an optional string argument
pub fn encode_call(signature: &str, argument: Option<&str>) -> Result<Vec<u8>, ContractError> {
    let mut data = selector(signature)?.to_vec();
    if let Some(argument) = argument {
        data.extend(encode_string(argument));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)").unwrap()), "a9059cbb");
        assert_eq!(
            hex::encode(selector("function transfer(address to, uint amount) external").unwrap()),
            "a9059cbb"
        );
        assert_eq!(hex::encode(selector("function balanceOf(address)").unwrap()), "70a08231");
    }

    #[test]
    fn test_canonical_signature() {
        assert_eq!(canonical_signature("function push_pop()").unwrap(), "push_pop()");
        assert_eq!(
            canonical_signature("function f(uint[] memory xs, string calldata s, byte b)").unwrap(),
            "f(uint256[],string,bytes1)"
        );
        assert!(canonical_signature("function ()").is_err());
        assert!(canonical_signature("push_pop").is_err());
        assert!(canonical_signature("function f(uint a,)").is_err());
    }

    #[test]
    fn test_selector_matches_keccak_of_canonical_form() {
        let expected = keccak256(b"memory_sample()");
        assert_eq!(selector("function memory_sample()").unwrap(), expected[..4]);
    }

    #[test]
    fn test_encode_string() {
        let encoded = encode_string("hello");
        assert_eq!(encoded.len(), 96);
        assert_eq!(encoded[31], 0x20);
        assert_eq!(encoded[63], 5);
        assert_eq!(&encoded[64..69], b"hello");
        assert!(encoded[69..].iter().all(|&b| b == 0));

        let empty = encode_string("");
        assert_eq!(empty.len(), 64);
        assert_eq!(empty[63], 0);

        assert_eq!(encode_string(&"x".repeat(33)).len(), 128);
    }

    #[test]
    fn test_encode_call() {
        let plain = encode_call("function storage()", None).unwrap();
        assert_eq!(plain.len(), 4);

        let with_arg = encode_call("function set(string)", Some("abc")).unwrap();
        assert_eq!(with_arg.len(), 4 + 96);
        assert_eq!(&with_arg[..4], &selector("set(string)").unwrap());
    }
}
