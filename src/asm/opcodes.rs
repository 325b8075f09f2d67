//! EVM opcode table
//!
//! Maps opcode bytes to mnemonics and back, and reports how many immediate
//! bytes follow each instruction.
//!
//! Kept separate from `revm::interpreter::OpCode` because trace files use the
//! ethereumjs mnemonics (`SHA3`, `DIFFICULTY`) where revm names the same
//! bytes `KECCAK256` and `PREVRANDAO`. The assembler accepts both spellings.

/// Mnemonic used for bytes that are not assigned an instruction
pub const UNKNOWN: &str = "UNKNOWN";

pub const STOP: u8 = 0x00;
pub const JUMPDEST: u8 = 0x5b;
pub const PUSH0: u8 = 0x5f;
pub const PUSH1: u8 = 0x60;
pub const PUSH32: u8 = 0x7f;
pub const DUP1: u8 = 0x80;
pub const DUP16: u8 = 0x8f;
pub const SWAP1: u8 = 0x90;
pub const SWAP16: u8 = 0x9f;
pub const LOG0: u8 = 0xa0;
pub const LOG4: u8 = 0xa4;

const PUSH_NAMES: [&str; 32] = [
    "PUSH1", "PUSH2", "PUSH3", "PUSH4", "PUSH5", "PUSH6", "PUSH7", "PUSH8", "PUSH9", "PUSH10",
    "PUSH11", "PUSH12", "PUSH13", "PUSH14", "PUSH15", "PUSH16", "PUSH17", "PUSH18", "PUSH19",
    "PUSH20", "PUSH21", "PUSH22", "PUSH23", "PUSH24", "PUSH25", "PUSH26", "PUSH27", "PUSH28",
    "PUSH29", "PUSH30", "PUSH31", "PUSH32",
];

const DUP_NAMES: [&str; 16] = [
    "DUP1", "DUP2", "DUP3", "DUP4", "DUP5", "DUP6", "DUP7", "DUP8", "DUP9", "DUP10", "DUP11",
    "DUP12", "DUP13", "DUP14", "DUP15", "DUP16",
];

const SWAP_NAMES: [&str; 16] = [
    "SWAP1", "SWAP2", "SWAP3", "SWAP4", "SWAP5", "SWAP6", "SWAP7", "SWAP8", "SWAP9", "SWAP10",
    "SWAP11", "SWAP12", "SWAP13", "SWAP14", "SWAP15", "SWAP16",
];

const LOG_NAMES: [&str; 5] = ["LOG0", "LOG1", "LOG2", "LOG3", "LOG4"];

/// Get the mnemonic of an opcode byte, or `None` if unassigned
pub fn name(byte: u8) -> Option<&'static str> {
    let name = match byte {
        // Stop and arithmetic
        0x00 => "STOP",
        0x01 => "ADD",
        0x02 => "MUL",
        0x03 => "SUB",
        0x04 => "DIV",
        0x05 => "SDIV",
        0x06 => "MOD",
        0x07 => "SMOD",
        0x08 => "ADDMOD",
        0x09 => "MULMOD",
        0x0a => "EXP",
        0x0b => "SIGNEXTEND",

        // Comparison and bitwise logic
        0x10 => "LT",
        0x11 => "GT",
        0x12 => "SLT",
        0x13 => "SGT",
        0x14 => "EQ",
        0x15 => "ISZERO",
        0x16 => "AND",
        0x17 => "OR",
        0x18 => "XOR",
        0x19 => "NOT",
        0x1a => "BYTE",
        0x1b => "SHL",
        0x1c => "SHR",
        0x1d => "SAR",

        0x20 => "SHA3",

        // Environment
        0x30 => "ADDRESS",
        0x31 => "BALANCE",
        0x32 => "ORIGIN",
        0x33 => "CALLER",
        0x34 => "CALLVALUE",
        0x35 => "CALLDATALOAD",
        0x36 => "CALLDATASIZE",
        0x37 => "CALLDATACOPY",
        0x38 => "CODESIZE",
        0x39 => "CODECOPY",
        0x3a => "GASPRICE",
        0x3b => "EXTCODESIZE",
        0x3c => "EXTCODECOPY",
        0x3d => "RETURNDATASIZE",
        0x3e => "RETURNDATACOPY",
        0x3f => "EXTCODEHASH",

        // Block information
        0x40 => "BLOCKHASH",
        0x41 => "COINBASE",
        0x42 => "TIMESTAMP",
        0x43 => "NUMBER",
        0x44 => "DIFFICULTY",
        0x45 => "GASLIMIT",
        0x46 => "CHAINID",
        0x47 => "SELFBALANCE",
        0x48 => "BASEFEE",
        0x49 => "BLOBHASH",
        0x4a => "BLOBBASEFEE",

        // Stack, memory, storage and flow
        0x50 => "POP",
        0x51 => "MLOAD",
        0x52 => "MSTORE",
        0x53 => "MSTORE8",
        0x54 => "SLOAD",
        0x55 => "SSTORE",
        0x56 => "JUMP",
        0x57 => "JUMPI",
        0x58 => "PC",
        0x59 => "MSIZE",
        0x5a => "GAS",
        0x5b => "JUMPDEST",
        0x5c => "TLOAD",
        0x5d => "TSTORE",
        0x5e => "MCOPY",
        0x5f => "PUSH0",

        PUSH1..=PUSH32 => PUSH_NAMES[(byte - PUSH1) as usize],
        DUP1..=DUP16 => DUP_NAMES[(byte - DUP1) as usize],
        SWAP1..=SWAP16 => SWAP_NAMES[(byte - SWAP1) as usize],
        LOG0..=LOG4 => LOG_NAMES[(byte - LOG0) as usize],

        // System
        0xf0 => "CREATE",
        0xf1 => "CALL",
        0xf2 => "CALLCODE",
        0xf3 => "RETURN",
        0xf4 => "DELEGATECALL",
        0xf5 => "CREATE2",
        0xfa => "STATICCALL",
        0xfd => "REVERT",
        0xfe => "INVALID",
        0xff => "SELFDESTRUCT",

        _ => return None,
    };
    Some(name)
}

/// Mnemonic of an opcode byte, [`UNKNOWN`] if unassigned
pub fn mnemonic(byte: u8) -> &'static str {
    name(byte).unwrap_or(UNKNOWN)
}

/// Look up an opcode byte by mnemonic (case-insensitive)
///
/// `KECCAK256` is accepted as an alias of `SHA3` and `PREVRANDAO` of `DIFFICULTY`.
pub fn from_name(mnemonic: &str) -> Option<u8> {
    let upper = mnemonic.to_ascii_uppercase();
    let canonical = match upper.as_str() {
        "KECCAK256" => "SHA3",
        "PREVRANDAO" => "DIFFICULTY",
        other => other,
    };
    (0..=u8::MAX).find(|&byte| name(byte) == Some(canonical))
}

/// Number of immediate bytes following the opcode
pub fn immediate_size(byte: u8) -> usize {
    match byte {
        PUSH1..=PUSH32 => (byte - PUSH1) as usize + 1,
        _ => 0,
    }
}

/// Whether the opcode is one of `PUSH1`..`PUSH32`
pub fn is_push(byte: u8) -> bool {
    (PUSH1..=PUSH32).contains(&byte)
}
