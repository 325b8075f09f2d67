//! Mnemonic assembler for raw EVM programs
//!
//! Compiles assembly-like source to bytecode:
//!
//! ```text
//! ; comments start with ';' or '#'
//! PUSH1 0x01
//! PUSH1 2
//! ADD
//! PUSH2 @end      ; label reference
//! JUMP
//! :end
//! JUMPDEST
//! ```

use crate::asm::opcodes::{self, PUSH1};
use revm::primitives::U256;
use std::collections::HashMap;
use std::fmt::Write;
use thiserror::Error;

/// Width used for `PUSH @label` without an explicit size
const LABEL_WIDTH: usize = 2;

/// Length of the init code emitted by [`wrap_deployment`]
const DEPLOYMENT_PREFIX_LEN: usize = 13;

/// Assembler errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AssemblerError {
    #[error("Unknown instruction: {0}")]
    UnknownInstruction(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Undefined label: {0}")]
    UndefinedLabel(String),
    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Value {value} does not fit in {width} byte(s)")]
    ValueTooLarge { value: String, width: usize },
    #[error("Code too large: {0} bytes")]
    CodeTooLarge(usize),
}

/// Pending label reference: where to patch, how wide, which label
struct LabelRef {
    position: usize,
    width: usize,
    label: String,
}

/// Assembler for EVM bytecode
pub struct Assembler {
    /// Output bytecode
    code: Vec<u8>,
    /// Label positions
    labels: HashMap<String, usize>,
    /// Pending label references
    label_refs: Vec<LabelRef>,
}

impl Assembler {
    /// Create a new assembler
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            labels: HashMap::new(),
            label_refs: Vec::new(),
        }
    }

    /// Assemble source code to bytecode
    pub fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        self.code.clear();
        self.labels.clear();
        self.label_refs.clear();

        for line in source.lines() {
            let line = strip_comment(line).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(label) = line.strip_prefix(':') {
                let label = label.trim().to_string();
                if self.labels.insert(label.clone(), self.code.len()).is_some() {
                    return Err(AssemblerError::DuplicateLabel(label));
                }
                continue;
            }

            self.assemble_instruction(line)?;
        }

        for label_ref in &self.label_refs {
            let addr = *self
                .labels
                .get(&label_ref.label)
                .ok_or_else(|| AssemblerError::UndefinedLabel(label_ref.label.clone()))?;
            let bytes = fit_width(U256::from(addr), label_ref.width)?;
            self.code[label_ref.position..label_ref.position + label_ref.width]
                .copy_from_slice(&bytes);
        }

        Ok(self.code.clone())
    }

    /// Assemble a single instruction
    fn assemble_instruction(&mut self, line: &str) -> Result<(), AssemblerError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let mnemonic = parts[0].to_uppercase();
        let operand = parts.get(1).copied();

        if parts.len() > 2 {
            return Err(AssemblerError::InvalidArgument(line.to_string()));
        }

        // Bare PUSH picks the narrowest width
        if mnemonic == "PUSH" {
            let operand = operand.ok_or_else(|| {
                AssemblerError::InvalidArgument("PUSH requires an operand".to_string())
            })?;
            return match operand.strip_prefix('@') {
                Some(label) => self.push_label(LABEL_WIDTH, label),
                None => {
                    let value = parse_number(operand)?;
                    let width = minimal_width(value);
                    self.push_value(width, value)
                }
            };
        }

        let opcode = opcodes::from_name(&mnemonic)
            .ok_or_else(|| AssemblerError::UnknownInstruction(mnemonic.clone()))?;
        let width = opcodes::immediate_size(opcode);

        if width == 0 {
            if operand.is_some() {
                return Err(AssemblerError::InvalidArgument(format!(
                    "{} takes no operand",
                    mnemonic
                )));
            }
            self.code.push(opcode);
            return Ok(());
        }

        let operand = operand.ok_or_else(|| {
            AssemblerError::InvalidArgument(format!("{} requires an operand", mnemonic))
        })?;
        match operand.strip_prefix('@') {
            Some(label) => self.push_label(width, label),
            None => self.push_value(width, parse_number(operand)?),
        }
    }

    fn push_value(&mut self, width: usize, value: U256) -> Result<(), AssemblerError> {
        let bytes = fit_width(value, width)?;
        self.code.push(PUSH1 + (width as u8 - 1));
        self.code.extend_from_slice(&bytes);
        Ok(())
    }

    fn push_label(&mut self, width: usize, label: &str) -> Result<(), AssemblerError> {
        if label.is_empty() {
            return Err(AssemblerError::InvalidArgument("empty label".to_string()));
        }
        self.code.push(PUSH1 + (width as u8 - 1));
        self.label_refs.push(LabelRef {
            position: self.code.len(),
            width,
            label: label.to_string(),
        });
        self.code.extend(std::iter::repeat(0).take(width));
        Ok(())
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find([';', '#']) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Parse a number (decimal or hex)
fn parse_number(s: &str) -> Result<U256, AssemblerError> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) => U256::from_str_radix(digits, 16),
        None => U256::from_str_radix(s, 10),
    };
    parsed.map_err(|_| AssemblerError::InvalidNumber(s.to_string()))
}

fn minimal_width(value: U256) -> usize {
    value.byte_len().max(1)
}

/// Big-endian encoding of `value` in exactly `width` bytes
fn fit_width(value: U256, width: usize) -> Result<Vec<u8>, AssemblerError> {
    if value.byte_len() > width {
        return Err(AssemblerError::ValueTooLarge {
            value: format!("0x{:x}", value),
            width,
        });
    }
    let be: [u8; 32] = value.to_be_bytes();
    Ok(be[32 - width..].to_vec())
}

/// Build init code that returns `runtime` as the deployed contract code
pub fn wrap_deployment(runtime: &[u8]) -> Result<Vec<u8>, AssemblerError> {
    let len = u16::try_from(runtime.len())
        .map_err(|_| AssemblerError::CodeTooLarge(runtime.len()))?
        .to_be_bytes();
    let offset = (DEPLOYMENT_PREFIX_LEN as u16).to_be_bytes();

    let mut code = vec![
        0x61, len[0], len[1], // PUSH2 len
        0x80, // DUP1
        0x61, offset[0], offset[1], // PUSH2 offset
        0x60, 0x00, // PUSH1 0
        0x39, // CODECOPY
        0x60, 0x00, // PUSH1 0
        0xf3, // RETURN
    ];
    code.extend_from_slice(runtime);
    Ok(code)
}

/// Disassemble bytecode to readable format
pub fn disassemble(code: &[u8]) -> String {
    let mut output = String::new();
    let mut pc = 0;

    while pc < code.len() {
        let opcode = code[pc];
        let _ = match opcodes::name(opcode) {
            Some(name) => write!(output, "{:04x}: {}", pc, name),
            None => write!(output, "{:04x}: {} 0x{:02x}", pc, opcodes::UNKNOWN, opcode),
        };
        pc += 1;

        let width = opcodes::immediate_size(opcode);
        if width > 0 {
            let end = (pc + width).min(code.len());
            let _ = write!(output, " 0x{}", hex::encode(&code[pc..end]));
            if end - pc < width {
                output.push_str(" (truncated)");
            }
            pc = end;
        }

        output.push('\n');
    }

    output
}
