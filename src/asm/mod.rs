//! EVM assembly support
//!
//! Provides:
//! - The opcode table (mnemonic ⇄ byte, immediate sizes)
//! - A mnemonic assembler with labels for hand-written test programs
//! - A disassembler
//!
//! # Example
//!
//! ```rust
//! use evm_tracer::asm::{disassemble, Assembler};
//!
//! let mut assembler = Assembler::new();
//! let code = assembler.assemble("PUSH1 0x01\nPUSH1 0x02\nADD").unwrap();
//! assert_eq!(code, vec![0x60, 0x01, 0x60, 0x02, 0x01]);
//! assert!(disassemble(&code).contains("ADD"));
//! ```

pub mod assembler;
pub mod opcodes;

pub use assembler::{disassemble, wrap_deployment, Assembler, AssemblerError};
