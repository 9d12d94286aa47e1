//! Minimal EVM-style bytecode interpreter.
//!
//! Provides 256-bit word arithmetic, the execution engine, and a disassembler
//! and assembler that round-trip bytecode through text.

pub mod types;
pub mod utils;
pub mod virtual_machine;
