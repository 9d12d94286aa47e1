//! Stack-based bytecode virtual machine following EVM semantics.
//!
//! Code is a flat byte buffer. Every byte is either a zero-operand opcode or
//! a `PUSH1`..`PUSH32` followed by its big-endian immediate. Execution runs
//! against a bounded stack of 256-bit words, word-granular expandable memory,
//! a sparse storage map and read-only calldata.
//!
//! # Architecture
//!
//! - **Opcode table**: a single macro-held list ([`isa`]) generates the
//!   [`isa::Opcode`] enum and the dispatch [`registry`]
//! - **Decode**: past-the-end reads yield `STOP`, truncated pushes are
//!   zero-padded on the right
//! - **Jumps**: only `JUMPDEST` bytes outside push data are valid targets; any
//!   other target halts the execution with failure
//! - **Runner**: fetch-decode-execute with optional hooks and a step ceiling
//! - **Text form**: [`disassembler`] and [`assembler`] round-trip bytecode
//!
//! # Modules
//!
//! - [`assembler`]: Assembly items and text to bytecode
//! - [`config`]: Run options and environment overrides
//! - [`disassembler`]: Bytecode to annotated text lines
//! - [`errors`]: Execution and assembly error types
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`operand`]: Push immediates and hex helpers
//! - [`registry`]: Opcode registry, instruction values and decoding
//! - [`vm`]: Execution context, opcode handlers and the runner

pub mod assembler;
pub mod config;
pub mod disassembler;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod operand;
pub mod registry;
pub mod vm;
