//! Core value types shared by the interpreter, disassembler and assembler.
//!
//! - `Word`: 256-bit machine word plus the wrapping and signed arithmetic helpers
//! - `Hash`: 32-byte Keccak-256 digest consumed by the `SHA3` opcode
//! - `Bytes`: cheaply clonable immutable buffer holding code and calldata

pub mod bytes;
pub mod hash;
pub mod word;
