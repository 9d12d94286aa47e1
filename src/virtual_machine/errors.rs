use crate::types::word::Word;
use crate::virtual_machine::vm::ExecutionContext;
use evm_lite_derive::Error;

/// Errors that can occur during decoding, execution or assembly.
#[derive(Debug, Error)]
pub enum VMError {
    /// Popping or peeking more items than the stack holds.
    #[error("stack underflow: needed {requested} items, stack holds {depth}")]
    StackUnderflow { requested: usize, depth: usize },
    /// Push would exceed the maximum stack depth.
    #[error("stack overflow: max depth is {max_depth}")]
    StackOverflow { max_depth: usize },
    /// Value does not fit in a 256-bit word.
    #[error("invalid stack item: {len} bytes do not fit in a 32-byte word")]
    InvalidStackItem { len: usize },
    /// Memory offset or length outside the addressable range.
    #[error("invalid memory access: offset {offset}, length {length}")]
    InvalidMemoryAccess { offset: Word, length: Word },
    /// Byte store with a value above 255.
    #[error("invalid memory value {value}: must fit in one byte")]
    InvalidMemoryValue { value: Word },
    /// Storage key outside the word range.
    #[error("invalid storage slot ({len} bytes)")]
    InvalidStorageSlot { len: usize },
    /// Storage value outside the word range.
    #[error("invalid storage value ({len} bytes)")]
    InvalidStorageValue { len: usize },
    /// Program counter moved outside the code buffer.
    #[error("invalid code offset {offset}: code is {code_len} bytes")]
    InvalidCodeOffset { offset: usize, code_len: usize },
    /// Opcode byte with no registered instruction.
    #[error("unknown opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
    /// Two instructions registered for the same opcode byte.
    #[error("duplicate opcode 0x{opcode:02x}: {existing} already registered, cannot add {mnemonic}")]
    DuplicateOpcode {
        opcode: u8,
        existing: &'static str,
        mnemonic: &'static str,
    },
    /// Jump target is not a JUMPDEST outside push data.
    #[error("invalid jump destination {target} from pc {pc}")]
    InvalidJumpDestination { target: Word, pc: usize },
    /// Step ceiling exceeded. Carries the context as it was when the run stopped.
    #[error("execution limit reached after {steps} steps")]
    ExecutionLimitReached {
        steps: u64,
        context: Box<ExecutionContext>,
    },
    /// Error in a line of disassembly text, with its location.
    #[error("line {line}, column {column}: {source}")]
    AssemblyError {
        line: usize,
        column: usize,
        source: Box<VMError>,
    },
    /// Mnemonic not present in the opcode registry.
    #[error("unknown mnemonic {mnemonic}")]
    UnknownMnemonic { mnemonic: String },
    /// Malformed or mis-sized operand in assembly input.
    #[error("invalid operand {operand}: {reason}")]
    InvalidOperand {
        operand: String,
        reason: &'static str,
    },
    /// Unparsable configuration value.
    #[error("invalid configuration value {value} for {key}")]
    InvalidConfig { key: &'static str, value: String },
}
