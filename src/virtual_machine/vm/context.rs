use crate::types::bytes::Bytes;
use crate::types::hash::{HashFn, keccak256};
use crate::types::word::{self, Word};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{JUMPDEST_OPCODE, push_width};
use crate::virtual_machine::vm::calldata::Calldata;
use crate::virtual_machine::vm::memory::{DEFAULT_MAX_MEMORY, Memory};
use crate::virtual_machine::vm::stack::{MAX_STACK_DEPTH, Stack};
use crate::virtual_machine::vm::storage::Storage;
use crate::warn;
use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle of an execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Running => "running",
            Status::Succeeded => "success",
            Status::Failed => "failure",
        })
    }
}

/// Why an execution halted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HaltReason {
    /// `STOP`, or running off the end of code.
    Stop,
    Return,
    Revert,
    Invalid,
    SelfDestruct,
    /// A `JUMP`/`JUMPI` targeted something other than a `JUMPDEST`.
    InvalidJump { target: Word, pc: usize },
}

impl HaltReason {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            HaltReason::Stop | HaltReason::Return | HaltReason::SelfDestruct
        )
    }
}

/// Offsets of every `JUMPDEST` byte that is not inside a push immediate.
pub fn valid_jump_destinations(code: &[u8]) -> BTreeSet<usize> {
    let mut destinations = BTreeSet::new();
    let mut pc = 0;
    while pc < code.len() {
        let byte = code[pc];
        if byte == JUMPDEST_OPCODE {
            destinations.insert(pc);
        }
        pc += 1 + push_width(byte).unwrap_or(0);
    }
    destinations
}

/// State of one execution of a code buffer.
///
/// Owns its stack, memory, storage and calldata. The jump-destination set is
/// computed once from the code at construction.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    code: Bytes,
    pub stack: Stack,
    pub memory: Memory,
    pub storage: Storage,
    pub calldata: Calldata,
    pc: usize,
    instruction_pc: usize,
    status: Status,
    halt_reason: Option<HaltReason>,
    return_data: Vec<u8>,
    jump_destinations: BTreeSet<usize>,
    hasher: HashFn,
    steps: u64,
}

impl ExecutionContext {
    /// Context with default limits and Keccak-256 for `SHA3`.
    pub fn new(code: impl Into<Bytes>, calldata: impl Into<Bytes>) -> Self {
        Self::with_limits(
            code,
            calldata,
            MAX_STACK_DEPTH,
            DEFAULT_MAX_MEMORY,
            keccak256,
        )
    }

    pub fn with_limits(
        code: impl Into<Bytes>,
        calldata: impl Into<Bytes>,
        max_stack_depth: usize,
        max_memory_bytes: usize,
        hasher: HashFn,
    ) -> Self {
        let code = code.into();
        let jump_destinations = valid_jump_destinations(&code);
        Self {
            code,
            stack: Stack::with_max_depth(max_stack_depth),
            memory: Memory::with_limit(max_memory_bytes),
            storage: Storage::new(),
            calldata: Calldata::new(calldata),
            pc: 0,
            instruction_pc: 0,
            status: Status::Running,
            halt_reason: None,
            return_data: Vec::new(),
            jump_destinations,
            hasher,
            steps: 0,
        }
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Copies `size` bytes of code from `offset` into memory at `dest`, zero-padded.
    pub fn copy_code(&mut self, dest: usize, offset: Word, size: usize) -> Result<(), VMError> {
        let source = match word::to_usize(offset) {
            Some(start) => self.code.tail(start),
            None => &[],
        };
        self.memory.copy_padded(dest, size, source)
    }

    /// Offset of the next instruction to decode.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Offset of the instruction currently executing.
    pub fn instruction_pc(&self) -> usize {
        self.instruction_pc
    }

    /// Moves the program counter. `code.len()` is allowed and means "at end".
    pub fn set_program_counter(&mut self, pc: usize) -> Result<(), VMError> {
        if pc > self.code.len() {
            return Err(VMError::InvalidCodeOffset {
                offset: pc,
                code_len: self.code.len(),
            });
        }
        self.pc = pc;
        Ok(())
    }

    /// Records that the instruction at `pc` was decoded and execution will
    /// continue at `next_pc`.
    pub(crate) fn begin_instruction(&mut self, pc: usize, next_pc: usize) {
        self.instruction_pc = pc;
        self.pc = next_pc;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt_reason
    }

    pub fn is_halted(&self) -> bool {
        self.status != Status::Running
    }

    pub fn success(&self) -> bool {
        self.status == Status::Succeeded
    }

    pub fn return_data(&self) -> &[u8] {
        &self.return_data
    }

    /// Completed steps. Maintained by the runner.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn set_steps(&mut self, steps: u64) {
        self.steps = steps;
    }

    pub fn jump_destinations(&self) -> &BTreeSet<usize> {
        &self.jump_destinations
    }

    pub fn hash(&self, data: &[u8]) -> Word {
        (self.hasher)(data).to_word()
    }

    /// Stops with success and no return data.
    pub fn stop(&mut self) {
        self.halt(HaltReason::Stop, Vec::new());
    }

    /// Stops execution. The status follows from `reason`.
    pub fn halt(&mut self, reason: HaltReason, return_data: Vec<u8>) {
        self.status = if reason.is_success() {
            Status::Succeeded
        } else {
            Status::Failed
        };
        self.halt_reason = Some(reason);
        self.return_data = return_data;
    }

    /// Continues at `target` if it is a valid jump destination.
    ///
    /// Any other target halts the execution with failure. This is a normal
    /// outcome of running untrusted code, not an error of the caller.
    pub fn jump(&mut self, target: Word) -> Result<(), VMError> {
        match word::to_usize(target) {
            Some(dest) if self.jump_destinations.contains(&dest) => self.set_program_counter(dest),
            _ => {
                let pc = self.instruction_pc;
                warn!(
                    "{}",
                    VMError::InvalidJumpDestination {
                        target,
                        pc
                    }
                );
                self.halt(HaltReason::InvalidJump { target, pc }, Vec::new());
                Ok(())
            }
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "status: {}, pc: {}, steps: {}", self.status, self.pc, self.steps)?;
        writeln!(f, "stack: {}", self.stack)?;
        writeln!(f, "memory: {}", self.memory)?;
        write!(f, "storage: {}", self.storage)?;
        if !self.return_data.is_empty() {
            write!(f, "\nreturn: 0x")?;
            for byte in &self.return_data {
                write!(f, "{byte:02x}")?;
            }
        }
        Ok(())
    }
}
