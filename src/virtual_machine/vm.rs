//! Interpreter: execution state and the fetch-decode-execute loop.
//!
//! A [`Runner`] owns a [`RunConfig`], optional pre- and post-step hooks and
//! the hash function used by `SHA3`. Each call to [`Runner::run`] builds a
//! fresh [`ExecutionContext`] and steps it until it halts:
//!
//! 1. decode the instruction at the program counter and advance past it
//! 2. run the pre-hook
//! 3. execute the instruction
//! 4. run the post-hook
//! 5. count the step and enforce the step ceiling
//!
//! Normal halts (`STOP`, `RETURN`, `REVERT`, `INVALID`, a bad jump target)
//! return the final context. Contract violations such as stack underflow
//! abort the run with a [`VMError`].

mod calldata;
mod context;
mod memory;
pub(crate) mod ops;
mod stack;
mod storage;

pub use calldata::Calldata;
pub use context::{ExecutionContext, HaltReason, Status, valid_jump_destinations};
pub use memory::{DEFAULT_MAX_MEMORY, Memory};
pub use stack::{MAX_STACK_DEPTH, Stack};
pub use storage::Storage;

use crate::info;
use crate::types::bytes::Bytes;
use crate::types::hash::{HashFn, keccak256};
use crate::virtual_machine::config::RunConfig;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::registry::{DecodeMode, Instruction, registry};

/// Callback invoked around each executed instruction.
///
/// Hooks may inspect or mutate the context. An error aborts the run and is
/// returned unchanged. Any `FnMut(&mut ExecutionContext, &Instruction)`
/// closure returning `Result<(), VMError>` is a hook.
pub trait StepHook {
    fn on_step(
        &mut self,
        ctx: &mut ExecutionContext,
        instruction: &Instruction,
    ) -> Result<(), VMError>;
}

impl<F> StepHook for F
where
    F: FnMut(&mut ExecutionContext, &Instruction) -> Result<(), VMError>,
{
    fn on_step(
        &mut self,
        ctx: &mut ExecutionContext,
        instruction: &Instruction,
    ) -> Result<(), VMError> {
        self(ctx, instruction)
    }
}

/// Drives executions of bytecode.
pub struct Runner<'h> {
    config: RunConfig,
    prehook: Option<Box<dyn StepHook + 'h>>,
    posthook: Option<Box<dyn StepHook + 'h>>,
    hasher: HashFn,
}

impl<'h> Runner<'h> {
    /// Runner without hooks, hashing with Keccak-256.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            prehook: None,
            posthook: None,
            hasher: keccak256,
        }
    }

    /// Hook called after decoding, before the instruction executes.
    pub fn with_prehook(mut self, hook: impl StepHook + 'h) -> Self {
        self.prehook = Some(Box::new(hook));
        self
    }

    /// Hook called after the instruction executes.
    pub fn with_posthook(mut self, hook: impl StepHook + 'h) -> Self {
        self.posthook = Some(Box::new(hook));
        self
    }

    /// Replaces the hash function behind `SHA3`.
    pub fn with_hasher(mut self, hasher: HashFn) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Executes `code` with `calldata` until it halts.
    ///
    /// Returns the halted context, whether it succeeded or failed. Returns
    /// [`VMError::ExecutionLimitReached`] once more than `max_steps`
    /// instructions ran (when `max_steps > 0`).
    pub fn run(
        &mut self,
        code: impl Into<Bytes>,
        calldata: impl Into<Bytes>,
    ) -> Result<ExecutionContext, VMError> {
        let mut ctx = ExecutionContext::with_limits(
            code,
            calldata,
            self.config.max_stack_depth,
            self.config.max_memory_bytes,
            self.hasher,
        );
        let registry = registry();
        let mut steps = 0u64;

        while !ctx.is_halted() {
            let pc = ctx.pc();
            let decoded = registry.decode(ctx.code(), pc, DecodeMode::Execute)?;
            let instruction = decoded.instruction;
            ctx.begin_instruction(pc, decoded.next_pc);

            if let Some(hook) = self.prehook.as_mut() {
                hook.on_step(&mut ctx, &instruction)?;
            }
            registry.execute(&mut ctx, &instruction)?;
            if let Some(hook) = self.posthook.as_mut() {
                hook.on_step(&mut ctx, &instruction)?;
            }

            steps += 1;
            ctx.set_steps(steps);
            if self.config.verbose {
                info!("{}", trace_line(&ctx, &instruction, pc, &self.config));
            }
            if self.config.max_steps > 0 && steps > self.config.max_steps {
                return Err(VMError::ExecutionLimitReached {
                    steps,
                    context: Box::new(ctx),
                });
            }
        }

        Ok(ctx)
    }
}

/// Runs `code` once with `config` and no hooks.
pub fn run(code: &[u8], calldata: &[u8], config: &RunConfig) -> Result<ExecutionContext, VMError> {
    Runner::new(config.clone()).run(code, calldata)
}

/// Trace text for one executed instruction.
///
/// `<instruction> @ pc=<offset>`, then optional indented stack and memory
/// lines depending on `config`.
pub fn trace_line(
    ctx: &ExecutionContext,
    instruction: &Instruction,
    pc: usize,
    config: &RunConfig,
) -> String {
    let mut line = format!("{instruction} @ pc={pc}");
    if config.print_stack {
        line.push_str(&format!("\n    stack: {}", ctx.stack));
    }
    if config.print_memory {
        line.push_str(&format!("\n    memory: {}", ctx.memory));
    }
    line
}
