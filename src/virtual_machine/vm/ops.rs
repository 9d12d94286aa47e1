//! Opcode handlers.
//!
//! Every handler has the [`ExecFn`](crate::virtual_machine::registry::ExecFn)
//! signature. Operands are popped top first, so for `SUB` the first pop is the
//! minuend. A failing pop leaves the items popped before it removed.

use crate::types::word::{self, WORD_BYTES, Word};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::registry::Instruction;
use crate::virtual_machine::vm::context::{ExecutionContext, HaltReason};

type Unary = fn(Word) -> Word;
type Binary = fn(Word, Word) -> Word;
type Ternary = fn(Word, Word, Word) -> Word;

fn unary(ctx: &mut ExecutionContext, f: Unary) -> Result<(), VMError> {
    let a = ctx.stack.pop()?;
    ctx.stack.push(f(a))
}

fn binary(ctx: &mut ExecutionContext, f: Binary) -> Result<(), VMError> {
    let a = ctx.stack.pop()?;
    let b = ctx.stack.pop()?;
    ctx.stack.push(f(a, b))
}

fn ternary(ctx: &mut ExecutionContext, f: Ternary) -> Result<(), VMError> {
    let a = ctx.stack.pop()?;
    let b = ctx.stack.pop()?;
    let c = ctx.stack.pop()?;
    ctx.stack.push(f(a, b, c))
}

/// Memory offset that must be addressable for a `length`-byte access.
fn memory_offset(offset: Word, length: usize) -> Result<usize, VMError> {
    word::to_usize(offset).ok_or(VMError::InvalidMemoryAccess {
        offset,
        length: Word::from(length),
    })
}

/// Converts a word-sized `(offset, length)` pair to native sizes.
///
/// A zero length never touches memory, so its offset is not checked.
fn memory_range(offset: Word, length: Word) -> Result<(usize, usize), VMError> {
    if length.is_zero() {
        return Ok((0, 0));
    }
    match (word::to_usize(offset), word::to_usize(length)) {
        (Some(offset), Some(length)) => Ok((offset, length)),
        _ => Err(VMError::InvalidMemoryAccess { offset, length }),
    }
}

fn push_usize(ctx: &mut ExecutionContext, value: usize) -> Result<(), VMError> {
    ctx.stack.push(Word::from(value))
}

// ==================== Halting ====================

pub fn op_stop(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    ctx.stop();
    Ok(())
}

pub fn op_return(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let offset = ctx.stack.pop()?;
    let length = ctx.stack.pop()?;
    let (offset, length) = memory_range(offset, length)?;
    let data = ctx.memory.load_range(offset, length)?;
    ctx.halt(HaltReason::Return, data);
    Ok(())
}

pub fn op_revert(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let offset = ctx.stack.pop()?;
    let length = ctx.stack.pop()?;
    let (offset, length) = memory_range(offset, length)?;
    let data = ctx.memory.load_range(offset, length)?;
    ctx.halt(HaltReason::Revert, data);
    Ok(())
}

pub fn op_invalid(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    ctx.halt(HaltReason::Invalid, Vec::new());
    Ok(())
}

/// Pops the beneficiary. Nothing is transferred.
pub fn op_selfdestruct(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    ctx.stack.pop()?;
    ctx.halt(HaltReason::SelfDestruct, Vec::new());
    Ok(())
}

// ==================== Arithmetic ====================

pub fn op_add(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, |a, b| a.wrapping_add(b))
}

pub fn op_mul(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, |a, b| a.wrapping_mul(b))
}

pub fn op_sub(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, |a, b| a.wrapping_sub(b))
}

pub fn op_div(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::div)
}

pub fn op_sdiv(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::sdiv)
}

pub fn op_mod(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::rem)
}

pub fn op_smod(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::smod)
}

pub fn op_addmod(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    ternary(ctx, word::addmod)
}

pub fn op_mulmod(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    ternary(ctx, word::mulmod)
}

pub fn op_exp(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::exp)
}

pub fn op_signextend(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::signextend)
}

// ==================== Comparison and bitwise ====================

pub fn op_lt(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::lt)
}

pub fn op_gt(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::gt)
}

pub fn op_slt(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::slt)
}

pub fn op_sgt(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::sgt)
}

pub fn op_eq(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::eq)
}

pub fn op_iszero(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    unary(ctx, word::iszero)
}

pub fn op_and(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, |a, b| a & b)
}

pub fn op_or(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, |a, b| a | b)
}

pub fn op_xor(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, |a, b| a ^ b)
}

pub fn op_not(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    unary(ctx, |a| !a)
}

pub fn op_byte(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::byte)
}

pub fn op_shl(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::shl)
}

pub fn op_shr(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::shr)
}

pub fn op_sar(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    binary(ctx, word::sar)
}

// ==================== Hashing ====================

pub fn op_sha3(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let offset = ctx.stack.pop()?;
    let length = ctx.stack.pop()?;
    let (offset, length) = memory_range(offset, length)?;
    let data = ctx.memory.load_range(offset, length)?;
    let digest = ctx.hash(&data);
    ctx.stack.push(digest)
}

// ==================== Environment ====================

/// No value transfer exists, so this is always zero.
pub fn op_callvalue(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    ctx.stack.push(Word::ZERO)
}

pub fn op_calldataload(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let offset = ctx.stack.pop()?;
    let value = ctx.calldata.read_word(offset);
    ctx.stack.push(value)
}

pub fn op_calldatasize(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let value = ctx.calldata.len();
    push_usize(ctx, value)
}

/// Copies exactly `size` calldata bytes, zero-padding past the end.
pub fn op_calldatacopy(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let dest = ctx.stack.pop()?;
    let offset = ctx.stack.pop()?;
    let size = ctx.stack.pop()?;
    let (dest, size) = memory_range(dest, size)?;
    ctx.memory.copy_padded(dest, size, ctx.calldata.tail(offset))
}

pub fn op_codesize(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let value = ctx.code().len();
    push_usize(ctx, value)
}

pub fn op_codecopy(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let dest = ctx.stack.pop()?;
    let offset = ctx.stack.pop()?;
    let size = ctx.stack.pop()?;
    let (dest, size) = memory_range(dest, size)?;
    ctx.copy_code(dest, offset, size)
}

// ==================== Stack ====================

pub fn op_pop(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    ctx.stack.pop().map(drop)
}

pub fn op_push(ctx: &mut ExecutionContext, instruction: &Instruction) -> Result<(), VMError> {
    let value = instruction
        .operand()
        .map_or(Word::ZERO, |operand| operand.value());
    ctx.stack.push(value)
}

/// `DUPn` copies the n-th item from the top.
pub fn op_dup(ctx: &mut ExecutionContext, instruction: &Instruction) -> Result<(), VMError> {
    let index = instruction.byte().wrapping_sub(Opcode::Dup1.byte()) as usize;
    let value = ctx.stack.peek(index)?;
    ctx.stack.push(value)
}

/// `SWAPn` exchanges the top with the item n below it.
pub fn op_swap(ctx: &mut ExecutionContext, instruction: &Instruction) -> Result<(), VMError> {
    let depth = instruction.byte().wrapping_sub(Opcode::Swap1.byte()) as usize + 1;
    ctx.stack.swap(depth)
}

// ==================== Memory and storage ====================

pub fn op_mload(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let offset = ctx.stack.pop()?;
    let offset = memory_offset(offset, WORD_BYTES)?;
    let value = ctx.memory.load_word(offset)?;
    ctx.stack.push(value)
}

pub fn op_mstore(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let offset = ctx.stack.pop()?;
    let value = ctx.stack.pop()?;
    let offset = memory_offset(offset, WORD_BYTES)?;
    ctx.memory.store_word(offset, value)
}

/// Stores the low byte of the value.
pub fn op_mstore8(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let offset = ctx.stack.pop()?;
    let value = ctx.stack.pop()?;
    let offset = memory_offset(offset, 1)?;
    ctx.memory.store(offset, word::to_be_bytes(value)[WORD_BYTES - 1])
}

pub fn op_msize(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let value = ctx.memory.len();
    push_usize(ctx, value)
}

pub fn op_sload(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let slot = ctx.stack.pop()?;
    let value = ctx.storage.get(slot);
    ctx.stack.push(value)
}

pub fn op_sstore(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let slot = ctx.stack.pop()?;
    let value = ctx.stack.pop()?;
    ctx.storage.put(slot, value);
    Ok(())
}

// ==================== Control flow ====================

pub fn op_jump(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let target = ctx.stack.pop()?;
    ctx.jump(target)
}

pub fn op_jumpi(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let target = ctx.stack.pop()?;
    let condition = ctx.stack.pop()?;
    if condition.is_zero() {
        return Ok(());
    }
    ctx.jump(target)
}

/// Pushes the offset of the `PC` instruction itself.
pub fn op_pc(ctx: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    let value = ctx.instruction_pc();
    push_usize(ctx, value)
}

pub fn op_jumpdest(_: &mut ExecutionContext, _: &Instruction) -> Result<(), VMError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with(stack: &[u64]) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(Vec::new(), Vec::new());
        for value in stack {
            ctx.stack.push(Word::from(*value)).unwrap();
        }
        ctx
    }

    fn exec(ctx: &mut ExecutionContext, opcode: Opcode) -> Result<(), VMError> {
        Instruction::new(opcode).execute(ctx)
    }

    #[test]
    fn sub_uses_top_as_minuend() {
        let mut ctx = ctx_with(&[3, 10]);
        exec(&mut ctx, Opcode::Sub).unwrap();
        assert_eq!(ctx.stack.pop().unwrap(), Word::from(7u64));
    }

    #[test]
    fn binary_underflow_consumes_popped_items() {
        let mut ctx = ctx_with(&[1]);
        let err = exec(&mut ctx, Opcode::Add).unwrap_err();
        assert!(matches!(err, VMError::StackUnderflow { .. }));
        assert!(ctx.stack.is_empty());
    }

    #[test]
    fn dup_and_swap_depths() {
        let mut ctx = ctx_with(&[1, 2, 3]);
        exec(&mut ctx, Opcode::Dup3).unwrap();
        assert_eq!(ctx.stack.to_string(), "[0x01, 0x02, 0x03, 0x01]");
        exec(&mut ctx, Opcode::Swap2).unwrap();
        assert_eq!(ctx.stack.to_string(), "[0x01, 0x01, 0x03, 0x02]");
        assert!(exec(&mut ctx, Opcode::Dup5).is_err());
    }

    #[test]
    fn mstore8_keeps_low_byte() {
        let mut ctx = ctx_with(&[0x1234, 0]);
        exec(&mut ctx, Opcode::MStore8).unwrap();
        assert_eq!(ctx.memory.load(0).unwrap(), 0x34);
        assert_eq!(ctx.memory.active_words(), 1);
    }

    #[test]
    fn zero_length_return_ignores_offset() {
        let mut ctx = ExecutionContext::new(Vec::new(), Vec::new());
        ctx.stack.push(Word::ZERO).unwrap();
        ctx.stack.push(Word::MAX).unwrap();
        exec(&mut ctx, Opcode::Return).unwrap();
        assert!(ctx.success());
        assert!(ctx.return_data().is_empty());
        assert!(ctx.memory.is_empty());
    }

    #[test]
    fn huge_memory_offset_fails() {
        let mut ctx = ExecutionContext::new(Vec::new(), Vec::new());
        ctx.stack.push(Word::ZERO).unwrap();
        ctx.stack.push(Word::MAX).unwrap();
        assert!(matches!(
            exec(&mut ctx, Opcode::MStore),
            Err(VMError::InvalidMemoryAccess { .. })
        ));
    }

    #[test]
    fn codecopy_pads_past_end() {
        let mut ctx = ExecutionContext::new(vec![0xaa, 0xbb], Vec::new());
        for value in [4u64, 1, 0] {
            ctx.stack.push(Word::from(value)).unwrap();
        }
        exec(&mut ctx, Opcode::CodeCopy).unwrap();
        assert_eq!(ctx.memory.load_range(0, 4).unwrap(), vec![0xbb, 0, 0, 0]);
    }

    #[test]
    fn calldatacopy_copies_exact_size() {
        let mut ctx = ExecutionContext::new(Vec::new(), vec![1, 2, 3]);
        for value in [2u64, 1, 5] {
            ctx.stack.push(Word::from(value)).unwrap();
        }
        exec(&mut ctx, Opcode::CallDataCopy).unwrap();
        assert_eq!(ctx.memory.load_range(4, 4).unwrap(), vec![0, 2, 3, 0]);
    }

    #[test]
    fn jumpi_false_falls_through() {
        let mut ctx = ctx_with(&[0, 99]);
        exec(&mut ctx, Opcode::JumpI).unwrap();
        assert!(!ctx.is_halted());
        assert!(ctx.stack.is_empty());
    }

    #[test]
    fn selfdestruct_requires_beneficiary() {
        let mut ctx = ctx_with(&[]);
        assert!(exec(&mut ctx, Opcode::SelfDestruct).is_err());
        let mut ctx = ctx_with(&[7]);
        exec(&mut ctx, Opcode::SelfDestruct).unwrap();
        assert!(ctx.success());
    }
}
