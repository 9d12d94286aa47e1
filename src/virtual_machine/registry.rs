//! Opcode registry and instruction decoding.
//!
//! The registry maps each opcode byte to its [`Opcode`] metadata and the
//! handler that executes it. The process-wide table is built once from
//! [`for_each_instruction!`](crate::for_each_instruction) and is read-only
//! afterwards, so decoding and dispatch never lock.
//!
//! [`Registry::decode`] turns the byte at a program counter into an
//! [`Instruction`] plus the offset of the next instruction. Reading past the
//! end of code yields an implicit `STOP`, and a `PUSHn` whose immediate runs
//! past the end is zero-padded on the right.

use crate::types::word::Word;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Opcode, PUSH1_OPCODE};
use crate::virtual_machine::operand::Operand;
use crate::virtual_machine::vm::{ExecutionContext, ops};
use std::fmt;
use std::sync::LazyLock;

/// Mnemonic shown for bytes with no registered opcode.
pub const UNKNOWN_MNEMONIC: &str = "UNKNOWN";

/// Signature shared by every opcode handler.
pub type ExecFn = fn(&mut ExecutionContext, &Instruction) -> Result<(), VMError>;

/// Registry entry for one opcode.
#[derive(Clone, Copy, Debug)]
pub struct OpcodeInfo {
    pub opcode: Opcode,
    pub execute: ExecFn,
}

impl OpcodeInfo {
    pub fn mnemonic(&self) -> &'static str {
        self.opcode.mnemonic()
    }

    pub fn operand_width(&self) -> usize {
        self.opcode.operand_width()
    }
}

/// How [`Registry::decode`] treats bytes with no registered opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeMode {
    /// Unknown bytes are an error.
    Execute,
    /// Unknown bytes decode to a one-byte `UNKNOWN` instruction.
    Disassemble,
}

/// A decoded instruction together with where the next one starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub instruction: Instruction,
    /// Offset of the following instruction, never past the end of code.
    pub next_pc: usize,
    /// `true` when a push immediate ran past the end of code.
    pub truncated: bool,
}

/// A single decoded instruction: an opcode byte and an optional push immediate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Instruction {
    opcode: u8,
    operand: Option<Operand>,
}

impl Instruction {
    /// Instruction for `opcode`. Pushes get a zero immediate of their width.
    pub fn new(opcode: Opcode) -> Self {
        let operand = match opcode.operand_width() {
            0 => None,
            width => Some(Operand::from_code(width, &[])),
        };
        Self {
            opcode: opcode.byte(),
            operand,
        }
    }

    /// `PUSHn` with an explicit immediate. `n` must equal the operand width.
    pub fn with_operand(opcode: Opcode, operand: Operand) -> Result<Self, VMError> {
        if opcode.operand_width() != operand.width() {
            return Err(VMError::InvalidOperand {
                operand: operand.to_string(),
                reason: "operand width does not match the opcode",
            });
        }
        Ok(Self {
            opcode: opcode.byte(),
            operand: Some(operand),
        })
    }

    /// Smallest `PUSHn` that holds `value`.
    pub fn push(value: Word) -> Self {
        let operand = Operand::minimal(value);
        Self {
            opcode: PUSH1_OPCODE + (operand.width() - 1) as u8,
            operand: Some(operand),
        }
    }

    /// Placeholder for a byte with no registered opcode.
    pub fn unknown(byte: u8) -> Self {
        Self {
            opcode: byte,
            operand: None,
        }
    }

    /// The raw opcode byte.
    pub fn byte(&self) -> u8 {
        self.opcode
    }

    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::try_from(self.opcode).ok()
    }

    pub fn mnemonic(&self) -> &'static str {
        self.opcode()
            .map(|opcode| opcode.mnemonic())
            .unwrap_or(UNKNOWN_MNEMONIC)
    }

    pub fn operand(&self) -> Option<Operand> {
        self.operand
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        1 + self.operand.map_or(0, |operand| operand.width())
    }

    /// Appends the opcode byte and immediate to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode);
        if let Some(operand) = self.operand {
            operand.encode(out);
        }
    }

    /// Runs this instruction against `ctx` through the global registry.
    pub fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), VMError> {
        registry().execute(ctx, self)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.opcode(), self.operand) {
            (None, _) => write!(f, "{UNKNOWN_MNEMONIC} 0x{:02x}", self.opcode),
            (Some(opcode), Some(operand)) => write!(f, "{} {operand}", opcode.mnemonic()),
            (Some(opcode), None) => f.write_str(opcode.mnemonic()),
        }
    }
}

/// Opcode byte to handler table.
pub struct Registry {
    table: [Option<OpcodeInfo>; 256],
}

macro_rules! register_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => $handler:ident, $width:literal
        ),* $(,)?
    ) => {{
        let mut registry = Registry::empty();
        $( registry.register(Opcode::$name, ops::$handler)?; )*
        registry
    }};
}

impl Registry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self { table: [None; 256] }
    }

    /// Every opcode of the instruction set with its handler.
    pub fn standard() -> Result<Self, VMError> {
        Ok(crate::for_each_instruction!(register_opcodes))
    }

    /// Registers `opcode`. A byte can only be registered once.
    pub fn register(&mut self, opcode: Opcode, execute: ExecFn) -> Result<(), VMError> {
        let slot = &mut self.table[opcode.byte() as usize];
        if let Some(existing) = slot {
            return Err(VMError::DuplicateOpcode {
                opcode: opcode.byte(),
                existing: existing.mnemonic(),
                mnemonic: opcode.mnemonic(),
            });
        }
        *slot = Some(OpcodeInfo { opcode, execute });
        Ok(())
    }

    pub fn get(&self, byte: u8) -> Option<&OpcodeInfo> {
        self.table[byte as usize].as_ref()
    }

    /// Case-sensitive lookup by mnemonic.
    pub fn lookup(&self, mnemonic: &str) -> Option<&OpcodeInfo> {
        Opcode::from_mnemonic(mnemonic).and_then(|opcode| self.get(opcode.byte()))
    }

    /// Number of registered opcodes.
    pub fn len(&self) -> usize {
        self.table.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered entries in byte order.
    pub fn iter(&self) -> impl Iterator<Item = &OpcodeInfo> {
        self.table.iter().flatten()
    }

    /// Decodes the instruction at `pc`.
    pub fn decode(&self, code: &[u8], pc: usize, mode: DecodeMode) -> Result<Decoded, VMError> {
        let Some(&byte) = code.get(pc) else {
            return Ok(Decoded {
                instruction: Instruction::new(Opcode::Stop),
                next_pc: pc,
                truncated: false,
            });
        };
        let Some(info) = self.get(byte) else {
            return match mode {
                DecodeMode::Execute => Err(VMError::UnknownOpcode {
                    opcode: byte,
                    offset: pc,
                }),
                DecodeMode::Disassemble => Ok(Decoded {
                    instruction: Instruction::unknown(byte),
                    next_pc: pc + 1,
                    truncated: false,
                }),
            };
        };

        let width = info.operand_width();
        if width == 0 {
            return Ok(Decoded {
                instruction: Instruction::new(info.opcode),
                next_pc: pc + 1,
                truncated: false,
            });
        }

        let start = pc + 1;
        let end = start.saturating_add(width).min(code.len());
        let available = &code[start..end];
        Ok(Decoded {
            instruction: Instruction {
                opcode: byte,
                operand: Some(Operand::from_code(width, available)),
            },
            next_pc: end,
            truncated: available.len() < width,
        })
    }

    /// Dispatches `instruction` to its handler.
    pub fn execute(
        &self,
        ctx: &mut ExecutionContext,
        instruction: &Instruction,
    ) -> Result<(), VMError> {
        let info = self
            .get(instruction.byte())
            .ok_or(VMError::UnknownOpcode {
                opcode: instruction.byte(),
                offset: ctx.instruction_pc(),
            })?;
        (info.execute)(ctx, instruction)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|info| info.mnemonic()))
            .finish()
    }
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| match Registry::standard() {
    Ok(registry) => registry,
    Err(err) => panic!("instruction table is inconsistent: {err}"),
});

/// The process-wide registry of the standard instruction set.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::isa::PUSH32_OPCODE;

    fn decode(code: &[u8], pc: usize) -> Decoded {
        registry()
            .decode(code, pc, DecodeMode::Execute)
            .expect("decode failed")
    }

    #[test]
    fn standard_registers_every_opcode() {
        assert_eq!(registry().len(), Opcode::ALL.len());
        for opcode in Opcode::ALL {
            let info = registry().get(opcode.byte()).expect("missing opcode");
            assert_eq!(info.mnemonic(), opcode.mnemonic());
        }
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = Registry::empty();
        registry.register(Opcode::Add, ops::op_add).unwrap();
        let err = registry.register(Opcode::Add, ops::op_add).unwrap_err();
        assert!(matches!(
            err,
            VMError::DuplicateOpcode {
                opcode: 0x01,
                existing: "ADD",
                ..
            }
        ));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert_eq!(registry().lookup("PUSH2").unwrap().operand_width(), 2);
        assert!(registry().lookup("push2").is_none());
        assert!(registry().lookup("NOPE").is_none());
    }

    #[test]
    fn decode_simple() {
        let decoded = decode(&[0x01], 0);
        assert_eq!(decoded.instruction.mnemonic(), "ADD");
        assert_eq!(decoded.next_pc, 1);
        assert!(!decoded.truncated);
    }

    #[test]
    fn decode_push_immediate() {
        let decoded = decode(&[0x61, 0x42, 0x43, 0x00], 0);
        assert_eq!(decoded.instruction.to_string(), "PUSH2 0x4243");
        assert_eq!(decoded.next_pc, 3);
    }

    #[test]
    fn decode_past_end_is_stop() {
        let decoded = decode(&[0x01], 1);
        assert_eq!(decoded.instruction.opcode(), Some(Opcode::Stop));
        assert_eq!(decoded.next_pc, 1);
        assert_eq!(decode(&[], 0).instruction.mnemonic(), "STOP");
    }

    #[test]
    fn decode_truncated_push_pads_right() {
        let decoded = decode(&[0x61, 0x42], 0);
        assert!(decoded.truncated);
        assert_eq!(decoded.next_pc, 2);
        let operand = decoded.instruction.operand().unwrap();
        assert_eq!(operand.value(), Word::from(0x4200u64));
    }

    #[test]
    fn decode_unknown_by_mode() {
        let err = registry()
            .decode(&[0x00, 0x0c], 1, DecodeMode::Execute)
            .unwrap_err();
        assert!(matches!(
            err,
            VMError::UnknownOpcode {
                opcode: 0x0c,
                offset: 1
            }
        ));

        let decoded = registry()
            .decode(&[0x0c], 0, DecodeMode::Disassemble)
            .unwrap();
        assert_eq!(decoded.instruction.to_string(), "UNKNOWN 0x0c");
        assert_eq!(decoded.next_pc, 1);
    }

    #[test]
    fn push_picks_minimal_width() {
        assert_eq!(Instruction::push(Word::ZERO).to_string(), "PUSH1 0x00");
        assert_eq!(Instruction::push(Word::from(0x0100u64)).to_string(), "PUSH2 0x0100");
        let max = Instruction::push(Word::MAX);
        assert_eq!(max.byte(), PUSH32_OPCODE);
        assert_eq!(max.size(), 33);
    }

    #[test]
    fn with_operand_checks_width() {
        let operand = Operand::new(2, Word::from(1u64)).unwrap();
        let instruction = Instruction::with_operand(Opcode::Push2, operand).unwrap();
        let mut out = Vec::new();
        instruction.encode(&mut out);
        assert_eq!(out, vec![0x61, 0x00, 0x01]);
        assert!(Instruction::with_operand(Opcode::Push3, operand).is_err());
        assert!(Instruction::with_operand(Opcode::Add, operand).is_err());
    }
}
