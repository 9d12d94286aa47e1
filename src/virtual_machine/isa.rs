//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical opcode table and invokes a callback macro for code generation.
//! [`define_opcodes!`](crate::define_opcodes) turns it into the [`Opcode`] enum
//! here, and the registry builds its dispatch table from the same list, so
//! opcode bytes, mnemonics, operand widths and handlers cannot drift apart.
//!
//! # Bytecode Format
//!
//! - Opcode: 1 byte
//! - `PUSH1`..`PUSH32`: followed by a 1 to 32 byte big-endian immediate
//! - Everything else: no immediate
//!
//! Each entry reads `Name = opcode, "MNEMONIC" => handler, immediate_width`.

use crate::virtual_machine::errors::VMError;

/// First opcode of the contiguous push range.
pub const PUSH1_OPCODE: u8 = 0x60;
/// Last opcode of the contiguous push range.
pub const PUSH32_OPCODE: u8 = 0x7F;
/// Byte value of the only valid jump target.
pub const JUMPDEST_OPCODE: u8 = 0x5B;

/// Immediate width of a raw byte when it is a push opcode, else `None`.
///
/// Works on unregistered bytes too, so code scans never depend on the registry.
pub const fn push_width(byte: u8) -> Option<usize> {
    if byte >= PUSH1_OPCODE && byte <= PUSH32_OPCODE {
        Some((byte - PUSH1_OPCODE) as usize + 1)
    } else {
        None
    }
}

/// Invokes a callback macro with the complete opcode table.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Stop and Arithmetic
            // =========================
            /// STOP ; halt successfully with empty return data
            Stop = 0x00, "STOP" => op_stop, 0,
            /// ADD a, b ; a + b
            Add = 0x01, "ADD" => op_add, 0,
            /// MUL a, b ; a * b
            Mul = 0x02, "MUL" => op_mul, 0,
            /// SUB a, b ; a - b
            Sub = 0x03, "SUB" => op_sub, 0,
            /// DIV a, b ; a / b, 0 when b == 0
            Div = 0x04, "DIV" => op_div, 0,
            /// SDIV a, b ; signed a / b truncated toward zero
            Sdiv = 0x05, "SDIV" => op_sdiv, 0,
            /// MOD a, b ; a % b, 0 when b == 0
            Mod = 0x06, "MOD" => op_mod, 0,
            /// SMOD a, b ; signed a % b with the sign of a
            Smod = 0x07, "SMOD" => op_smod, 0,
            /// ADDMOD a, b, m ; (a + b) % m, 0 when m == 0
            Addmod = 0x08, "ADDMOD" => op_addmod, 0,
            /// MULMOD a, b, m ; (a * b) % m, 0 when m == 0
            Mulmod = 0x09, "MULMOD" => op_mulmod, 0,
            /// EXP a, b ; a ** b
            Exp = 0x0A, "EXP" => op_exp, 0,
            /// SIGNEXTEND b, x ; sign-extend x from (b + 1) bytes
            Signextend = 0x0B, "SIGNEXTEND" => op_signextend, 0,
            // =========================
            // Comparison and Bitwise
            // =========================
            /// LT a, b ; a < b
            Lt = 0x10, "LT" => op_lt, 0,
            /// GT a, b ; a > b
            Gt = 0x11, "GT" => op_gt, 0,
            /// SLT a, b ; signed a < b
            Slt = 0x12, "SLT" => op_slt, 0,
            /// SGT a, b ; signed a > b
            Sgt = 0x13, "SGT" => op_sgt, 0,
            /// EQ a, b ; a == b
            Eq = 0x14, "EQ" => op_eq, 0,
            /// ISZERO a ; a == 0
            IsZero = 0x15, "ISZERO" => op_iszero, 0,
            /// AND a, b ; a & b
            And = 0x16, "AND" => op_and, 0,
            /// OR a, b ; a | b
            Or = 0x17, "OR" => op_or, 0,
            /// XOR a, b ; a ^ b
            Xor = 0x18, "XOR" => op_xor, 0,
            /// NOT a ; !a
            Not = 0x19, "NOT" => op_not, 0,
            /// BYTE i, x ; i-th byte of x from the most significant end
            Byte = 0x1A, "BYTE" => op_byte, 0,
            /// SHL shift, value ; value << shift
            Shl = 0x1B, "SHL" => op_shl, 0,
            /// SHR shift, value ; value >> shift
            Shr = 0x1C, "SHR" => op_shr, 0,
            /// SAR shift, value ; arithmetic value >> shift
            Sar = 0x1D, "SAR" => op_sar, 0,
            // =========================
            // Hashing
            // =========================
            /// SHA3 offset, length ; keccak256(memory[offset..offset + length])
            Sha3 = 0x20, "SHA3" => op_sha3, 0,
            // =========================
            // Environment
            // =========================
            /// CALLVALUE ; always 0, no value is transferred
            CallValue = 0x34, "CALLVALUE" => op_callvalue, 0,
            /// CALLDATALOAD offset ; 32 calldata bytes at offset, zero-padded
            CallDataLoad = 0x35, "CALLDATALOAD" => op_calldataload, 0,
            /// CALLDATASIZE ; calldata length in bytes
            CallDataSize = 0x36, "CALLDATASIZE" => op_calldatasize, 0,
            /// CALLDATACOPY dest, offset, size ; memory[dest..] = calldata[offset..offset + size]
            CallDataCopy = 0x37, "CALLDATACOPY" => op_calldatacopy, 0,
            /// CODESIZE ; code length in bytes
            CodeSize = 0x38, "CODESIZE" => op_codesize, 0,
            /// CODECOPY dest, offset, size ; memory[dest..] = code[offset..offset + size]
            CodeCopy = 0x39, "CODECOPY" => op_codecopy, 0,
            // =========================
            // Stack, Memory, Storage and Flow
            // =========================
            /// POP a ; discard a
            Pop = 0x50, "POP" => op_pop, 0,
            /// MLOAD offset ; memory word at offset
            MLoad = 0x51, "MLOAD" => op_mload, 0,
            /// MSTORE offset, value ; memory word at offset = value
            MStore = 0x52, "MSTORE" => op_mstore, 0,
            /// MSTORE8 offset, value ; memory byte at offset = value & 0xff
            MStore8 = 0x53, "MSTORE8" => op_mstore8, 0,
            /// SLOAD key ; storage[key]
            SLoad = 0x54, "SLOAD" => op_sload, 0,
            /// SSTORE key, value ; storage[key] = value
            SStore = 0x55, "SSTORE" => op_sstore, 0,
            /// JUMP target ; pc = target, which must be a JUMPDEST
            Jump = 0x56, "JUMP" => op_jump, 0,
            /// JUMPI target, cond ; pc = target when cond != 0
            JumpI = 0x57, "JUMPI" => op_jumpi, 0,
            /// PC ; offset of this instruction
            Pc = 0x58, "PC" => op_pc, 0,
            /// MSIZE ; 32 * active memory words
            MSize = 0x59, "MSIZE" => op_msize, 0,
            /// JUMPDEST ; marks a valid jump target, no effect
            JumpDest = 0x5B, "JUMPDEST" => op_jumpdest, 0,
            // =========================
            // Push
            // =========================
            /// PUSH1 imm ; push 1-byte immediate
            Push1 = 0x60, "PUSH1" => op_push, 1,
            /// PUSH2 imm ; push 2-byte immediate
            Push2 = 0x61, "PUSH2" => op_push, 2,
            /// PUSH3 imm ; push 3-byte immediate
            Push3 = 0x62, "PUSH3" => op_push, 3,
            /// PUSH4 imm ; push 4-byte immediate
            Push4 = 0x63, "PUSH4" => op_push, 4,
            /// PUSH5 imm ; push 5-byte immediate
            Push5 = 0x64, "PUSH5" => op_push, 5,
            /// PUSH6 imm ; push 6-byte immediate
            Push6 = 0x65, "PUSH6" => op_push, 6,
            /// PUSH7 imm ; push 7-byte immediate
            Push7 = 0x66, "PUSH7" => op_push, 7,
            /// PUSH8 imm ; push 8-byte immediate
            Push8 = 0x67, "PUSH8" => op_push, 8,
            /// PUSH9 imm ; push 9-byte immediate
            Push9 = 0x68, "PUSH9" => op_push, 9,
            /// PUSH10 imm ; push 10-byte immediate
            Push10 = 0x69, "PUSH10" => op_push, 10,
            /// PUSH11 imm ; push 11-byte immediate
            Push11 = 0x6A, "PUSH11" => op_push, 11,
            /// PUSH12 imm ; push 12-byte immediate
            Push12 = 0x6B, "PUSH12" => op_push, 12,
            /// PUSH13 imm ; push 13-byte immediate
            Push13 = 0x6C, "PUSH13" => op_push, 13,
            /// PUSH14 imm ; push 14-byte immediate
            Push14 = 0x6D, "PUSH14" => op_push, 14,
            /// PUSH15 imm ; push 15-byte immediate
            Push15 = 0x6E, "PUSH15" => op_push, 15,
            /// PUSH16 imm ; push 16-byte immediate
            Push16 = 0x6F, "PUSH16" => op_push, 16,
            /// PUSH17 imm ; push 17-byte immediate
            Push17 = 0x70, "PUSH17" => op_push, 17,
            /// PUSH18 imm ; push 18-byte immediate
            Push18 = 0x71, "PUSH18" => op_push, 18,
            /// PUSH19 imm ; push 19-byte immediate
            Push19 = 0x72, "PUSH19" => op_push, 19,
            /// PUSH20 imm ; push 20-byte immediate
            Push20 = 0x73, "PUSH20" => op_push, 20,
            /// PUSH21 imm ; push 21-byte immediate
            Push21 = 0x74, "PUSH21" => op_push, 21,
            /// PUSH22 imm ; push 22-byte immediate
            Push22 = 0x75, "PUSH22" => op_push, 22,
            /// PUSH23 imm ; push 23-byte immediate
            Push23 = 0x76, "PUSH23" => op_push, 23,
            /// PUSH24 imm ; push 24-byte immediate
            Push24 = 0x77, "PUSH24" => op_push, 24,
            /// PUSH25 imm ; push 25-byte immediate
            Push25 = 0x78, "PUSH25" => op_push, 25,
            /// PUSH26 imm ; push 26-byte immediate
            Push26 = 0x79, "PUSH26" => op_push, 26,
            /// PUSH27 imm ; push 27-byte immediate
            Push27 = 0x7A, "PUSH27" => op_push, 27,
            /// PUSH28 imm ; push 28-byte immediate
            Push28 = 0x7B, "PUSH28" => op_push, 28,
            /// PUSH29 imm ; push 29-byte immediate
            Push29 = 0x7C, "PUSH29" => op_push, 29,
            /// PUSH30 imm ; push 30-byte immediate
            Push30 = 0x7D, "PUSH30" => op_push, 30,
            /// PUSH31 imm ; push 31-byte immediate
            Push31 = 0x7E, "PUSH31" => op_push, 31,
            /// PUSH32 imm ; push 32-byte immediate
            Push32 = 0x7F, "PUSH32" => op_push, 32,
            // =========================
            // Dup
            // =========================
            /// DUP1 ; push a copy of stack item 1
            Dup1 = 0x80, "DUP1" => op_dup, 0,
            /// DUP2 ; push a copy of stack item 2
            Dup2 = 0x81, "DUP2" => op_dup, 0,
            /// DUP3 ; push a copy of stack item 3
            Dup3 = 0x82, "DUP3" => op_dup, 0,
            /// DUP4 ; push a copy of stack item 4
            Dup4 = 0x83, "DUP4" => op_dup, 0,
            /// DUP5 ; push a copy of stack item 5
            Dup5 = 0x84, "DUP5" => op_dup, 0,
            /// DUP6 ; push a copy of stack item 6
            Dup6 = 0x85, "DUP6" => op_dup, 0,
            /// DUP7 ; push a copy of stack item 7
            Dup7 = 0x86, "DUP7" => op_dup, 0,
            /// DUP8 ; push a copy of stack item 8
            Dup8 = 0x87, "DUP8" => op_dup, 0,
            /// DUP9 ; push a copy of stack item 9
            Dup9 = 0x88, "DUP9" => op_dup, 0,
            /// DUP10 ; push a copy of stack item 10
            Dup10 = 0x89, "DUP10" => op_dup, 0,
            /// DUP11 ; push a copy of stack item 11
            Dup11 = 0x8A, "DUP11" => op_dup, 0,
            /// DUP12 ; push a copy of stack item 12
            Dup12 = 0x8B, "DUP12" => op_dup, 0,
            /// DUP13 ; push a copy of stack item 13
            Dup13 = 0x8C, "DUP13" => op_dup, 0,
            /// DUP14 ; push a copy of stack item 14
            Dup14 = 0x8D, "DUP14" => op_dup, 0,
            /// DUP15 ; push a copy of stack item 15
            Dup15 = 0x8E, "DUP15" => op_dup, 0,
            /// DUP16 ; push a copy of stack item 16
            Dup16 = 0x8F, "DUP16" => op_dup, 0,
            // =========================
            // Swap
            // =========================
            /// SWAP1 ; exchange the top with stack item 2
            Swap1 = 0x90, "SWAP1" => op_swap, 0,
            /// SWAP2 ; exchange the top with stack item 3
            Swap2 = 0x91, "SWAP2" => op_swap, 0,
            /// SWAP3 ; exchange the top with stack item 4
            Swap3 = 0x92, "SWAP3" => op_swap, 0,
            /// SWAP4 ; exchange the top with stack item 5
            Swap4 = 0x93, "SWAP4" => op_swap, 0,
            /// SWAP5 ; exchange the top with stack item 6
            Swap5 = 0x94, "SWAP5" => op_swap, 0,
            /// SWAP6 ; exchange the top with stack item 7
            Swap6 = 0x95, "SWAP6" => op_swap, 0,
            /// SWAP7 ; exchange the top with stack item 8
            Swap7 = 0x96, "SWAP7" => op_swap, 0,
            /// SWAP8 ; exchange the top with stack item 9
            Swap8 = 0x97, "SWAP8" => op_swap, 0,
            /// SWAP9 ; exchange the top with stack item 10
            Swap9 = 0x98, "SWAP9" => op_swap, 0,
            /// SWAP10 ; exchange the top with stack item 11
            Swap10 = 0x99, "SWAP10" => op_swap, 0,
            /// SWAP11 ; exchange the top with stack item 12
            Swap11 = 0x9A, "SWAP11" => op_swap, 0,
            /// SWAP12 ; exchange the top with stack item 13
            Swap12 = 0x9B, "SWAP12" => op_swap, 0,
            /// SWAP13 ; exchange the top with stack item 14
            Swap13 = 0x9C, "SWAP13" => op_swap, 0,
            /// SWAP14 ; exchange the top with stack item 15
            Swap14 = 0x9D, "SWAP14" => op_swap, 0,
            /// SWAP15 ; exchange the top with stack item 16
            Swap15 = 0x9E, "SWAP15" => op_swap, 0,
            /// SWAP16 ; exchange the top with stack item 17
            Swap16 = 0x9F, "SWAP16" => op_swap, 0,
            // =========================
            // Termination
            // =========================
            /// RETURN offset, length ; halt successfully with memory[offset..offset + length]
            Return = 0xF3, "RETURN" => op_return, 0,
            /// REVERT offset, length ; halt with failure and memory[offset..offset + length]
            Revert = 0xFD, "REVERT" => op_revert, 0,
            /// INVALID ; halt with failure
            Invalid = 0xFE, "INVALID" => op_invalid, 0,
            /// SELFDESTRUCT beneficiary ; halt successfully
            SelfDestruct = 0xFF, "SELFDESTRUCT" => op_selfdestruct, 0,
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => $handler:ident, $width:literal
        ),* $(,)?
    ) => {
        /// One-byte operation selector.
        #[repr(u8)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for Opcode {
            type Error = VMError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Opcode::$name), )*
                    _ => Err(VMError::UnknownOpcode {
                        opcode: value,
                        offset: 0,
                    }),
                }
            }
        }

        impl Opcode {
            /// Every defined opcode in ascending byte order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Width in bytes of the immediate that follows the opcode.
            pub const fn operand_width(&self) -> usize {
                match self {
                    $( Opcode::$name => $width, )*
                }
            }

            /// Looks up an opcode by its exact mnemonic.
            pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
                match mnemonic {
                    $( $mnemonic => Some(Opcode::$name), )*
                    _ => None,
                }
            }
        }
    };
}

for_each_instruction!(define_opcodes);

impl Opcode {
    /// Opcode byte.
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Returns true for `PUSH1`..`PUSH32`.
    pub const fn is_push(self) -> bool {
        push_width(self as u8).is_some()
    }

    /// Returns true when the instruction always ends straight-line execution.
    ///
    /// The disassembler treats bytes after these as data until a `JUMPDEST`.
    pub const fn is_terminating(self) -> bool {
        matches!(
            self,
            Opcode::Stop
                | Opcode::Jump
                | Opcode::Return
                | Opcode::Revert
                | Opcode::Invalid
        )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
