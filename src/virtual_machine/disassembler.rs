//! Bytecode to text.
//!
//! Output is one line per element, `"%04x: <text>"`, where `<text>` is an
//! instruction (`PUSH2 0x4243`), a raw data byte (`DATA 0x01`) or an
//! unregistered byte (`UNKNOWN 0xfc`).
//!
//! Disassembly starts in code mode. After a terminating instruction
//! (`STOP`, `JUMP`, `RETURN`, `REVERT`, `INVALID`, `SELFDESTRUCT`) it switches
//! to data mode, where every byte is printed as `DATA` until a `JUMPDEST`
//! opcode switches back. Data mode still walks push immediates the same way
//! jump-destination analysis does, so a `0x5b` inside push data never
//! re-enters code mode.
//!
//! The output is accepted verbatim by
//! [`assemble_text`](crate::virtual_machine::assembler::assemble_text).

use crate::virtual_machine::isa::{JUMPDEST_OPCODE, push_width};
use crate::virtual_machine::registry::{DecodeMode, Decoded, Instruction, registry};

/// Mnemonic of raw data lines.
pub const DATA_MNEMONIC: &str = "DATA";
/// Comment appended to pushes whose immediate runs past the end of code.
pub const TRUNCATED_MARKER: &str = "truncated";

/// Disassembles `code` into one line per element.
pub fn disassemble(code: &[u8]) -> Vec<String> {
    let registry = registry();
    let mut lines = Vec::new();
    let mut reading_code = true;
    let mut pc = 0;

    while pc < code.len() {
        let byte = code[pc];
        reading_code = reading_code || byte == JUMPDEST_OPCODE;

        if !reading_code {
            let end = (pc + 1 + push_width(byte).unwrap_or(0)).min(code.len());
            for (offset, data) in code[pc..end].iter().enumerate() {
                lines.push(format!("{:04x}: {DATA_MNEMONIC} 0x{data:02x}", pc + offset));
            }
            pc = end;
            continue;
        }

        let decoded = registry
            .decode(code, pc, DecodeMode::Disassemble)
            .unwrap_or(Decoded {
                instruction: Instruction::unknown(byte),
                next_pc: pc + 1,
                truncated: false,
            });
        let text = if decoded.truncated {
            format!(
                "{} 0x{} # {TRUNCATED_MARKER}",
                decoded.instruction.mnemonic(),
                hex::encode(&code[pc + 1..decoded.next_pc])
            )
        } else {
            decoded.instruction.to_string()
        };
        lines.push(format!("{pc:04x}: {text}"));

        reading_code = !decoded
            .instruction
            .opcode()
            .is_some_and(|opcode| opcode.is_terminating());
        pc = decoded.next_pc;
    }

    lines
}

/// [`disassemble`] joined with newlines.
pub fn disassemble_to_string(code: &[u8]) -> String {
    disassemble(code).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_immediate() {
        assert_eq!(disassemble(&[0x61, 0x42, 0x43]), vec!["0000: PUSH2 0x4243"]);
    }

    #[test]
    fn bytes_after_revert_are_data() {
        assert_eq!(
            disassemble(&[0xfd, 0x01, 0x02, 0x03]),
            vec![
                "0000: REVERT",
                "0001: DATA 0x01",
                "0002: DATA 0x02",
                "0003: DATA 0x03",
            ]
        );
    }

    #[test]
    fn jumpdest_returns_to_code() {
        assert_eq!(
            disassemble(&[0xfd, 0x01, 0x5b, 0x00]),
            vec!["0000: REVERT", "0001: DATA 0x01", "0002: JUMPDEST", "0003: STOP"]
        );
    }

    #[test]
    fn jumpdest_inside_data_push_stays_data() {
        // REVERT, PUSH1 0x5b, 1, 2, 3
        let lines = disassemble(&[0xfd, 0x60, 0x5b, 0x01, 0x02, 0x03]);
        assert!(lines.iter().all(|line| !line.contains("JUMPDEST")));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn jump_is_terminating() {
        assert_eq!(
            disassemble(&[0x56, 0x01]),
            vec!["0000: JUMP", "0001: DATA 0x01"]
        );
    }

    #[test]
    fn code_continues_after_selfdestruct() {
        assert_eq!(
            disassemble(&[0xff, 0x01, 0x00]),
            vec!["0000: SELFDESTRUCT", "0001: ADD", "0002: STOP"]
        );
    }

    #[test]
    fn truncated_push_in_code() {
        assert_eq!(disassemble(&[0x61, 0x42]), vec!["0000: PUSH2 0x42 # truncated"]);
        assert_eq!(disassemble(&[0x61]), vec!["0000: PUSH2 0x # truncated"]);
    }

    #[test]
    fn truncated_push_in_data() {
        assert_eq!(
            disassemble(&[0xfd, 0x01, 0x61, 0x5b]),
            vec![
                "0000: REVERT",
                "0001: DATA 0x01",
                "0002: DATA 0x61",
                "0003: DATA 0x5b",
            ]
        );
    }

    #[test]
    fn unknown_opcodes() {
        assert_eq!(
            disassemble(&[0xfc, 0x60, 0xfc, 0x00, 0xfc]),
            vec![
                "0000: UNKNOWN 0xfc",
                "0001: PUSH1 0xfc",
                "0003: STOP",
                "0004: DATA 0xfc",
            ]
        );
    }

    #[test]
    fn empty_code() {
        assert!(disassemble(&[]).is_empty());
        assert_eq!(disassemble_to_string(&[]), "");
    }

    #[test]
    fn to_string_joins_lines() {
        assert_eq!(disassemble_to_string(&[0x00, 0x5b]), "0000: STOP\n0001: JUMPDEST");
    }
}
