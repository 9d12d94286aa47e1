//! Assembly to bytecode.
//!
//! [`assemble`] concatenates a sequence of [`AsmItem`]s into one byte buffer.
//! Text items use the disassembler's line grammar, so
//! `assemble_text(&disassemble_to_string(code))` reproduces `code` exactly.
//!
//! # Syntax
//!
//! ```text
//! [XXXX:] MNEMONIC [0xIMMEDIATE]  # optional comment
//! [XXXX:] DATA 0xBYTES
//! [XXXX:] UNKNOWN 0xBYTE
//! ```
//!
//! - The `XXXX:` offset prefix is optional and not checked against the position
//! - Mnemonics are case-sensitive and uppercase
//! - Immediates are `0x` followed by two hex digits per byte
//! - A push immediate shorter than the push width is left-padded with zeros,
//!   unless the line ends in `# truncated`, in which case the bytes are
//!   emitted as written
//! - Comments start with `#`, blank lines are ignored

use crate::error;
use crate::types::word::{self, Word};
use crate::virtual_machine::disassembler::{DATA_MNEMONIC, TRUNCATED_MARKER};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::operand::parse_hex_bytes;
use crate::virtual_machine::registry::{Instruction, UNKNOWN_MNEMONIC, registry};
use std::fmt::Write;

const COMMENT_CHAR: char = '#';
const OFFSET_SUFFIX: char = ':';

/// One element of an assembly sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmItem<'a> {
    /// Opcode byte plus immediate at its declared width.
    Instruction(Instruction),
    /// Minimal big-endian encoding of the value, at least one byte.
    Literal(Word),
    /// The bare opcode byte, without any immediate.
    Opcode(Opcode),
    /// Disassembly text, one instruction per line.
    Text(&'a str),
}

impl From<Instruction> for AsmItem<'_> {
    fn from(instruction: Instruction) -> Self {
        AsmItem::Instruction(instruction)
    }
}

impl From<Opcode> for AsmItem<'_> {
    fn from(opcode: Opcode) -> Self {
        AsmItem::Opcode(opcode)
    }
}

impl From<Word> for AsmItem<'_> {
    fn from(value: Word) -> Self {
        AsmItem::Literal(value)
    }
}

impl From<u64> for AsmItem<'_> {
    fn from(value: u64) -> Self {
        AsmItem::Literal(Word::from(value))
    }
}

impl<'a> From<&'a str> for AsmItem<'a> {
    fn from(text: &'a str) -> Self {
        AsmItem::Text(text)
    }
}

/// Assembles `items` into a single contiguous buffer.
pub fn assemble<'a>(items: impl IntoIterator<Item = AsmItem<'a>>) -> Result<Vec<u8>, VMError> {
    let mut out = Vec::new();
    for item in items {
        match item {
            AsmItem::Instruction(instruction) => instruction.encode(&mut out),
            AsmItem::Literal(value) => out.extend_from_slice(&word::minimal_be_bytes(value)),
            AsmItem::Opcode(opcode) => out.push(opcode.byte()),
            AsmItem::Text(text) => assemble_lines(text, &mut out)?,
        }
    }
    Ok(out)
}

/// Assembles disassembly text, logging a diagnostic on failure.
pub fn assemble_text(source: &str) -> Result<Vec<u8>, VMError> {
    assemble_text_with_name(source, "<source>")
}

/// Like [`assemble_text`] with a file name for the diagnostic.
pub fn assemble_text_with_name(source: &str, source_name: &str) -> Result<Vec<u8>, VMError> {
    let mut out = Vec::new();
    let result = assemble_lines(source, &mut out);
    if let Err(err) = &result {
        log_assembly_error(source_name, source, err);
    }
    result.map(|()| out)
}

/// Return the line/column/message triple for located errors.
fn assembly_error_location(err: &VMError) -> Option<(usize, usize, String)> {
    match err {
        VMError::AssemblyError {
            line,
            column,
            source,
        } => Some((*line, *column, source.to_string())),
        _ => None,
    }
}

/// Formats a compiler-style diagnostic for assembly failures.
fn render_assembly_diagnostic(
    file: &str,
    source: &str,
    line: usize,
    column: usize,
    message: &str,
) -> String {
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}:{column}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let underline = " ".repeat(column.saturating_sub(1));
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, line_text);
        let _ = writeln!(diag, "  | {}^", underline);
    }

    diag
}

fn log_assembly_error(file: &str, source: &str, err: &VMError) {
    match assembly_error_location(err) {
        Some((line, column, message)) => {
            error!(
                "{}",
                render_assembly_diagnostic(file, source, line, column, &message)
            )
        }
        None => error!("{err}"),
    }
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    /// 1-based column in the line.
    column: usize,
}

/// Tokens of one line and its trailing comment, if any.
#[derive(Debug)]
struct Line<'a> {
    tokens: Vec<Token<'a>>,
    comment: Option<&'a str>,
}

/// Splits a line on whitespace. `#` starts a comment that runs to the end.
fn tokenize(line: &str) -> Line<'_> {
    let (code, comment) = match line.find(COMMENT_CHAR) {
        Some(i) => (&line[..i], Some(line[i + 1..].trim())),
        None => (line, None),
    };

    let mut tokens = Vec::with_capacity(3);
    let mut start: Option<usize> = None;
    for (i, c) in code.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                tokens.push(Token {
                    text: &code[s..i],
                    column: s + 1,
                });
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push(Token {
            text: &code[s..],
            column: s + 1,
        });
    }

    Line { tokens, comment }
}

/// Checks for a `0000:` style offset token.
fn is_offset_prefix(tok: &str) -> bool {
    tok.strip_suffix(OFFSET_SUFFIX)
        .is_some_and(|hex| !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn located(line: usize, column: usize, err: VMError) -> VMError {
    VMError::AssemblyError {
        line,
        column,
        source: Box::new(err),
    }
}

fn assemble_lines(source: &str, out: &mut Vec<u8>) -> Result<(), VMError> {
    for (line_no, raw) in source.lines().enumerate() {
        let line = tokenize(raw);
        let mut tokens = line.tokens.as_slice();
        if let [first, rest @ ..] = tokens
            && is_offset_prefix(first.text)
        {
            tokens = rest;
        }
        let Some((mnemonic, rest)) = tokens.split_first() else {
            continue;
        };
        let truncated = line.comment == Some(TRUNCATED_MARKER);
        assemble_line(mnemonic, rest, truncated, out)
            .map_err(|(column, err)| located(line_no + 1, column, err))?;
    }
    Ok(())
}

/// Encodes one instruction line. Errors carry the column of the offending token.
fn assemble_line(
    mnemonic: &Token<'_>,
    operands: &[Token<'_>],
    truncated: bool,
    out: &mut Vec<u8>,
) -> Result<(), (usize, VMError)> {
    if let Some(extra) = operands.get(1) {
        return Err((
            extra.column,
            VMError::InvalidOperand {
                operand: extra.text.to_string(),
                reason: "unexpected token after operand",
            },
        ));
    }
    let operand = operands.first();
    let parse = |tok: &Token<'_>| parse_hex_bytes(tok.text).map_err(|err| (tok.column, err));
    let missing = |reason| {
        (
            mnemonic.column,
            VMError::InvalidOperand {
                operand: mnemonic.text.to_string(),
                reason,
            },
        )
    };

    match mnemonic.text {
        DATA_MNEMONIC => {
            let tok = operand.ok_or_else(|| missing("DATA needs a hex operand"))?;
            out.extend(parse(tok)?);
            return Ok(());
        }
        UNKNOWN_MNEMONIC => {
            let tok = operand.ok_or_else(|| missing("UNKNOWN needs a one-byte operand"))?;
            let bytes = parse(tok)?;
            if bytes.len() != 1 {
                return Err((
                    tok.column,
                    VMError::InvalidOperand {
                        operand: tok.text.to_string(),
                        reason: "UNKNOWN takes exactly one byte",
                    },
                ));
            }
            out.extend(bytes);
            return Ok(());
        }
        _ => {}
    }

    let info = registry().lookup(mnemonic.text).ok_or_else(|| {
        (
            mnemonic.column,
            VMError::UnknownMnemonic {
                mnemonic: mnemonic.text.to_string(),
            },
        )
    })?;
    let width = info.operand_width();

    match (width, operand) {
        (0, None) => out.push(info.opcode.byte()),
        (0, Some(tok)) => {
            return Err((
                tok.column,
                VMError::InvalidOperand {
                    operand: tok.text.to_string(),
                    reason: "instruction takes no operand",
                },
            ));
        }
        (_, None) => return Err(missing("push needs a hex operand")),
        (_, Some(tok)) => {
            let bytes = if truncated && tok.text == "0x" {
                Vec::new()
            } else {
                parse(tok)?
            };
            if bytes.len() > width {
                return Err((
                    tok.column,
                    VMError::InvalidOperand {
                        operand: tok.text.to_string(),
                        reason: "operand is wider than the push",
                    },
                ));
            }
            out.push(info.opcode.byte());
            if !truncated {
                out.resize(out.len() + width - bytes.len(), 0);
            }
            out.extend(bytes);
        }
    }
    Ok(())
}
