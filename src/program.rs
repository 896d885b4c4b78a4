use std::fmt::Write;

use crate::error::LoadError;

pub const LESS: u8 = b'<';
pub const GREATER: u8 = b'>';
pub const MINUS: u8 = b'-';
pub const PLUS: u8 = b'+';
pub const DOT: u8 = b'.';
pub const COMMA: u8 = b',';
pub const LBRACKET: u8 = b'[';
pub const RBRACKET: u8 = b']';

/// Marks a table slot that does not belong to a bracket.
const NO_TARGET: usize = usize::MAX;

/// Returns true if the byte is one of the eight instructions.
/// Everything else is a comment and is stripped on load.
pub fn is_instruction(byte: u8) -> bool {
    matches!(
        byte,
        LESS | GREATER | MINUS | PLUS | DOT | COMMA | LBRACKET | RBRACKET
    )
}

/// Returns true for instructions whose effect is worth pacing when a run is
/// watched step by step: pointer moves, cell arithmetic and output.
pub fn is_visible(byte: u8) -> bool {
    matches!(byte, LESS | GREATER | MINUS | PLUS | DOT)
}

/// A validated program: the stripped instruction bytes plus a bracket
/// jump table.
///
/// `jumps[i]` is the index of the bracket matching the one at `i`, and is
/// only meaningful where `code[i]` is `[` or `]`. A `Program` can only be
/// built through [`Program::parse`], so every bracket has a partner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    code: Vec<u8>,
    jumps: Vec<usize>,
}

impl Program {
    /// Strip comments from `source` and match its brackets.
    pub fn parse(source: &str) -> Result<Self, LoadError> {
        let code: Vec<u8> = source.bytes().filter(|&b| is_instruction(b)).collect();
        let jumps = build_bracket_table(&code)?;
        Ok(Self { code, jumps })
    }

    /// Number of instructions after stripping.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// The instruction bytes, comments removed.
    pub fn instructions(&self) -> &[u8] {
        &self.code
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.code.get(index).copied()
    }

    /// Index of the bracket matching the one at `index`, or `None` if
    /// `index` is not a bracket.
    pub fn jump_target(&self, index: usize) -> Option<usize> {
        match self.jumps.get(index) {
            Some(&target) if target != NO_TARGET => Some(target),
            _ => None,
        }
    }

    /// Pretty-print one instruction per line with its index, and the
    /// matching index for brackets.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (i, &op) in self.code.iter().enumerate() {
            let _ = write!(out, "{i:04}  {}", op as char);
            if let Some(target) = self.jump_target(i) {
                let _ = write!(out, "  -> {target:04}");
            }
            out.push('\n');
        }
        out
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Instruction bytes are all ASCII.
        for &op in &self.code {
            f.write_char(op as char)?;
        }
        Ok(())
    }
}

/// Build the bracket-match table for already stripped code.
///
/// Returns a Vec where `result[i]` is the index of the bracket matching the
/// one at `i`, or `NO_TARGET` for non-bracket positions.
fn build_bracket_table(code: &[u8]) -> Result<Vec<usize>, LoadError> {
    let mut table = vec![NO_TARGET; code.len()];
    let mut stack = Vec::new();

    for (i, &op) in code.iter().enumerate() {
        match op {
            LBRACKET => stack.push(i),
            RBRACKET => {
                let open = stack
                    .pop()
                    .ok_or(LoadError::UnmatchedCloseBracket { index: i })?;
                table[open] = i;
                table[i] = open;
            }
            _ => {}
        }
    }

    if let Some(&index) = stack.last() {
        return Err(LoadError::UnmatchedOpenBracket { index });
    }

    Ok(table)
}
