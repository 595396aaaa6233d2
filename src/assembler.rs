//! Mnemonic assembler.
//!
//! Source is line oriented. Each non-blank line holds one instruction:
//!
//! ```text
//! MOV R0 5
//! ADD R0 R1
//! NOT R2
//! LOAD R3 10
//! JUMPZ 0
//! HLT
//! ```
//!
//! `MOV` takes a register and a decimal literal. `ADD SUB MUL DIV AND OR
//! XOR` take two registers, `NOT` one. `LOAD` and `STORE` take a register
//! and a memory address. `JUMP` and `JUMPZ` take a zero-based instruction
//! index.
//!
//! The opcode token is case-insensitive, register names are not. Operands
//! are separated by whitespace; a trailing comma on an operand is accepted.
//! Literals, addresses and jump targets are not range checked here. A MOV
//! literal too wide for `i64` is folded to its value mod 256; an oversized
//! address or target saturates, so execution still rejects it.

use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;

use crate::error::{AssemblyError, AssemblyErrorKind};
use crate::isa::{Instruction, Opcode, Register};

/// What to do with a line that does not assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyMode {
    /// Fail on the first malformed line.
    #[default]
    Strict,
    /// Drop malformed lines and keep going. Dropped lines are still
    /// reported in [`Assembly::skipped`].
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Assembly {
    pub program: Vec<Instruction>,
    /// 1-based source line of each instruction in `program`.
    pub source_lines: Vec<usize>,
    /// Lines dropped in lenient mode.
    pub skipped: Vec<AssemblyError>,
}

pub fn assemble(source: &str, mode: AssemblyMode) -> Result<Assembly, AssemblyError> {
    let mut assembly = Assembly::default();

    for (index, text) in source.lines().enumerate() {
        let line = index + 1;
        match assemble_line(text) {
            Ok(None) => {}
            Ok(Some(instruction)) => {
                assembly.program.push(instruction);
                assembly.source_lines.push(line);
            }
            Err(kind) => {
                let error = AssemblyError {
                    line,
                    text: text.trim().to_string(),
                    kind,
                };
                match mode {
                    AssemblyMode::Strict => return Err(error),
                    AssemblyMode::Lenient => assembly.skipped.push(error),
                }
            }
        }
    }

    Ok(assembly)
}

/// Translate one line. Blank lines give `Ok(None)`.
pub fn assemble_line(text: &str) -> Result<Option<Instruction>, AssemblyErrorKind> {
    let mut tokens = text.split_whitespace();
    let Some(head) = tokens.next() else {
        return Ok(None);
    };
    let opcode = Opcode::from_mnemonic(head)
        .ok_or_else(|| AssemblyErrorKind::UnknownOpcode(head.to_string()))?;

    let operands: Vec<&str> = tokens.map(strip_separator).collect();
    if operands.len() != opcode.arity() {
        return Err(AssemblyErrorKind::Arity {
            opcode,
            expected: opcode.arity(),
            found: operands.len(),
        });
    }

    let instruction = match opcode {
        Opcode::Mov => Instruction::Mov(register(operands[0])?, literal(operands[1])?),
        Opcode::Load => Instruction::Load(register(operands[0])?, integer(operands[1])?),
        Opcode::Store => Instruction::Store(register(operands[0])?, integer(operands[1])?),
        Opcode::Add => Instruction::Add(register(operands[0])?, register(operands[1])?),
        Opcode::Sub => Instruction::Sub(register(operands[0])?, register(operands[1])?),
        Opcode::Mul => Instruction::Mul(register(operands[0])?, register(operands[1])?),
        Opcode::Div => Instruction::Div(register(operands[0])?, register(operands[1])?),
        Opcode::And => Instruction::And(register(operands[0])?, register(operands[1])?),
        Opcode::Or => Instruction::Or(register(operands[0])?, register(operands[1])?),
        Opcode::Xor => Instruction::Xor(register(operands[0])?, register(operands[1])?),
        Opcode::Not => Instruction::Not(register(operands[0])?),
        Opcode::Jump => Instruction::Jump(integer(operands[0])?),
        Opcode::JumpZ => Instruction::JumpZ(integer(operands[0])?),
        Opcode::Hlt => Instruction::Hlt,
    };
    Ok(Some(instruction))
}

fn strip_separator(token: &str) -> &str {
    token.strip_suffix(',').unwrap_or(token)
}

fn register(token: &str) -> Result<Register, AssemblyErrorKind> {
    Register::from_name(token).ok_or_else(|| AssemblyErrorKind::UnknownRegister(token.to_string()))
}

// Addresses and jump targets
fn integer(token: &str) -> Result<i64, AssemblyErrorKind> {
    token.parse::<i64>().or_else(|e| match e.kind() {
        IntErrorKind::PosOverflow => Ok(i64::MAX),
        IntErrorKind::NegOverflow => Ok(i64::MIN),
        _ => Err(AssemblyErrorKind::InvalidInteger(token.to_string())),
    })
}

/// MOV literal. Only the low byte survives execution, so an overflowing
/// literal is reduced mod 256 digit by digit.
fn literal(token: &str) -> Result<i64, AssemblyErrorKind> {
    match token.parse::<i64>() {
        Ok(value) => Ok(value),
        Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
            let (negative, digits) = match token.strip_prefix('-') {
                Some(digits) => (true, digits),
                None => (false, token.strip_prefix('+').unwrap_or(token)),
            };
            // overflow is only reported for an all-digit string
            let low = digits
                .bytes()
                .fold(0i64, |acc, d| (acc * 10 + i64::from(d - b'0')) % 256);
            Ok(if negative { -low } else { low })
        }
        Err(_) => Err(AssemblyErrorKind::InvalidInteger(token.to_string())),
    }
}
