//! Packed instruction stream.
//!
//! One instruction per line: the opcode's numeric code followed by its
//! operands in numeric form, separated by single spaces. Registers are
//! written as their index.
//!
//! ```text
//! MOV R0 5   ->  1 0 5
//! ADD R0 R1  ->  4 0 1
//! JUMPZ 3    ->  9 3
//! HLT        ->  15
//! ```

use crate::error::DecodeError;
use crate::isa::{Instruction, Opcode, Register};

pub fn encode(instruction: &Instruction) -> String {
    let mut line = instruction.opcode().code().to_string();
    for operand in instruction.operands() {
        line.push(' ');
        line.push_str(&operand.to_string());
    }
    line
}

pub fn encode_program(program: &[Instruction]) -> Vec<String> {
    program.iter().map(encode).collect()
}

/// Decode a single packed line. `line` is the 1-based line number used in
/// error reports.
pub fn decode(text: &str, line: usize) -> Result<Instruction, DecodeError> {
    let mut parts = text.split_whitespace();
    let code_token = parts.next().ok_or(DecodeError::Empty { line })?;
    let opcode = code_token
        .parse::<u8>()
        .ok()
        .and_then(Opcode::from_code)
        .ok_or_else(|| DecodeError::UnknownOpcode {
            line,
            code: code_token.to_string(),
        })?;

    let operands = parts
        .map(|token| {
            token.parse::<i64>().map_err(|_| DecodeError::InvalidOperand {
                line,
                token: token.to_string(),
            })
        })
        .collect::<Result<Vec<i64>, DecodeError>>()?;

    if operands.len() != opcode.arity() {
        return Err(DecodeError::OperandCount {
            line,
            opcode,
            expected: opcode.arity(),
            found: operands.len(),
        });
    }

    let reg = |index: i64| Register::from_index(index).ok_or(DecodeError::InvalidRegister { line, index });

    let instruction = match opcode {
        Opcode::Mov => Instruction::Mov(reg(operands[0])?, operands[1]),
        Opcode::Load => Instruction::Load(reg(operands[0])?, operands[1]),
        Opcode::Store => Instruction::Store(reg(operands[0])?, operands[1]),
        Opcode::Add => Instruction::Add(reg(operands[0])?, reg(operands[1])?),
        Opcode::Sub => Instruction::Sub(reg(operands[0])?, reg(operands[1])?),
        Opcode::Mul => Instruction::Mul(reg(operands[0])?, reg(operands[1])?),
        Opcode::Div => Instruction::Div(reg(operands[0])?, reg(operands[1])?),
        Opcode::Jump => Instruction::Jump(operands[0]),
        Opcode::JumpZ => Instruction::JumpZ(operands[0]),
        Opcode::And => Instruction::And(reg(operands[0])?, reg(operands[1])?),
        Opcode::Or => Instruction::Or(reg(operands[0])?, reg(operands[1])?),
        Opcode::Not => Instruction::Not(reg(operands[0])?),
        Opcode::Xor => Instruction::Xor(reg(operands[0])?, reg(operands[1])?),
        Opcode::Hlt => Instruction::Hlt,
    };
    Ok(instruction)
}

/// Decode a whole stream. Blank lines are skipped; the first bad line
/// aborts decoding.
pub fn decode_program(stream: &str) -> Result<Vec<Instruction>, DecodeError> {
    stream
        .lines()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(index, text)| decode(text, index + 1))
        .collect()
}
