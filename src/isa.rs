//! Instruction set definition: opcodes, registers and decoded instructions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of general purpose registers (R0..R5).
pub const REGISTER_COUNT: usize = 6;

/// Number of cells in data memory.
pub const MEMORY_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Opcode {
    Mov = 1,
    Load = 2,
    Store = 3,
    Add = 4,
    Sub = 5,
    Mul = 6,
    Div = 7,
    Jump = 8,
    JumpZ = 9,
    And = 10,
    Or = 11,
    Not = 12,
    Xor = 13,
    // 14 is reserved
    Hlt = 15,
}

impl Opcode {
    pub const ALL: [Opcode; 14] = [
        Opcode::Mov,
        Opcode::Load,
        Opcode::Store,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Jump,
        Opcode::JumpZ,
        Opcode::And,
        Opcode::Or,
        Opcode::Not,
        Opcode::Xor,
        Opcode::Hlt,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.code() == code)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Mov => "MOV",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Jump => "JUMP",
            Opcode::JumpZ => "JUMPZ",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Not => "NOT",
            Opcode::Xor => "XOR",
            Opcode::Hlt => "HLT",
        }
    }

    /// Case-insensitive mnemonic lookup.
    pub fn from_mnemonic(token: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(token))
    }

    /// Number of operands the opcode takes.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Hlt => 0,
            Opcode::Not | Opcode::Jump | Opcode::JumpZ => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
}

impl Register {
    pub const ALL: [Register; REGISTER_COUNT] = [
        Register::R0,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Exact-match lookup of `R0`..`R5`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|reg| reg.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::R0 => "R0",
            Register::R1 => "R1",
            Register::R2 => "R2",
            Register::R3 => "R3",
            Register::R4 => "R4",
            Register::R5 => "R5",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded instruction. Operand roles are fixed by the variant.
///
/// Literals, addresses and jump targets are kept as parsed; masking and
/// bounds checks happen when the instruction executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Mov(Register, i64),
    Load(Register, i64),
    Store(Register, i64),
    Add(Register, Register),
    Sub(Register, Register),
    Mul(Register, Register),
    Div(Register, Register),
    Jump(i64),
    JumpZ(i64),
    And(Register, Register),
    Or(Register, Register),
    Not(Register),
    Xor(Register, Register),
    Hlt,
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Mov(..) => Opcode::Mov,
            Instruction::Load(..) => Opcode::Load,
            Instruction::Store(..) => Opcode::Store,
            Instruction::Add(..) => Opcode::Add,
            Instruction::Sub(..) => Opcode::Sub,
            Instruction::Mul(..) => Opcode::Mul,
            Instruction::Div(..) => Opcode::Div,
            Instruction::Jump(_) => Opcode::Jump,
            Instruction::JumpZ(_) => Opcode::JumpZ,
            Instruction::And(..) => Opcode::And,
            Instruction::Or(..) => Opcode::Or,
            Instruction::Not(_) => Opcode::Not,
            Instruction::Xor(..) => Opcode::Xor,
            Instruction::Hlt => Opcode::Hlt,
        }
    }

    /// Operands in their numeric (encoded) form, registers as indices.
    pub fn operands(&self) -> Vec<i64> {
        let reg = |r: &Register| r.index() as i64;
        match self {
            Instruction::Mov(r, v) | Instruction::Load(r, v) | Instruction::Store(r, v) => {
                vec![reg(r), *v]
            }
            Instruction::Add(a, b)
            | Instruction::Sub(a, b)
            | Instruction::Mul(a, b)
            | Instruction::Div(a, b)
            | Instruction::And(a, b)
            | Instruction::Or(a, b)
            | Instruction::Xor(a, b) => vec![reg(a), reg(b)],
            Instruction::Not(r) => vec![reg(r)],
            Instruction::Jump(target) | Instruction::JumpZ(target) => vec![*target],
            Instruction::Hlt => vec![],
        }
    }
}

/// Mnemonic form, e.g. `MOV R0 5`.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let op = self.opcode();
        match self {
            Instruction::Mov(r, v) | Instruction::Load(r, v) | Instruction::Store(r, v) => {
                write!(f, "{} {} {}", op, r, v)
            }
            Instruction::Add(a, b)
            | Instruction::Sub(a, b)
            | Instruction::Mul(a, b)
            | Instruction::Div(a, b)
            | Instruction::And(a, b)
            | Instruction::Or(a, b)
            | Instruction::Xor(a, b) => write!(f, "{} {} {}", op, a, b),
            Instruction::Not(r) => write!(f, "{} {}", op, r),
            Instruction::Jump(target) | Instruction::JumpZ(target) => write!(f, "{} {}", op, target),
            Instruction::Hlt => write!(f, "{}", op),
        }
    }
}
