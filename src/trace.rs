use serde::Serialize;
use std::fmt;

use crate::encoding::encode;
use crate::isa::{Instruction, REGISTER_COUNT};

/// One record of the execution log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEntry {
    /// An instruction completed; registers are the snapshot right after it.
    Executed {
        pc: usize,
        instruction: Instruction,
        registers: [u8; REGISTER_COUNT],
        zero_flag: bool,
    },
    /// `DIV` with a zero divisor. The destination register is left alone.
    DivisionByZero { pc: usize, instruction: Instruction },
}

impl TraceEntry {
    pub fn pc(&self) -> usize {
        match self {
            TraceEntry::Executed { pc, .. } | TraceEntry::DivisionByZero { pc, .. } => *pc,
        }
    }

    pub fn instruction(&self) -> &Instruction {
        match self {
            TraceEntry::Executed { instruction, .. }
            | TraceEntry::DivisionByZero { instruction, .. } => instruction,
        }
    }

    pub fn is_division_by_zero(&self) -> bool {
        matches!(self, TraceEntry::DivisionByZero { .. })
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TraceEntry::Executed {
                instruction,
                registers,
                ..
            } => write!(f, "Executed: {} → {:?}", encode(instruction), registers),
            TraceEntry::DivisionByZero { .. } => write!(f, "Error: Division by zero."),
        }
    }
}
