use serde::Serialize;
use thiserror::Error;

use crate::cpu::MachineSnapshot;
use crate::isa::{Instruction, Opcode};
use crate::trace::TraceEntry;

/// A source line the assembler could not translate.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("line {line}: {kind}")]
pub struct AssemblyError {
    /// 1-based source line number.
    pub line: usize,
    pub text: String,
    pub kind: AssemblyErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AssemblyErrorKind {
    #[error("unknown opcode `{0}`")]
    UnknownOpcode(String),
    #[error("{opcode} expects {expected} operand(s), found {found}")]
    Arity {
        opcode: Opcode,
        expected: usize,
        found: usize,
    },
    #[error("unknown register `{0}`")]
    UnknownRegister(String),
    #[error("invalid integer `{0}`")]
    InvalidInteger(String),
}

impl AssemblyErrorKind {
    /// Stable label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AssemblyErrorKind::UnknownOpcode(_) => "unknown_opcode",
            AssemblyErrorKind::Arity { .. } => "arity",
            AssemblyErrorKind::UnknownRegister(_) => "unknown_register",
            AssemblyErrorKind::InvalidInteger(_) => "invalid_integer",
        }
    }
}

/// Errors reading the packed instruction stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("line {line}: empty instruction")]
    Empty { line: usize },
    #[error("line {line}: unknown opcode value {code}")]
    UnknownOpcode { line: usize, code: String },
    #[error("line {line}: {opcode} expects {expected} operand(s), found {found}")]
    OperandCount {
        line: usize,
        opcode: Opcode,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: invalid operand `{token}`")]
    InvalidOperand { line: usize, token: String },
    #[error("line {line}: register index {index} out of range")]
    InvalidRegister { line: usize, index: i64 },
}

/// Fatal conditions that stop a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("memory address {address} out of range at pc {pc} ({instruction})")]
    MemoryOutOfBounds {
        pc: usize,
        instruction: Instruction,
        address: i64,
    },
    #[error("invalid jump target {target} at pc {pc} ({instruction})")]
    InvalidJumpTarget {
        pc: usize,
        instruction: Instruction,
        target: i64,
    },
    #[error("step limit of {limit} reached at pc {pc}")]
    StepLimitExceeded { limit: u64, pc: usize },
}

impl ExecutionError {
    pub fn pc(&self) -> usize {
        match self {
            ExecutionError::MemoryOutOfBounds { pc, .. }
            | ExecutionError::InvalidJumpTarget { pc, .. }
            | ExecutionError::StepLimitExceeded { pc, .. } => *pc,
        }
    }

    /// Stable label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionError::MemoryOutOfBounds { .. } => "memory_out_of_bounds",
            ExecutionError::InvalidJumpTarget { .. } => "invalid_jump_target",
            ExecutionError::StepLimitExceeded { .. } => "step_limit",
        }
    }
}

/// A fatal error together with everything the run produced before it.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct ExecutionFailure {
    pub error: ExecutionError,
    pub trace: Vec<TraceEntry>,
    pub state: MachineSnapshot,
    pub steps: u64,
}

/// Error type for the combined assemble-and-execute entry point.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    #[error("assembly failed: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("execution failed: {0}")]
    Execution(#[from] ExecutionFailure),
}
