//! # 6-Register 8-bit Instruction Set Simulator
//!
//! An educational register machine with a small mnemonic assembly language.
//! Source text is assembled into a program of typed instructions, which is
//! then run on a fresh machine: six 8-bit registers (`R0`..`R5`), 64 cells
//! of data memory, a program counter and a zero flag. Every completed
//! instruction appends a trace entry with the register snapshot right after
//! it.
//!
//! ## Features
//!
//! - 14 opcodes: `MOV LOAD STORE ADD SUB MUL DIV JUMP JUMPZ AND OR NOT XOR HLT`
//! - 8-bit wraparound arithmetic, `DIV` by zero logged and survived
//! - Zero flag set whenever *any* register holds 0
//! - Jumps address instructions by index and skip the trace for that step
//! - Strict or lenient (legacy, drop bad lines) assembly
//! - Step ceiling so non-terminating programs always stop
//! - Packed numeric instruction stream (`MOV R0 5` is `1 0 5`)
//! - JSON report for front ends, warp server and Prometheus metrics
//!
//! ## Example
//!
//! ```rust
//! use isa_sim::{assemble, execute, AssemblyMode, ExecConfig, StopReason};
//!
//! let source = "MOV R0 5\nMOV R1 3\nADD R0 R1\nHLT";
//! let assembly = assemble(source, AssemblyMode::Strict).unwrap();
//! let execution = execute(&assembly.program, &ExecConfig::default()).unwrap();
//!
//! assert_eq!(execution.state.registers, [8, 3, 0, 0, 0, 0]);
//! assert_eq!(execution.trace.len(), 3);
//! assert_eq!(execution.stop, StopReason::Halted);
//! ```

pub mod assembler;
pub mod config;
pub mod cpu;
pub mod encoding;
pub mod error;
pub mod isa;
pub mod memory;
pub mod metrics;
pub mod report;
pub mod server;
pub mod trace;

pub use assembler::{assemble, Assembly, AssemblyMode};
pub use config::{ExecConfig, ServerConfig};
pub use cpu::{execute, Execution, Machine, MachineSnapshot, StopReason};
pub use error::{AssemblyError, AssemblyErrorKind, DecodeError, ExecutionError, ExecutionFailure, RunError};
pub use isa::{Instruction, Opcode, Register};
pub use memory::{AddressOutOfRange, Memory};
pub use report::RunReport;
pub use trace::TraceEntry;

/// Assemble `source` and execute it in one call.
pub fn run(source: &str, mode: AssemblyMode, config: &ExecConfig) -> Result<Execution, RunError> {
    let assembly = assemble(source, mode)?;
    Ok(execute(&assembly.program, config)?)
}
