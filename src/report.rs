//! Presentation-neutral view of a run, shaped for a front end: the trace as
//! printable lines, a register listing, the non-zero memory cells and the
//! flag panel.

use serde::Serialize;
use uuid::Uuid;

use crate::assembler::{assemble, AssemblyMode};
use crate::config::ExecConfig;
use crate::cpu::{execute, Execution, MachineSnapshot, StopReason};
use crate::encoding::encode_program;
use crate::error::{AssemblyError, ExecutionFailure};
use crate::isa::REGISTER_COUNT;
use crate::trace::TraceEntry;

pub const EMPTY_MEMORY_MESSAGE: &str = "All memory cells are 0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Flags {
    pub zero: u8,
    // no instruction sets carry yet
    pub carry: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub code: String,
    /// Packed form of every assembled instruction.
    pub assembled: Vec<String>,
    /// Trace rendered one line per entry.
    pub output: Vec<String>,
    pub trace: Vec<TraceEntry>,
    /// `R<i> = <value>` lines.
    pub registers: Vec<String>,
    /// `[<address>] = <value>` for non-zero cells.
    pub memory: Vec<String>,
    pub flags: Flags,
    pub state: Option<MachineSnapshot>,
    pub steps: u64,
    pub stop: Option<StopReason>,
    pub error: Option<String>,
    /// Set when strict assembly rejected a line and nothing ran.
    pub assembly_error: Option<AssemblyError>,
    pub skipped: Vec<AssemblyError>,
}

impl RunReport {
    /// Assemble and execute `code`, capturing whatever was produced.
    pub fn build(code: &str, mode: AssemblyMode, config: &ExecConfig) -> RunReport {
        let assembly = match assemble(code, mode) {
            Ok(assembly) => assembly,
            Err(error) => return RunReport::assembly_failed(code, error),
        };

        let mut report = RunReport::empty(code);
        report.assembled = encode_program(&assembly.program);
        report.skipped = assembly.skipped;

        match execute(&assembly.program, config) {
            Ok(Execution {
                trace,
                state,
                steps,
                stop,
            }) => {
                report.fill(trace, state, steps);
                report.stop = Some(stop);
            }
            Err(ExecutionFailure {
                error,
                trace,
                state,
                steps,
            }) => {
                report.fill(trace, state, steps);
                report.error = Some(error.to_string());
            }
        }
        report
    }

    fn empty(code: &str) -> RunReport {
        let registers = [0; REGISTER_COUNT];
        RunReport {
            run_id: Uuid::new_v4(),
            code: code.to_string(),
            assembled: Vec::new(),
            output: Vec::new(),
            trace: Vec::new(),
            registers: register_lines(&registers),
            memory: vec![EMPTY_MEMORY_MESSAGE.to_string()],
            flags: flags_for(&registers),
            state: None,
            steps: 0,
            stop: None,
            error: None,
            assembly_error: None,
            skipped: Vec::new(),
        }
    }

    fn assembly_failed(code: &str, error: AssemblyError) -> RunReport {
        let mut report = RunReport::empty(code);
        report.error = Some(error.to_string());
        report.assembly_error = Some(error);
        report
    }

    fn fill(&mut self, trace: Vec<TraceEntry>, state: MachineSnapshot, steps: u64) {
        self.output = trace.iter().map(|entry| entry.to_string()).collect();
        self.trace = trace;
        self.registers = register_lines(&state.registers);
        self.memory = memory_lines(&state.memory);
        self.flags = flags_for(&state.registers);
        self.steps = steps;
        self.state = Some(state);
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

fn register_lines(registers: &[u8; REGISTER_COUNT]) -> Vec<String> {
    registers
        .iter()
        .enumerate()
        .map(|(i, value)| format!("R{} = {}", i, value))
        .collect()
}

fn memory_lines(memory: &[u8]) -> Vec<String> {
    let lines: Vec<String> = memory
        .iter()
        .enumerate()
        .filter(|&(_, &value)| value != 0)
        .map(|(address, value)| format!("[{}] = {}", address, value))
        .collect();
    if lines.is_empty() {
        vec![EMPTY_MEMORY_MESSAGE.to_string()]
    } else {
        lines
    }
}

// Computed from the final registers, so it is set even when no
// instruction ran.
fn flags_for(registers: &[u8; REGISTER_COUNT]) -> Flags {
    Flags {
        zero: registers.iter().any(|&r| r == 0) as u8,
        carry: 0,
    }
}
