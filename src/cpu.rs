use serde::Serialize;

use crate::config::ExecConfig;
use crate::error::{ExecutionError, ExecutionFailure};
use crate::isa::{Instruction, Register, REGISTER_COUNT};
use crate::memory::{AddressOutOfRange, Memory};
use crate::trace::TraceEntry;

/// Register machine state for a single run.
#[derive(Debug, Clone)]
pub struct Machine {
    registers: [u8; REGISTER_COUNT],
    memory: Memory,
    pc: usize,
    zero_flag: bool,
}

/// What the run loop should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
    /// pc is past the last instruction; nothing was executed.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `HLT` executed.
    Halted,
    /// The program counter moved past the last instruction.
    EndOfProgram,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineSnapshot {
    pub registers: [u8; REGISTER_COUNT],
    pub memory: Vec<u8>,
    pub pc: usize,
    pub zero_flag: bool,
}

/// Result of a run that stopped normally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Execution {
    pub trace: Vec<TraceEntry>,
    pub state: MachineSnapshot,
    pub steps: u64,
    pub stop: StopReason,
}

impl Machine {
    pub fn new() -> Self {
        Machine {
            registers: [0; REGISTER_COUNT],
            memory: Memory::new(),
            pc: 0,
            zero_flag: false,
        }
    }

    // Getters
    pub fn get_register(&self, reg: Register) -> u8 { self.registers[reg.index()] }
    pub fn get_pc(&self) -> usize { self.pc }
    pub fn is_zero_flag_set(&self) -> bool { self.zero_flag }
    pub fn get_memory(&self) -> &Memory { &self.memory }

    fn set_register(&mut self, reg: Register, value: u8) {
        self.registers[reg.index()] = value;
    }

    // Set if *any* register holds zero, not only the one just written
    fn update_zero_flag(&mut self) {
        self.zero_flag = self.registers.iter().any(|&r| r == 0);
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            registers: self.registers,
            memory: self.memory.cells().to_vec(),
            pc: self.pc,
            zero_flag: self.zero_flag,
        }
    }

    /// Execute the instruction at `pc`.
    ///
    /// Non-jump instructions finish with the bookkeeping pass: zero flag
    /// recomputed, an `Executed` entry appended to `trace`, pc advanced.
    /// A taken jump only moves pc and `HLT` does nothing at all.
    pub fn step(
        &mut self,
        program: &[Instruction],
        trace: &mut Vec<TraceEntry>,
    ) -> Result<Flow, ExecutionError> {
        let pc = self.pc;
        let Some(&instruction) = program.get(pc) else {
            return Ok(Flow::End);
        };

        match instruction {
            Instruction::Mov(reg, value) => self.mov(reg, value),
            Instruction::Load(reg, address) => self.load(pc, instruction, reg, address)?,
            Instruction::Store(reg, address) => self.store(pc, instruction, reg, address)?,
            Instruction::Add(a, b) => self.binary(a, b, u8::wrapping_add),
            Instruction::Sub(a, b) => self.binary(a, b, u8::wrapping_sub),
            Instruction::Mul(a, b) => self.binary(a, b, u8::wrapping_mul),
            Instruction::Div(a, b) => {
                if !self.div(a, b) {
                    trace.push(TraceEntry::DivisionByZero { pc, instruction });
                }
            }
            Instruction::Jump(target) => {
                self.pc = self.jump_target(program, pc, instruction, target)?;
                return Ok(Flow::Continue);
            }
            Instruction::JumpZ(target) => {
                if self.zero_flag {
                    self.pc = self.jump_target(program, pc, instruction, target)?;
                    return Ok(Flow::Continue);
                }
            }
            Instruction::And(a, b) => self.binary(a, b, |x, y| x & y),
            Instruction::Or(a, b) => self.binary(a, b, |x, y| x | y),
            Instruction::Xor(a, b) => self.binary(a, b, |x, y| x ^ y),
            Instruction::Not(reg) => self.set_register(reg, !self.get_register(reg)),
            Instruction::Hlt => return Ok(Flow::Halt),
        }

        self.update_zero_flag();
        trace.push(TraceEntry::Executed {
            pc,
            instruction,
            registers: self.registers,
            zero_flag: self.zero_flag,
        });
        self.pc += 1;
        Ok(Flow::Continue)
    }

    fn mov(&mut self, reg: Register, value: i64) {
        // low 8 bits, two's complement for negative literals
        self.set_register(reg, (value & 0xFF) as u8);
    }

    fn load(
        &mut self,
        pc: usize,
        instruction: Instruction,
        reg: Register,
        address: i64,
    ) -> Result<(), ExecutionError> {
        let value = self
            .memory
            .read(address)
            .ok_or(ExecutionError::MemoryOutOfBounds { pc, instruction, address })?;
        self.set_register(reg, value);
        Ok(())
    }

    fn store(
        &mut self,
        pc: usize,
        instruction: Instruction,
        reg: Register,
        address: i64,
    ) -> Result<(), ExecutionError> {
        let value = self.get_register(reg);
        self.memory
            .write(address, value)
            .map_err(|AddressOutOfRange(address)| {
                ExecutionError::MemoryOutOfBounds { pc, instruction, address }
            })
    }

    fn binary(&mut self, dst: Register, src: Register, op: fn(u8, u8) -> u8) {
        let result = op(self.get_register(dst), self.get_register(src));
        self.set_register(dst, result);
    }

    // Floor division of two 8-bit values always fits, so no masking.
    // Returns false on a zero divisor.
    fn div(&mut self, dst: Register, src: Register) -> bool {
        let divisor = self.get_register(src);
        if divisor == 0 {
            return false;
        }
        self.set_register(dst, self.get_register(dst) / divisor);
        true
    }

    fn jump_target(
        &self,
        program: &[Instruction],
        pc: usize,
        instruction: Instruction,
        target: i64,
    ) -> Result<usize, ExecutionError> {
        usize::try_from(target)
            .ok()
            .filter(|&t| t < program.len())
            .ok_or(ExecutionError::InvalidJumpTarget { pc, instruction, target })
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `program` on a fresh machine until `HLT`, the end of the program, a
/// fatal error or the step ceiling.
pub fn execute(program: &[Instruction], config: &ExecConfig) -> Result<Execution, ExecutionFailure> {
    let mut machine = Machine::new();
    let mut trace = Vec::new();
    let mut steps: u64 = 0;

    let stop = loop {
        if machine.pc >= program.len() {
            break StopReason::EndOfProgram;
        }
        if steps >= config.max_steps {
            let error = ExecutionError::StepLimitExceeded {
                limit: config.max_steps,
                pc: machine.pc,
            };
            return Err(fail(error, trace, &machine, steps));
        }
        steps += 1;

        match machine.step(program, &mut trace) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Halt) => break StopReason::Halted,
            Ok(Flow::End) => break StopReason::EndOfProgram,
            Err(error) => return Err(fail(error, trace, &machine, steps)),
        }
    };

    Ok(Execution {
        trace,
        state: machine.snapshot(),
        steps,
        stop,
    })
}

fn fail(error: ExecutionError, trace: Vec<TraceEntry>, machine: &Machine, steps: u64) -> ExecutionFailure {
    ExecutionFailure {
        error,
        trace,
        state: machine.snapshot(),
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::AssemblyMode;
    use crate::error::RunError;
    use crate::isa::Register::*;

    fn run(program: &[Instruction]) -> Execution {
        execute(program, &ExecConfig::default()).unwrap()
    }

    #[test]
    fn test_mov_masks_to_8_bits() {
        let execution = run(&[
            Instruction::Mov(R0, 300),
            Instruction::Mov(R1, -1),
            Instruction::Mov(R2, 255),
            Instruction::Mov(R3, 256),
        ]);
        assert_eq!(execution.state.registers, [44, 255, 255, 0, 0, 0]);
    }

    #[test]
    fn test_add_wraps() {
        let execution = run(&[
            Instruction::Mov(R0, 200),
            Instruction::Mov(R1, 100),
            Instruction::Add(R0, R1),
        ]);
        assert_eq!(execution.state.registers[0], 44);
        assert_eq!(execution.state.registers[1], 100);
    }

    #[test]
    fn test_sub_borrow_wraps() {
        let execution = run(&[
            Instruction::Mov(R0, 3),
            Instruction::Mov(R1, 5),
            Instruction::Sub(R0, R1),
        ]);
        assert_eq!(execution.state.registers[0], 254);
    }

    #[test]
    fn test_mul_wraps() {
        let execution = run(&[
            Instruction::Mov(R0, 16),
            Instruction::Mov(R1, 17),
            Instruction::Mul(R0, R1),
        ]);
        assert_eq!(execution.state.registers[0], (16 * 17 % 256) as u8);
    }

    #[test]
    fn test_div_floors() {
        let execution = run(&[
            Instruction::Mov(R0, 17),
            Instruction::Mov(R1, 5),
            Instruction::Div(R0, R1),
        ]);
        assert_eq!(execution.state.registers[0], 3);
        assert!(execution.trace.iter().all(|e| !e.is_division_by_zero()));
    }

    #[test]
    fn test_div_by_zero_keeps_destination() {
        let execution = run(&[
            Instruction::Mov(R0, 0),
            Instruction::Mov(R1, 5),
            Instruction::Div(R1, R0),
            Instruction::Hlt,
        ]);
        assert_eq!(execution.state.registers[1], 5);
        let errors = execution.trace.iter().filter(|e| e.is_division_by_zero()).count();
        assert_eq!(errors, 1);
        // the error is logged, then the instruction still completes
        assert!(execution.trace[2].is_division_by_zero());
        assert!(matches!(
            execution.trace[3],
            TraceEntry::Executed { pc: 2, registers: [0, 5, 0, 0, 0, 0], .. }
        ));
        assert_eq!(execution.stop, StopReason::Halted);
    }

    #[test]
    fn test_logical_operations() {
        let execution = run(&[
            Instruction::Mov(R0, 0b1100),
            Instruction::Mov(R1, 0b1010),
            Instruction::Mov(R2, 0b1100),
            Instruction::Mov(R3, 0b1100),
            Instruction::And(R0, R1),
            Instruction::Or(R2, R1),
            Instruction::Xor(R3, R1),
            Instruction::Mov(R4, 0x0F),
            Instruction::Not(R4),
        ]);
        assert_eq!(execution.state.registers, [0b1000, 0b1010, 0b1110, 0b0110, 0xF0, 0]);
    }

    #[test]
    fn test_load_store() {
        let execution = run(&[
            Instruction::Mov(R0, 42),
            Instruction::Store(R0, 63),
            Instruction::Load(R1, 63),
            Instruction::Load(R2, 0),
        ]);
        assert_eq!(execution.state.memory[63], 42);
        assert_eq!(execution.state.registers[1], 42);
        assert_eq!(execution.state.registers[2], 0);
    }

    #[test]
    fn test_store_out_of_range_is_fatal() {
        let program = [Instruction::Mov(R0, 1), Instruction::Store(R0, 64), Instruction::Hlt];
        let failure = execute(&program, &ExecConfig::default()).unwrap_err();
        assert_eq!(
            failure.error,
            ExecutionError::MemoryOutOfBounds {
                pc: 1,
                instruction: Instruction::Store(R0, 64),
                address: 64
            }
        );
        assert_eq!(failure.error.pc(), 1);
        // progress up to the fault is preserved
        assert_eq!(failure.trace.len(), 1);
        assert_eq!(failure.state.registers[0], 1);
        assert_eq!(failure.state.pc, 1);
        assert_eq!(failure.steps, 2);
    }

    #[test]
    fn test_load_negative_address_is_fatal() {
        let failure = execute(&[Instruction::Load(R0, -1)], &ExecConfig::default()).unwrap_err();
        assert!(matches!(failure.error, ExecutionError::MemoryOutOfBounds { address: -1, .. }));
    }

    #[test]
    fn test_zero_flag_tracks_any_register() {
        let mut machine = Machine::new();
        let mut trace = Vec::new();
        let program = [
            Instruction::Mov(R0, 1),
            Instruction::Mov(R1, 1),
            Instruction::Mov(R2, 1),
            Instruction::Mov(R3, 1),
            Instruction::Mov(R4, 1),
            Instruction::Mov(R5, 1),
            Instruction::Sub(R0, R1),
        ];
        for _ in 0..5 {
            machine.step(&program, &mut trace).unwrap();
            assert!(machine.is_zero_flag_set());
        }
        machine.step(&program, &mut trace).unwrap();
        assert!(!machine.is_zero_flag_set());
        machine.step(&program, &mut trace).unwrap();
        assert!(machine.is_zero_flag_set());
        assert_eq!(machine.get_register(R0), 0);
    }

    #[test]
    fn test_jump_skips_bookkeeping() {
        let execution = run(&[
            Instruction::Jump(2),
            Instruction::Mov(R0, 9),
            Instruction::Mov(R1, 1),
            Instruction::Hlt,
        ]);
        assert_eq!(execution.trace.len(), 1);
        assert_eq!(execution.trace[0].pc(), 2);
        assert_eq!(execution.state.registers[0], 0);
        assert_eq!(execution.steps, 3);
    }

    #[test]
    fn test_jumpz_uses_flag_from_before() {
        // Flag starts clear even though every register is zero.
        let mut machine = Machine::new();
        let mut trace = Vec::new();
        let program = [Instruction::JumpZ(0), Instruction::Hlt];
        machine.step(&program, &mut trace).unwrap();
        assert_eq!(machine.get_pc(), 1);
        assert_eq!(trace.len(), 1);
        // not taken, so bookkeeping ran and set the flag
        assert!(machine.is_zero_flag_set());
    }

    #[test]
    fn test_jumpz_taken() {
        let execution = run(&[
            Instruction::Mov(R0, 0),
            Instruction::JumpZ(3),
            Instruction::Mov(R1, 7),
            Instruction::Hlt,
        ]);
        assert_eq!(execution.state.registers[1], 0);
        assert_eq!(execution.trace.len(), 1);
        assert_eq!(execution.stop, StopReason::Halted);
    }

    #[test]
    fn test_countdown_loop() {
        // R0 counts down from 3; R5 stays non-zero so only R0 can set the flag
        let program = [
            Instruction::Mov(R0, 3),
            Instruction::Mov(R1, 1),
            Instruction::Mov(R2, 1),
            Instruction::Mov(R3, 1),
            Instruction::Mov(R4, 1),
            Instruction::Mov(R5, 1),
            Instruction::Sub(R0, R1),
            Instruction::JumpZ(9),
            Instruction::Jump(6),
            Instruction::Hlt,
        ];
        let execution = run(&program);
        assert_eq!(execution.state.registers[0], 0);
        assert_eq!(execution.stop, StopReason::Halted);
        let subs = execution
            .trace
            .iter()
            .filter(|e| matches!(e.instruction(), Instruction::Sub(..)))
            .count();
        assert_eq!(subs, 3);
    }

    #[test]
    fn test_invalid_jump_target() {
        for target in [-1, 2, 100] {
            let program = [Instruction::Mov(R0, 1), Instruction::Jump(target)];
            let failure = execute(&program, &ExecConfig::default()).unwrap_err();
            assert_eq!(
                failure.error,
                ExecutionError::InvalidJumpTarget {
                    pc: 1,
                    instruction: Instruction::Jump(target),
                    target
                }
            );
            assert_eq!(failure.state.registers[0], 1);
        }
    }

    #[test]
    fn test_hlt_stops_without_trace() {
        let execution = run(&[Instruction::Hlt, Instruction::Mov(R0, 1)]);
        assert!(execution.trace.is_empty());
        assert_eq!(execution.stop, StopReason::Halted);
        assert_eq!(execution.state.pc, 0);
        assert_eq!(execution.steps, 1);
    }

    #[test]
    fn test_end_of_program() {
        let execution = run(&[Instruction::Mov(R0, 1)]);
        assert_eq!(execution.stop, StopReason::EndOfProgram);
        assert_eq!(execution.state.pc, 1);

        let empty = run(&[]);
        assert_eq!(empty.stop, StopReason::EndOfProgram);
        assert_eq!(empty.steps, 0);
        assert_eq!(empty.state.registers, [0; REGISTER_COUNT]);
        assert!(!empty.state.zero_flag);

        let mut machine = Machine::new();
        let mut trace = Vec::new();
        assert_eq!(machine.step(&[], &mut trace), Ok(Flow::End));
        assert!(trace.is_empty());
    }

    #[test]
    fn test_step_limit() {
        let program = [Instruction::Mov(R0, 1), Instruction::Jump(0)];
        let failure = execute(&program, &ExecConfig::with_max_steps(100)).unwrap_err();
        assert_eq!(failure.error, ExecutionError::StepLimitExceeded { limit: 100, pc: 0 });
        assert_eq!(failure.steps, 100);
        assert_eq!(failure.trace.len(), 50);
    }

    #[test]
    fn test_step_limit_checked_before_hlt() {
        // HLT is a fetch like any other, so it needs a step of its own
        let program = [Instruction::Mov(R0, 1), Instruction::Hlt];
        let failure = execute(&program, &ExecConfig::with_max_steps(1)).unwrap_err();
        assert_eq!(failure.error, ExecutionError::StepLimitExceeded { limit: 1, pc: 1 });
        assert_eq!(failure.steps, 1);
        assert_eq!(failure.trace.len(), 1);
        assert_eq!(failure.state.registers[0], 1);

        let execution = execute(&program, &ExecConfig::with_max_steps(2)).unwrap();
        assert_eq!(execution.stop, StopReason::Halted);
        assert_eq!(execution.steps, 2);
    }

    #[test]
    fn test_oversized_operands_from_source() {
        let config = ExecConfig::default();
        let execution = crate::run("MOV R0 18446744073709551617\nHLT", AssemblyMode::Strict, &config).unwrap();
        assert_eq!(execution.state.registers[0], 1);

        let failure = match crate::run("LOAD R0 99999999999999999999", AssemblyMode::Strict, &config) {
            Err(RunError::Execution(failure)) => failure,
            other => panic!("expected an execution failure, got {:?}", other),
        };
        assert!(matches!(failure.error, ExecutionError::MemoryOutOfBounds { address: i64::MAX, .. }));

        let failure = match crate::run("JUMP -99999999999999999999", AssemblyMode::Strict, &config) {
            Err(RunError::Execution(failure)) => failure,
            other => panic!("expected an execution failure, got {:?}", other),
        };
        assert!(matches!(failure.error, ExecutionError::InvalidJumpTarget { target: i64::MIN, .. }));
    }

    #[test]
    fn test_store_leaves_memory_on_fault() {
        let mut machine = Machine::new();
        let mut trace = Vec::new();
        let program = [Instruction::Mov(R0, 5), Instruction::Store(R0, 64)];
        machine.step(&program, &mut trace).unwrap();
        assert!(machine.step(&program, &mut trace).is_err());
        assert_eq!(machine.get_memory().non_zero().count(), 0);
        assert_eq!(machine.get_pc(), 1);
    }

    #[test]
    fn test_runs_do_not_share_state() {
        let program = [Instruction::Mov(R0, 9), Instruction::Store(R0, 5)];
        let first = run(&program);
        let second = run(&[Instruction::Load(R1, 5)]);
        assert_eq!(first.state.memory[5], 9);
        assert_eq!(second.state.registers[1], 0);
    }
}
