use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Once;
use std::time::{Duration, Instant};

use crate::cpu::StopReason;
use crate::error::AssemblyErrorKind;
use crate::report::RunReport;
use crate::trace::TraceEntry;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Counter for instructions that completed, by opcode
    pub static ref INSTRUCTIONS_EXECUTED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("isa_instructions_executed_total", "Instructions executed by opcode"),
        &["opcode", "mnemonic"]
    ).expect("Failed to create instructions counter");

    /// Counter for fetched instructions, jumps included
    pub static ref STEPS_TOTAL: Counter = Counter::new(
        "isa_steps_total", "Total number of instructions fetched"
    ).expect("Failed to create steps counter");

    pub static ref DIVISION_BY_ZERO_TOTAL: Counter = Counter::new(
        "isa_division_by_zero_total", "DIV instructions with a zero divisor"
    ).expect("Failed to create division by zero counter");

    /// Counter for runs by how they ended
    pub static ref RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("isa_runs_total", "Total number of program runs"),
        &["outcome"]
    ).expect("Failed to create runs counter");

    /// Histogram for assemble + execute time
    pub static ref RUN_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("isa_run_duration_seconds", "Time spent assembling and executing a program")
            .buckets(vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05])
    ).expect("Failed to create run duration histogram");

    /// Counter for source lines rejected by the assembler
    pub static ref ASSEMBLY_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("isa_assembly_errors_total", "Source lines rejected by the assembler"),
        &["kind"]
    ).expect("Failed to create assembly errors counter");

    /// Counter for API requests by endpoint and method
    pub static ref API_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("api_requests_total", "Total number of API requests"),
        &["method", "endpoint", "status"]
    ).expect("Failed to create API requests counter");

    /// Histogram for API request duration
    pub static ref API_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("api_request_duration_seconds", "API request duration")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["method", "endpoint"]
    ).expect("Failed to create API request duration histogram");
}

static INIT: Once = Once::new();

/// Register all metrics with the global registry. Safe to call more than once.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(INSTRUCTIONS_EXECUTED_TOTAL.clone()))
            .expect("Failed to register instructions counter");

        REGISTRY
            .register(Box::new(STEPS_TOTAL.clone()))
            .expect("Failed to register steps counter");

        REGISTRY
            .register(Box::new(DIVISION_BY_ZERO_TOTAL.clone()))
            .expect("Failed to register division by zero counter");

        REGISTRY
            .register(Box::new(RUNS_TOTAL.clone()))
            .expect("Failed to register runs counter");

        REGISTRY
            .register(Box::new(RUN_DURATION.clone()))
            .expect("Failed to register run duration histogram");

        REGISTRY
            .register(Box::new(ASSEMBLY_ERRORS_TOTAL.clone()))
            .expect("Failed to register assembly errors counter");

        REGISTRY
            .register(Box::new(API_REQUESTS_TOTAL.clone()))
            .expect("Failed to register API requests counter");

        REGISTRY
            .register(Box::new(API_REQUEST_DURATION.clone()))
            .expect("Failed to register API request duration histogram");
    });
}

/// Record the trace of a finished run
pub fn record_trace(trace: &[TraceEntry]) {
    for entry in trace {
        match entry {
            TraceEntry::Executed { instruction, .. } => {
                let opcode = instruction.opcode();
                INSTRUCTIONS_EXECUTED_TOTAL
                    .with_label_values(&[&opcode.code().to_string(), opcode.mnemonic()])
                    .inc();
            }
            TraceEntry::DivisionByZero { .. } => DIVISION_BY_ZERO_TOTAL.inc(),
        }
    }
}

/// Record everything a report says about its run
pub fn record_run(report: &RunReport, duration: Duration) {
    record_trace(&report.trace);
    STEPS_TOTAL.inc_by(report.steps as f64);

    let rejected = report.assembly_error.iter().chain(&report.skipped);
    for error in rejected {
        record_assembly_error(&error.kind);
    }

    RUNS_TOTAL.with_label_values(&[run_outcome(report)]).inc();
    RUN_DURATION.observe(duration.as_secs_f64());
}

pub fn record_assembly_error(kind: &AssemblyErrorKind) {
    ASSEMBLY_ERRORS_TOTAL.with_label_values(&[kind.label()]).inc();
}

/// Outcome label for a report
pub fn run_outcome(report: &RunReport) -> &'static str {
    match (&report.stop, &report.error) {
        (Some(StopReason::Halted), _) => "halted",
        (Some(StopReason::EndOfProgram), _) => "end_of_program",
        (None, _) if report.assembly_error.is_some() => "assembly_error",
        (None, _) => "fault",
    }
}

/// Record an API request
pub fn record_api_request(method: &str, endpoint: &str, status: u16, duration: Duration) {
    API_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();

    API_REQUEST_DURATION
        .with_label_values(&[method, endpoint])
        .observe(duration.as_secs_f64());
}

/// Helper struct for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
