use clap::{ArgAction, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use isa_sim::config::{DEFAULT_MAX_STEPS, DEFAULT_PORT};
use isa_sim::server::run_server;
use isa_sim::{AssemblyMode, ExecConfig, RunReport, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "isa_sim")]
#[command(about = "6-register 8-bit instruction set simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Step ceiling for every run; requests may only lower it
        #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: u64,

        /// Drop malformed lines instead of rejecting the program
        #[arg(long, action = ArgAction::SetTrue)]
        lenient: bool,
    },
    /// Assemble and run a source file, printing the trace and final state
    Run {
        path: PathBuf,

        #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: u64,

        #[arg(long, action = ArgAction::SetTrue)]
        lenient: bool,

        /// Print the full report as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
}

fn mode(lenient: bool) -> AssemblyMode {
    if lenient {
        AssemblyMode::Lenient
    } else {
        AssemblyMode::Strict
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            host,
            port,
            max_steps,
            lenient,
        } => {
            let config = ServerConfig {
                host,
                port,
                exec: ExecConfig::with_max_steps(max_steps),
                assembly_mode: mode(lenient),
            };
            run_server(config).await;
            ExitCode::SUCCESS
        }
        Command::Run {
            path,
            max_steps,
            lenient,
            json,
        } => {
            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(err) => {
                    eprintln!("error: cannot read {}: {}", path.display(), err);
                    return ExitCode::FAILURE;
                }
            };
            let report = RunReport::build(&source, mode(lenient), &ExecConfig::with_max_steps(max_steps));
            if json {
                match serde_json::to_string_pretty(&report) {
                    Ok(text) => println!("{}", text),
                    Err(err) => {
                        eprintln!("error: cannot encode report: {}", err);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print_report(&report);
            }
            if report.succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn print_report(report: &RunReport) {
    for skipped in &report.skipped {
        eprintln!("warning: skipped {}", skipped);
    }

    println!("Output:");
    for line in &report.output {
        println!("  {}", line);
    }

    println!("Registers:");
    for line in &report.registers {
        println!("  {}", line);
    }

    println!("Memory:");
    for line in &report.memory {
        println!("  {}", line);
    }

    println!("Flags:");
    println!("  Zero Flag (Z) = {}", report.flags.zero);
    println!("  Carry Flag (C) = {}", report.flags.carry);
    println!("Steps: {}", report.steps);

    if let Some(error) = &report.error {
        eprintln!("error: {}", error);
    }
}
