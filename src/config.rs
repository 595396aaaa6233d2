use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::assembler::AssemblyMode;

/// Default step ceiling for a single run.
pub const DEFAULT_MAX_STEPS: u64 = 10_000;

pub const DEFAULT_PORT: u16 = 3030;

/// Limits applied to one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Instructions fetched before the run is stopped, jumps included.
    pub max_steps: u64,
}

impl ExecConfig {
    pub fn with_max_steps(max_steps: u64) -> Self {
        Self { max_steps }
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Limits for every run; requests may lower `max_steps` but not raise it.
    pub exec: ExecConfig,
    /// Mode used when a request does not name one.
    pub assembly_mode: AssemblyMode,
}

impl ServerConfig {
    /// Step ceiling for a request asking for `requested` steps.
    pub fn effective_exec(&self, requested: Option<u64>) -> ExecConfig {
        match requested {
            Some(steps) => ExecConfig::with_max_steps(steps.min(self.exec.max_steps)),
            None => self.exec,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            exec: ExecConfig::default(),
            assembly_mode: AssemblyMode::Strict,
        }
    }
}
