//! Error types for the simulation engine

use thiserror::Error;

use crate::types::ProcessId;

/// Simulation result type
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that can terminate a simulation run
#[derive(Error, Debug)]
pub enum SimError {
    /// Run parameters rejected before the simulation starts
    #[error("Configuration error: {0}")]
    Config(String),

    /// A sampled interval was infinite or undefined
    #[error("Generator error: {0}")]
    Generator(String),

    /// Internal bookkeeping is inconsistent; the run cannot continue
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Writing run output failed
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Internal invariants whose violation indicates a scheduling bug
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("event queue is empty before the end condition was met")]
    EmptyEventQueue,

    #[error("ready queue {0} is empty")]
    EmptyReadyQueue(usize),

    #[error("ready queue {index} out of range (have {count})")]
    ReadyQueueOutOfRange { index: usize, count: usize },

    #[error("CPU {index} out of range (have {count})")]
    CpuOutOfRange { index: usize, count: usize },

    #[error("CPU {0} is idle")]
    CpuIdle(usize),

    #[error("CPU {cpu} is already running process {occupant}")]
    CpuBusy { cpu: usize, occupant: ProcessId },

    #[error("process {expected} expected on CPU {cpu}, found {found:?}")]
    CpuMismatch {
        cpu: usize,
        expected: ProcessId,
        found: Option<ProcessId>,
    },

    #[error("process {0} is not running on any CPU")]
    NotRunning(ProcessId),

    #[error("event at {event_time} precedes the clock {clock}")]
    TimeWentBackwards { clock: f64, event_time: f64 },

    #[error("process bookkeeping inconsistent: {0}")]
    Conservation(String),

    #[error("process {0} is not tracked")]
    UnknownProcess(ProcessId),

    #[error("process {0} has no pending departure to cancel")]
    MissingDeparture(ProcessId),
}

impl SimError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generator error
    pub fn generator(msg: impl Into<String>) -> Self {
        Self::Generator(msg.into())
    }

    /// True when the error reports broken internal bookkeeping
    pub fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}
