//! M/M/c Simulation Engine
//!
//! Discrete-event simulator for a multi-CPU queuing system with FCFS, SJF,
//! SRTF and HRRN ready-queue scheduling.

pub mod config;
pub mod cpu;
pub mod end_checker;
pub mod error;
pub mod event_queue;
pub mod generators;
pub mod output;
pub mod policies;
pub mod process;
pub mod ready_queue;
pub mod simulator;
pub mod stats;
pub mod types;

pub use config::{EndCondition, QueueLengthMethod, SimConfig};
pub use error::{InvariantViolation, Result, SimError};
pub use simulator::{SimulationResult, Simulator};
pub use types::{QueueTopology, SchedulerKind};
