//! Core types for the simulation engine

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Stable handle of a process, allocated in arrival order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of work flowing through the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub id: ProcessId,
    pub service_time: f64, // Total CPU time required
    pub time_left: f64,    // Remaining CPU time, reduced only on preemption
    pub arrival_time: f64,
    pub last_run_time: f64, // Clock when it last started or resumed running
    pub departure_time: Option<f64>,
    pub cpu_index: Option<usize>,
    pub rq_index: Option<usize>,
    pub affinity: Option<usize>, // Preferred CPU

    // Set while a Preemption event targets this process
    pub preemption_pending: bool,
}

impl Process {
    pub fn new(id: ProcessId, service_time: f64, arrival_time: f64) -> Self {
        Process {
            id,
            service_time,
            time_left: service_time,
            arrival_time,
            last_run_time: 0.0,
            departure_time: None,
            cpu_index: None,
            rq_index: None,
            affinity: None,
            preemption_pending: false,
        }
    }

    /// Remaining service time at `clock`, assuming it has been running since `last_run_time`
    pub fn remaining_at(&self, clock: f64) -> f64 {
        self.time_left - (clock - self.last_run_time)
    }

    /// HRRN response ratio: 1 + waiting / service
    pub fn response_ratio(&self, clock: f64) -> f64 {
        1.0 + (clock - self.arrival_time) / self.service_time
    }
}

/// Kind of a scheduled occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Arrival,
    Departure,
    Preemption,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Arrival => "arrival",
            EventKind::Departure => "departure",
            EventKind::Preemption => "preemption",
        };
        f.write_str(name)
    }
}

/// Ready-queue discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    Fcfs,
    Sjf,
    Srtf,
    Hrrn,
}

impl SchedulerKind {
    pub const ALL: [SchedulerKind; 4] = [
        SchedulerKind::Fcfs,
        SchedulerKind::Sjf,
        SchedulerKind::Srtf,
        SchedulerKind::Hrrn,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SchedulerKind::Fcfs => "FCFS",
            SchedulerKind::Sjf => "SJF",
            SchedulerKind::Srtf => "SRTF",
            SchedulerKind::Hrrn => "HRRN",
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SchedulerKind {
    type Err = SimError;

    /// Accepts names (`fcfs`, `sjf`, `srtf`, `hrrn`) or the numeric codes 0-3
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fcfs" | "0" => Ok(SchedulerKind::Fcfs),
            "sjf" | "1" => Ok(SchedulerKind::Sjf),
            "srtf" | "2" => Ok(SchedulerKind::Srtf),
            "hrrn" | "3" => Ok(SchedulerKind::Hrrn),
            other => Err(SimError::config(format!("unsupported scheduler: {other}"))),
        }
    }
}

/// Physical layout of the ready queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueTopology {
    /// One queue per CPU; queue index == CPU index
    PerCpu,
    /// A single queue shared by all CPUs
    Global,
}

impl QueueTopology {
    /// Number of ready queues needed for `num_cpus` CPUs
    pub fn queue_count(&self, num_cpus: usize) -> usize {
        match self {
            QueueTopology::PerCpu => num_cpus,
            QueueTopology::Global => 1,
        }
    }
}

impl fmt::Display for QueueTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueTopology::PerCpu => f.write_str("per-cpu"),
            QueueTopology::Global => f.write_str("global"),
        }
    }
}

impl FromStr for QueueTopology {
    type Err = SimError;

    /// Accepts `per-cpu` / `global` or the codes 1 (per-CPU) and 2 (global)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-cpu" | "percpu" | "1" => Ok(QueueTopology::PerCpu),
            "global" | "2" => Ok(QueueTopology::Global),
            other => Err(SimError::config(format!("unsupported ready queue setup: {other}"))),
        }
    }
}
