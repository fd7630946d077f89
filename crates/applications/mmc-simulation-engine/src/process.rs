//! Process storage and creation
//!
//! Every live process is owned by the [`ProcessTable`]; the event queue,
//! CPU pool and ready queues refer to it only by [`ProcessId`].

use std::collections::HashMap;

use crate::error::{InvariantViolation, Result};
use crate::generators::IndexSampler;
use crate::types::{Process, ProcessId};

/// Arena of live processes keyed by id
#[derive(Debug, Default)]
pub struct ProcessTable {
    processes: HashMap<ProcessId, Process>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, process: Process) -> ProcessId {
        let id = process.id;
        self.processes.insert(id, process);
        id
    }

    pub fn get(&self, id: ProcessId) -> Result<&Process> {
        self.processes
            .get(&id)
            .ok_or_else(|| InvariantViolation::UnknownProcess(id).into())
    }

    pub fn get_mut(&mut self, id: ProcessId) -> Result<&mut Process> {
        self.processes
            .get_mut(&id)
            .ok_or_else(|| InvariantViolation::UnknownProcess(id).into())
    }

    /// Stop tracking a departed process
    pub fn remove(&mut self, id: ProcessId) -> Result<Process> {
        self.processes
            .remove(&id)
            .ok_or_else(|| InvariantViolation::UnknownProcess(id).into())
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

}

/// Creates processes with monotonically increasing ids and optional CPU affinity
pub struct ProcessFactory {
    next_id: u64,
    affinity_probability: f64,
    num_cpus: usize,
}

impl ProcessFactory {
    pub fn new(affinity_probability: f64, num_cpus: usize) -> Self {
        ProcessFactory {
            next_id: 0,
            affinity_probability,
            num_cpus,
        }
    }

    /// Create a process; with `affinity_probability` it prefers a uniformly chosen CPU
    pub fn create(
        &mut self,
        service_time: f64,
        arrival_time: f64,
        sampler: &mut dyn IndexSampler,
    ) -> Process {
        let id = ProcessId(self.next_id);
        self.next_id += 1;

        let mut process = Process::new(id, service_time, arrival_time);
        if self.affinity_probability > 0.0 && sampler.random_unit() < self.affinity_probability {
            process.affinity = Some(sampler.random_index(self.num_cpus));
        }
        process
    }
}
