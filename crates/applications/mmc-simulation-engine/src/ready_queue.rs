//! Ready queues holding processes that wait for a CPU
//!
//! Either one global queue shared by every CPU or one queue per CPU. All
//! queues share the scheduling policy chosen at construction.

use std::collections::VecDeque;

use crate::error::{InvariantViolation, Result};
use crate::policies::{policy_for, SchedulingPolicy};
use crate::process::ProcessTable;
use crate::types::{ProcessId, SchedulerKind};

pub struct ReadyQueueSet {
    policy: Box<dyn SchedulingPolicy>,
    queues: Vec<VecDeque<ProcessId>>,
}

impl ReadyQueueSet {
    pub fn new(kind: SchedulerKind, num_queues: usize) -> Self {
        ReadyQueueSet {
            policy: policy_for(kind),
            queues: vec![VecDeque::new(); num_queues],
        }
    }

    pub fn policy(&self) -> &dyn SchedulingPolicy {
        self.policy.as_ref()
    }

    /// Number of ready queues
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_global(&self) -> bool {
        self.queues.len() == 1
    }

    pub fn queue(&self, index: usize) -> Result<&VecDeque<ProcessId>> {
        let count = self.queues.len();
        self.queues
            .get(index)
            .ok_or_else(|| InvariantViolation::ReadyQueueOutOfRange { index, count }.into())
    }

    pub fn size(&self, index: usize) -> Result<usize> {
        Ok(self.queue(index)?.len())
    }

    pub fn is_empty(&self, index: usize) -> Result<bool> {
        Ok(self.queue(index)?.is_empty())
    }

    /// Sizes of every queue, by index
    pub fn sizes(&self) -> Vec<usize> {
        self.queues.iter().map(VecDeque::len).collect()
    }

    /// Queue a process under the active policy and record which queue holds it
    pub fn insert(&mut self, processes: &mut ProcessTable, id: ProcessId, index: usize) -> Result<()> {
        let count = self.queues.len();
        let queue = self
            .queues
            .get_mut(index)
            .ok_or(InvariantViolation::ReadyQueueOutOfRange { index, count })?;

        processes.get_mut(id)?.rq_index = Some(index);
        self.policy.insert(queue, id, processes)
    }

    /// Remove the next process to run from queue `index`
    pub fn dequeue(&mut self, clock: f64, processes: &ProcessTable, index: usize) -> Result<ProcessId> {
        let count = self.queues.len();
        let queue = self
            .queues
            .get_mut(index)
            .ok_or(InvariantViolation::ReadyQueueOutOfRange { index, count })?;

        self.policy
            .dequeue(queue, clock, processes)?
            .ok_or_else(|| InvariantViolation::EmptyReadyQueue(index).into())
    }
}
