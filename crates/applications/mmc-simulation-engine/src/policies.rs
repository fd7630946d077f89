//! Ready-queue scheduling policies
//!
//! Implements the four disciplines the simulator can compare:
//! - FCFS: First Come First Served, arrival order
//! - SJF: Shortest Job First, ordered by remaining time, non-preemptive
//! - SRTF: Shortest Remaining Time First, SJF ordering plus preemption on arrival
//! - HRRN: Highest Response Ratio Next, ranked when a process is dequeued

use std::collections::VecDeque;

use crate::error::Result;
use crate::process::ProcessTable;
use crate::types::{ProcessId, SchedulerKind};

/// Scheduling policy trait
///
/// A policy owns the insertion and removal rules of a ready queue; the queue
/// itself is a plain sequence of process ids.
pub trait SchedulingPolicy {
    /// Place a process into the queue
    fn insert(
        &self,
        queue: &mut VecDeque<ProcessId>,
        id: ProcessId,
        processes: &ProcessTable,
    ) -> Result<()>;

    /// Remove the process that should run next, `None` if the queue is empty
    fn dequeue(
        &self,
        queue: &mut VecDeque<ProcessId>,
        clock: f64,
        processes: &ProcessTable,
    ) -> Result<Option<ProcessId>>;

    /// Whether a shorter arrival may preempt a running process
    fn preempts_on_arrival(&self) -> bool {
        false
    }

    fn kind(&self) -> SchedulerKind;

    /// Get policy name
    fn name(&self) -> &str {
        self.kind().name()
    }
}

/// Build the policy for a scheduler kind
pub fn policy_for(kind: SchedulerKind) -> Box<dyn SchedulingPolicy> {
    match kind {
        SchedulerKind::Fcfs => Box::new(FcfsPolicy::new()),
        SchedulerKind::Sjf => Box::new(SjfPolicy::new()),
        SchedulerKind::Srtf => Box::new(SrtfPolicy::new()),
        SchedulerKind::Hrrn => Box::new(HrrnPolicy::new()),
    }
}

/// Insert before the first entry with strictly greater remaining time,
/// so equal-length processes keep arrival order
fn insert_shortest_first(
    queue: &mut VecDeque<ProcessId>,
    id: ProcessId,
    processes: &ProcessTable,
) -> Result<()> {
    let time_left = processes.get(id)?.time_left;

    let mut position = queue.len();
    for (index, &queued) in queue.iter().enumerate() {
        if processes.get(queued)?.time_left > time_left {
            position = index;
            break;
        }
    }

    queue.insert(position, id);
    Ok(())
}

/// FCFS: append on insert, take the head
pub struct FcfsPolicy;

impl FcfsPolicy {
    pub fn new() -> Self {
        FcfsPolicy
    }
}

impl SchedulingPolicy for FcfsPolicy {
    fn insert(
        &self,
        queue: &mut VecDeque<ProcessId>,
        id: ProcessId,
        _processes: &ProcessTable,
    ) -> Result<()> {
        queue.push_back(id);
        Ok(())
    }

    fn dequeue(
        &self,
        queue: &mut VecDeque<ProcessId>,
        _clock: f64,
        _processes: &ProcessTable,
    ) -> Result<Option<ProcessId>> {
        Ok(queue.pop_front())
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Fcfs
    }
}

/// SJF: keep the queue sorted by remaining time, take the head
pub struct SjfPolicy;

impl SjfPolicy {
    pub fn new() -> Self {
        SjfPolicy
    }
}

impl SchedulingPolicy for SjfPolicy {
    fn insert(
        &self,
        queue: &mut VecDeque<ProcessId>,
        id: ProcessId,
        processes: &ProcessTable,
    ) -> Result<()> {
        insert_shortest_first(queue, id, processes)
    }

    fn dequeue(
        &self,
        queue: &mut VecDeque<ProcessId>,
        _clock: f64,
        _processes: &ProcessTable,
    ) -> Result<Option<ProcessId>> {
        Ok(queue.pop_front())
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Sjf
    }
}

/// SRTF: SJF ordering; the simulator preempts on shorter arrivals
pub struct SrtfPolicy;

impl SrtfPolicy {
    pub fn new() -> Self {
        SrtfPolicy
    }
}

impl SchedulingPolicy for SrtfPolicy {
    fn insert(
        &self,
        queue: &mut VecDeque<ProcessId>,
        id: ProcessId,
        processes: &ProcessTable,
    ) -> Result<()> {
        insert_shortest_first(queue, id, processes)
    }

    fn dequeue(
        &self,
        queue: &mut VecDeque<ProcessId>,
        _clock: f64,
        _processes: &ProcessTable,
    ) -> Result<Option<ProcessId>> {
        Ok(queue.pop_front())
    }

    fn preempts_on_arrival(&self) -> bool {
        true
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Srtf
    }
}

/// HRRN: append on insert, dequeue the highest response ratio
pub struct HrrnPolicy;

impl HrrnPolicy {
    pub fn new() -> Self {
        HrrnPolicy
    }
}

impl SchedulingPolicy for HrrnPolicy {
    fn insert(
        &self,
        queue: &mut VecDeque<ProcessId>,
        id: ProcessId,
        _processes: &ProcessTable,
    ) -> Result<()> {
        queue.push_back(id);
        Ok(())
    }

    fn dequeue(
        &self,
        queue: &mut VecDeque<ProcessId>,
        clock: f64,
        processes: &ProcessTable,
    ) -> Result<Option<ProcessId>> {
        // Strictly greater wins, so the earliest inserted keeps ties
        let mut best: Option<(usize, f64)> = None;
        for (index, &queued) in queue.iter().enumerate() {
            let ratio = processes.get(queued)?.response_ratio(clock);
            match best {
                Some((_, best_ratio)) if ratio <= best_ratio => {}
                _ => best = Some((index, ratio)),
            }
        }

        Ok(best.and_then(|(index, _)| queue.remove(index)))
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Hrrn
    }
}
