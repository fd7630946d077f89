//! Performance metrics for a simulation run
//!
//! Tracks turnaround time, throughput, per-CPU utilization and the average
//! number of processes waiting in each ready queue.
//!
//! Queue occupancy is sampled at fixed steps of half the mean inter-arrival
//! time (`0.5 / arrival_rate`), so the sampling resolution follows traffic
//! intensity. Each step records the occupancy in effect during the interval
//! it closes, and the last step is cut short at the end of the run. The exact
//! time-weighted integral is tracked alongside; the configured
//! [`QueueLengthMethod`] picks which one is reported.
//!
//! CPU busy time is accumulated per run segment, so a process that resumes
//! on another CPU after a preemption is split between both.

use tracing::trace;

use crate::config::QueueLengthMethod;
use crate::cpu::CpuPool;
use crate::error::{InvariantViolation, Result};
use crate::ready_queue::ReadyQueueSet;
use crate::types::Process;

#[derive(Debug, Clone, Default)]
struct QueueTrack {
    samples: Vec<usize>, // Occupancy per closed step, oldest first
    last_sample_time: f64,
    occupancy: usize, // Size since the last change
    last_change_time: f64,
    area: f64, // Integral of occupancy over time
}

impl QueueTrack {
    /// Close every sampling step up to `time`, then account the exact area
    fn advance(&mut self, time: f64, interval: f64) {
        while self.last_sample_time + interval <= time {
            self.last_sample_time += interval;
            self.samples.push(self.occupancy);
        }

        if time > self.last_change_time {
            self.area += self.occupancy as f64 * (time - self.last_change_time);
            self.last_change_time = time;
        }
    }

    /// Close a trailing partial step at `time`
    fn close_at(&mut self, time: f64) {
        if self.last_sample_time < time {
            self.last_sample_time = time;
            self.samples.push(self.occupancy);
        }
    }
}

pub struct Statistics {
    sample_interval: f64,
    method: QueueLengthMethod,
    total_turnaround: f64,
    completed: u64,
    busy_time: Vec<f64>,
    queues: Vec<QueueTrack>,
}

impl Statistics {
    pub fn new(arrival_rate: f64, cpus: &CpuPool, ready: &ReadyQueueSet) -> Self {
        Self::with_method(arrival_rate, cpus, ready, QueueLengthMethod::Sampled)
    }

    pub fn with_method(
        arrival_rate: f64,
        cpus: &CpuPool,
        ready: &ReadyQueueSet,
        method: QueueLengthMethod,
    ) -> Self {
        Statistics {
            sample_interval: 0.5 / arrival_rate,
            method,
            total_turnaround: 0.0,
            completed: 0,
            busy_time: vec![0.0; cpus.len()],
            queues: vec![QueueTrack::default(); ready.len()],
        }
    }

    /// Credit CPU `slot` with a finished run segment of length `elapsed`
    pub fn on_cpu_released(&mut self, slot: usize, elapsed: f64) -> Result<()> {
        let count = self.busy_time.len();
        let busy = self
            .busy_time
            .get_mut(slot)
            .ok_or(InvariantViolation::CpuOutOfRange { index: slot, count })?;

        *busy += elapsed;
        Ok(())
    }

    /// Account a process that finished at `time`
    pub fn on_departure(&mut self, process: &Process, time: f64) {
        self.total_turnaround += time - process.arrival_time;
        self.completed += 1;
    }

    /// Call exactly once after every size change of ready queue `index`
    pub fn on_queue_size_changed(&mut self, time: f64, ready: &ReadyQueueSet, index: usize) -> Result<()> {
        let size = ready.size(index)?;
        let interval = self.sample_interval;
        let track = self.track_mut(index)?;

        track.advance(time, interval);
        track.occupancy = size;
        trace!(queue = index, time, size, samples = track.samples.len(), "ready queue sampled");
        Ok(())
    }

    fn track_mut(&mut self, index: usize) -> Result<&mut QueueTrack> {
        let count = self.queues.len();
        self.queues
            .get_mut(index)
            .ok_or_else(|| InvariantViolation::ReadyQueueOutOfRange { index, count }.into())
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn average_turnaround_time(&self) -> f64 {
        if self.completed == 0 {
            0.0
        } else {
            self.total_turnaround / self.completed as f64
        }
    }

    /// Completed processes per unit time
    pub fn throughput(&self, total_time: f64) -> f64 {
        if total_time <= 0.0 {
            0.0
        } else {
            self.completed as f64 / total_time
        }
    }

    /// Fraction of `total_time` CPU `slot` spent busy
    pub fn utilization(&self, total_time: f64, slot: usize) -> Result<f64> {
        let busy = self.busy_time.get(slot).copied().ok_or(InvariantViolation::CpuOutOfRange {
            index: slot,
            count: self.busy_time.len(),
        })?;

        Ok(if total_time <= 0.0 { 0.0 } else { busy / total_time })
    }

    /// Average occupancy of ready queue `index` up to `total_time`
    ///
    /// Closes the sampling steps up to `total_time` first, with one final
    /// sample at `total_time` itself.
    pub fn average_queue_length(&mut self, total_time: f64, index: usize) -> Result<f64> {
        let interval = self.sample_interval;
        let method = self.method;
        let track = self.track_mut(index)?;
        track.advance(total_time, interval);
        track.close_at(total_time);

        let average = match method {
            QueueLengthMethod::Sampled => {
                if track.samples.is_empty() {
                    0.0
                } else {
                    let sum: usize = track.samples.iter().sum();
                    sum as f64 / track.samples.len() as f64
                }
            }
            QueueLengthMethod::Exact => {
                if total_time <= 0.0 {
                    0.0
                } else {
                    track.area / total_time
                }
            }
        };
        Ok(average)
    }
}
