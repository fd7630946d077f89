//! Discrete-event simulator for a multi-CPU queuing system
//!
//! Pops the earliest pending event, dispatches it to the arrival, departure
//! or preemption handler and repeats until the end condition holds. The
//! simulated CPUs are plain resources advanced by this single loop.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::cpu::CpuPool;
use crate::end_checker::EndChecker;
use crate::error::{InvariantViolation, Result, SimError};
use crate::event_queue::{Event, EventQueue};
use crate::generators::{ExponentialTimes, IndexSampler, TimeSource, UniformSampler};
use crate::output::{LiveUpdate, LiveUpdateKind, Output};
use crate::process::{ProcessFactory, ProcessTable};
use crate::ready_queue::ReadyQueueSet;
use crate::stats::Statistics;
use crate::types::{EventKind, Process, ProcessId, QueueTopology};

/// Result of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub scheduler: String,
    pub topology: QueueTopology,
    pub num_cpus: usize,
    pub total_time: f64,
    pub arrivals: u64,
    pub departures: u64,
    pub preemptions: u64,
    pub average_turnaround_time: f64,
    pub throughput: f64,
    pub cpu_utilization: Vec<f64>,
    pub average_queue_lengths: Vec<f64>,
}

/// Print a live update if narration is enabled
fn narrate(
    output: &mut Option<Box<dyn Output>>,
    clock: f64,
    kind: LiveUpdateKind,
    process: &Process,
    ready: &ReadyQueueSet,
    next: Option<&Process>,
) -> Result<()> {
    if let Some(output) = output {
        output.print_live_update(&LiveUpdate {
            clock,
            kind,
            process,
            ready,
            next,
        })?;
    }
    Ok(())
}

/// Simulation context: every resource a run mutates
pub struct Simulator {
    config: SimConfig,
    clock: f64,
    events: EventQueue,
    processes: ProcessTable,
    factory: ProcessFactory,
    cpus: CpuPool,
    ready: ReadyQueueSet,
    stats: Statistics,
    end_checker: EndChecker,
    times: Box<dyn TimeSource>,
    sampler: Box<dyn IndexSampler>,
    live_output: Option<Box<dyn Output>>,

    arrivals_exhausted: bool,
    preemptions: u64,
}

impl Simulator {
    /// Create a simulator drawing exponential times from the configured rates
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let times = ExponentialTimes::new(config.arrival_rate, config.mean_service_time, config.seed)?;
        let sampler = UniformSampler::new(config.seed.map(|seed| seed.wrapping_add(1)));
        Self::with_sources(config, Box::new(times), Box::new(sampler))
    }

    /// Create a simulator with explicit time and index sources
    ///
    /// The first process arrives at time 0.
    pub fn with_sources(
        config: SimConfig,
        mut times: Box<dyn TimeSource>,
        mut sampler: Box<dyn IndexSampler>,
    ) -> Result<Self> {
        config.validate()?;

        let cpus = CpuPool::new(config.num_cpus);
        let ready = ReadyQueueSet::new(config.scheduler, config.num_queues());
        let stats =
            Statistics::with_method(config.arrival_rate, &cpus, &ready, config.queue_length_method);
        let mut factory = ProcessFactory::new(config.affinity_probability, config.num_cpus);
        let mut processes = ProcessTable::new();
        let mut events = EventQueue::new();

        let first = factory.create(times.next_service_time()?, 0.0, sampler.as_mut());
        let first_id = processes.insert(first);
        events.schedule(EventKind::Arrival, 0.0, first_id);

        info!(
            scheduler = %config.scheduler,
            topology = %config.topology,
            cpus = config.num_cpus,
            arrival_rate = config.arrival_rate,
            mean_service_time = config.mean_service_time,
            "initialization complete"
        );

        Ok(Simulator {
            end_checker: EndChecker::new(config.end_condition),
            config,
            clock: 0.0,
            events,
            processes,
            factory,
            cpus,
            ready,
            stats,
            times,
            sampler,
            live_output: None,
            arrivals_exhausted: false,
            preemptions: 0,
        })
    }

    /// Narrate every state-changing event to `output`
    pub fn with_live_output(mut self, output: Box<dyn Output>) -> Self {
        self.live_output = Some(output);
        self
    }

    /// Run until the end condition holds, then collect the metrics
    pub fn run(&mut self) -> Result<SimulationResult> {
        while !self.end_checker.has_ended() {
            if self.step()?.is_none() {
                debug!(clock = self.clock, "workload drained");
                break;
            }
        }

        info!(
            clock = self.clock,
            arrivals = self.end_checker.arrivals(),
            departures = self.end_checker.departures(),
            "simulation complete"
        );
        self.results()
    }

    /// Process the earliest pending event
    ///
    /// Returns `None` once a finite workload has fully drained.
    pub fn step(&mut self) -> Result<Option<Event>> {
        if self.events.is_empty() && self.arrivals_exhausted {
            return Ok(None);
        }

        let event = self.events.pop_earliest()?;
        if event.time < self.clock {
            return Err(InvariantViolation::TimeWentBackwards {
                clock: self.clock,
                event_time: event.time,
            }
            .into());
        }
        self.clock = event.time;
        debug!(clock = self.clock, kind = %event.kind, process = %event.process, "dispatch");

        match event.kind {
            EventKind::Arrival => {
                self.handle_arrival(event.process)?;
                self.end_checker.log_arrival(self.clock);
            }
            EventKind::Departure => {
                self.handle_departure(event.process)?;
                self.end_checker.log_departure(self.clock);
            }
            EventKind::Preemption => self.handle_preemption(event.process)?,
        }

        Ok(Some(event))
    }

    /// Ready queue serving `cpu`
    fn queue_for_cpu(&self, cpu: usize) -> usize {
        match self.config.topology {
            QueueTopology::PerCpu => cpu,
            QueueTopology::Global => 0,
        }
    }

    /// Pick the CPU and ready queue an arriving process is addressed to
    ///
    /// Global queue: the affinity CPU if idle, else a random idle CPU, else the
    /// busy CPU with the most remaining work. Per-CPU queues: the affinity CPU,
    /// else a random CPU.
    fn route(&mut self, id: ProcessId) -> Result<(usize, usize)> {
        let affinity = self
            .processes
            .get(id)?
            .affinity
            .filter(|&cpu| cpu < self.cpus.len());

        match self.config.topology {
            QueueTopology::Global => {
                let idle = self.cpus.idle_slots();
                let cpu = match affinity {
                    Some(cpu) if idle.contains(&cpu) => cpu,
                    _ if !idle.is_empty() => idle[self.sampler.random_index(idle.len())],
                    _ => self.longest_running_cpu()?,
                };
                Ok((cpu, 0))
            }
            QueueTopology::PerCpu => {
                let cpu = match affinity {
                    Some(cpu) => cpu,
                    None => self.sampler.random_index(self.cpus.len()),
                };
                Ok((cpu, cpu))
            }
        }
    }

    /// Busy CPU whose occupant has the largest remaining time, lowest index on ties
    fn longest_running_cpu(&self) -> Result<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (cpu, occupant) in self.cpus.iter() {
            let Some(id) = occupant else { continue };
            let remaining = self.processes.get(id)?.remaining_at(self.clock);
            match best {
                Some((_, longest)) if remaining <= longest => {}
                _ => best = Some((cpu, remaining)),
            }
        }
        Ok(best.map(|(cpu, _)| cpu).unwrap_or(0))
    }

    /// Put a process on an idle CPU and schedule its departure
    fn start_on_cpu(&mut self, id: ProcessId, cpu: usize) -> Result<()> {
        self.cpus.assign(self.clock, &mut self.processes, id, cpu)?;
        let time_left = self.processes.get(id)?.time_left;
        self.events.schedule(EventKind::Departure, self.clock + time_left, id);
        Ok(())
    }

    /// Schedule the next arrival from the time source
    fn schedule_next_arrival(&mut self) -> Result<()> {
        if self.arrivals_exhausted {
            return Ok(());
        }

        match self.times.next_inter_arrival_time()? {
            Some(interval) => {
                let service_time = self.times.next_service_time()?;
                let arrival_time = self.clock + interval;
                let next = self.factory.create(service_time, arrival_time, self.sampler.as_mut());
                let next_id = self.processes.insert(next);
                self.events.schedule(EventKind::Arrival, arrival_time, next_id);
            }
            None => {
                debug!(clock = self.clock, "no further arrivals");
                self.arrivals_exhausted = true;
            }
        }
        Ok(())
    }

    /// Handle a process arriving to the system
    fn handle_arrival(&mut self, id: ProcessId) -> Result<()> {
        self.schedule_next_arrival()?;

        let (cpu, queue) = self.route(id)?;
        if self.cpus.is_idle(cpu)? {
            self.start_on_cpu(id, cpu)?;
            let process = self.processes.get(id)?;
            return narrate(
                &mut self.live_output,
                self.clock,
                LiveUpdateKind::ArrivalToCpu,
                process,
                &self.ready,
                None,
            );
        }

        if self.ready.policy().preempts_on_arrival() {
            self.check_preemption(id, cpu)?;
        }

        self.ready.insert(&mut self.processes, id, queue)?;
        self.stats.on_queue_size_changed(self.clock, &self.ready, queue)?;

        let process = self.processes.get(id)?;
        narrate(
            &mut self.live_output,
            self.clock,
            LiveUpdateKind::ArrivalToQueue,
            process,
            &self.ready,
            None,
        )
    }

    /// Schedule a preemption of `cpu`'s occupant if the arrival is shorter than its remaining time
    fn check_preemption(&mut self, arriving: ProcessId, cpu: usize) -> Result<()> {
        let Some(occupant_id) = self.cpus.occupant(cpu)? else {
            return Ok(());
        };

        let service_time = self.processes.get(arriving)?.service_time;
        let occupant = self.processes.get_mut(occupant_id)?;
        if occupant.preemption_pending {
            return Ok(());
        }

        let remaining = occupant.remaining_at(self.clock);
        if service_time < remaining {
            occupant.preemption_pending = true;
            self.events.schedule(EventKind::Preemption, self.clock, occupant_id);
            debug!(
                clock = self.clock,
                cpu,
                occupant = %occupant_id,
                arriving = %arriving,
                remaining,
                service_time,
                "preemption scheduled"
            );
        }
        Ok(())
    }

    /// Suspend the running process, requeue it and run the queue's next process
    fn handle_preemption(&mut self, id: ProcessId) -> Result<()> {
        let cpu = self
            .processes
            .get(id)?
            .cpu_index
            .ok_or(InvariantViolation::NotRunning(id))?;
        let found = self.cpus.occupant(cpu)?;
        if found != Some(id) {
            return Err(InvariantViolation::CpuMismatch {
                cpu,
                expected: id,
                found,
            }
            .into());
        }

        let (_, elapsed) = self.cpus.release(self.clock, &self.processes, cpu)?;
        self.stats.on_cpu_released(cpu, elapsed)?;
        if !self.events.cancel(EventKind::Departure, id) {
            return Err(InvariantViolation::MissingDeparture(id).into());
        }

        let process = self.processes.get_mut(id)?;
        process.time_left -= elapsed;
        process.preemption_pending = false;

        let queue = self.queue_for_cpu(cpu);
        self.ready.insert(&mut self.processes, id, queue)?;
        self.stats.on_queue_size_changed(self.clock, &self.ready, queue)?;

        let next = self.ready.dequeue(self.clock, &self.processes, queue)?;
        self.stats.on_queue_size_changed(self.clock, &self.ready, queue)?;
        self.start_on_cpu(next, cpu)?;

        if next == id {
            // Nothing shorter was waiting any more: same process, no handoff
            debug!(clock = self.clock, cpu, process = %id, "preempted process restarted");
            return Ok(());
        }

        self.preemptions += 1;
        let process = self.processes.get(id)?;
        let next = self.processes.get(next)?;
        narrate(
            &mut self.live_output,
            self.clock,
            LiveUpdateKind::Preemption,
            process,
            &self.ready,
            Some(next),
        )
    }

    /// Handle a process finishing on its CPU
    fn handle_departure(&mut self, id: ProcessId) -> Result<()> {
        let cpu = self
            .processes
            .get(id)?
            .cpu_index
            .ok_or(InvariantViolation::NotRunning(id))?;
        let found = self.cpus.occupant(cpu)?;
        if found != Some(id) {
            return Err(InvariantViolation::CpuMismatch {
                cpu,
                expected: id,
                found,
            }
            .into());
        }

        let (_, elapsed) = self.cpus.release(self.clock, &self.processes, cpu)?;
        self.stats.on_cpu_released(cpu, elapsed)?;
        let mut departed = self.processes.remove(id)?;
        departed.departure_time = Some(self.clock);
        self.stats.on_departure(&departed, self.clock);

        let queue = self.queue_for_cpu(cpu);
        if self.ready.is_empty(queue)? {
            return narrate(
                &mut self.live_output,
                self.clock,
                LiveUpdateKind::DepartureCpuIdle,
                &departed,
                &self.ready,
                None,
            );
        }

        let next = self.ready.dequeue(self.clock, &self.processes, queue)?;
        self.stats.on_queue_size_changed(self.clock, &self.ready, queue)?;
        self.start_on_cpu(next, cpu)?;

        let next = self.processes.get(next)?;
        narrate(
            &mut self.live_output,
            self.clock,
            LiveUpdateKind::DepartureNextProcess,
            &departed,
            &self.ready,
            Some(next),
        )
    }

    /// Verify the cross-structure invariants between CPUs, ready queues and events
    ///
    /// Every tracked process is exactly one of: running on the CPU its
    /// `cpu_index` names (with exactly one pending departure), waiting in the
    /// ready queue its `rq_index` names, or not yet arrived.
    pub fn check_invariants(&self) -> Result<()> {
        let conservation = |msg: String| -> SimError { InvariantViolation::Conservation(msg).into() };
        let mut seen: HashSet<ProcessId> = HashSet::new();

        for (cpu, occupant) in self.cpus.iter() {
            let Some(id) = occupant else { continue };
            let process = self.processes.get(id)?;
            if process.cpu_index != Some(cpu) {
                return Err(conservation(format!(
                    "process {id} on CPU {cpu} claims CPU {:?}",
                    process.cpu_index
                )));
            }
            let departures = self
                .events
                .iter()
                .filter(|e| e.kind == EventKind::Departure && e.process == id)
                .count();
            if departures != 1 {
                return Err(conservation(format!(
                    "running process {id} has {departures} pending departures"
                )));
            }
            if !seen.insert(id) {
                return Err(conservation(format!("process {id} runs on two CPUs")));
            }
        }

        for index in 0..self.ready.len() {
            let queue = self.ready.queue(index)?;
            if queue.len() != self.ready.size(index)? {
                return Err(conservation(format!("ready queue {index} size mismatch")));
            }
            for &id in queue {
                if self.processes.get(id)?.rq_index != Some(index) {
                    return Err(conservation(format!(
                        "process {id} in ready queue {index} has a different rq_index"
                    )));
                }
                if !seen.insert(id) {
                    return Err(conservation(format!(
                        "process {id} is both queued and running or queued twice"
                    )));
                }
            }
        }

        for event in self.events.iter() {
            if event.time < self.clock {
                return Err(conservation(format!(
                    "event at {} is in the past (clock {})",
                    event.time, self.clock
                )));
            }
            if event.kind == EventKind::Arrival && !seen.insert(event.process) {
                return Err(conservation(format!(
                    "process {} is pending arrival while already in the system",
                    event.process
                )));
            }
            if event.kind == EventKind::Departure && self.cpus.iter().all(|(_, p)| p != Some(event.process)) {
                return Err(conservation(format!(
                    "departure pending for process {} that is not running",
                    event.process
                )));
            }
        }

        if seen.len() != self.processes.len() {
            return Err(conservation(format!(
                "{} processes tracked but {} accounted for",
                self.processes.len(),
                seen.len()
            )));
        }
        Ok(())
    }

    /// Compute the run's metrics at the current clock
    pub fn results(&mut self) -> Result<SimulationResult> {
        let total_time = self.clock;
        if self.stats.completed() == 0 {
            warn!(clock = total_time, "no process completed during the run");
        }

        let cpu_utilization = (0..self.cpus.len())
            .map(|cpu| self.stats.utilization(total_time, cpu))
            .collect::<Result<Vec<_>>>()?;
        let average_queue_lengths = (0..self.ready.len())
            .map(|queue| self.stats.average_queue_length(total_time, queue))
            .collect::<Result<Vec<_>>>()?;

        Ok(SimulationResult {
            scheduler: self.ready.policy().name().to_string(),
            topology: self.config.topology,
            num_cpus: self.cpus.len(),
            total_time,
            arrivals: self.end_checker.arrivals(),
            departures: self.end_checker.departures(),
            preemptions: self.preemptions,
            average_turnaround_time: self.stats.average_turnaround_time(),
            throughput: self.stats.throughput(total_time),
            cpu_utilization,
            average_queue_lengths,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn has_ended(&self) -> bool {
        self.end_checker.has_ended()
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn cpus(&self) -> &CpuPool {
        &self.cpus
    }

    pub fn ready(&self) -> &ReadyQueueSet {
        &self.ready
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Preemptions that handed the CPU to a different process
    pub fn preemptions(&self) -> u64 {
        self.preemptions
    }
}
