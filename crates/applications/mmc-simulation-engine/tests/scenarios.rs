//! End-to-end scenarios driving the simulator through its public API

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use mmc_simulation_engine::{
    EndCondition, QueueTopology, SchedulerKind, SimConfig, Simulator,
    event_queue::Event,
    generators::{ScriptedTimes, UniformSampler},
    output::TerminalOutput,
    process::ProcessTable,
    ready_queue::ReadyQueueSet,
    types::{EventKind, Process, ProcessId},
};

fn scripted(config: SimConfig, jobs: &[(f64, f64)]) -> Simulator {
    Simulator::with_sources(
        config,
        Box::new(ScriptedTimes::from_arrivals(jobs)),
        Box::new(UniformSampler::new(Some(7))),
    )
    .unwrap()
}

fn single_cpu(scheduler: SchedulerKind, departures: u64) -> SimConfig {
    SimConfig {
        scheduler,
        topology: QueueTopology::Global,
        num_cpus: 1,
        end_condition: EndCondition::ProcessesDeparted { count: departures },
        ..SimConfig::default()
    }
}

/// Step to completion, checking invariants after every event
fn drive(simulator: &mut Simulator) -> Vec<Event> {
    let mut handled = Vec::new();
    while !simulator.has_ended() {
        match simulator.step().unwrap() {
            Some(event) => handled.push(event),
            None => break,
        }
        simulator.check_invariants().unwrap();
    }
    handled
}

fn departures(events: &[Event]) -> Vec<(u64, f64)> {
    events
        .iter()
        .filter(|e| e.kind == EventKind::Departure)
        .map(|e| (e.process.0, e.time))
        .collect()
}

/// Writer whose buffer stays readable after the simulator takes ownership
#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn text(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

#[test]
fn test_fcfs_single_cpu_departs_in_arrival_order() {
    let mut simulator = scripted(
        single_cpu(SchedulerKind::Fcfs, 3),
        &[(0.0, 2.0), (0.5, 1.0), (0.6, 3.0)],
    );

    let events = drive(&mut simulator);
    assert_eq!(departures(&events), vec![(0, 2.0), (1, 3.0), (2, 6.0)]);

    let result = simulator.results().unwrap();
    assert_eq!(result.departures, 3);
    assert_eq!(result.preemptions, 0);
    assert_eq!(result.total_time, 6.0);
    // (2 + 2.5 + 5.4) / 3
    assert!((result.average_turnaround_time - 3.3).abs() < 1e-9);
}

#[test]
fn test_srtf_preempts_longer_running_process() {
    let buffer = SharedBuffer::default();
    let mut simulator = scripted(single_cpu(SchedulerKind::Srtf, 2), &[(0.0, 5.0), (2.0, 1.0)])
        .with_live_output(Box::new(TerminalOutput::new(buffer.clone())));

    let events = drive(&mut simulator);

    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Arrival,
            EventKind::Arrival,
            EventKind::Preemption,
            EventKind::Departure,
            EventKind::Departure,
        ]
    );
    assert_eq!(departures(&events), vec![(1, 3.0), (0, 6.0)]);
    assert_eq!(simulator.preemptions(), 1);

    let text = buffer.text();
    assert!(text.contains("Process 0 was preempted after running for 2.0000 seconds on CPU 0"));
    assert!(text.contains("process 1 (1.0000) started running on CPU 0"));
    assert!(text.contains("Process 0 (3.0000) moving to CPU 0"));
}

#[test]
fn test_preempted_process_resumes_with_remaining_time() {
    let mut simulator = scripted(single_cpu(SchedulerKind::Srtf, 2), &[(0.0, 5.0), (2.0, 1.0)]);

    for _ in 0..3 {
        simulator.step().unwrap();
    }

    // A is back in the ready queue with 3 seconds left, one departure pending for B
    let a = simulator.processes().get(ProcessId(0)).unwrap();
    assert_eq!(a.time_left, 3.0);
    assert_eq!(a.cpu_index, Some(0));
    assert_eq!(simulator.ready().size(0).unwrap(), 1);

    let pending: Vec<(EventKind, u64, f64)> = simulator
        .events()
        .iter()
        .map(|e| (e.kind, e.process.0, e.time))
        .collect();
    assert_eq!(pending, vec![(EventKind::Departure, 1, 3.0)]);
    simulator.check_invariants().unwrap();
}

#[test]
fn test_shorter_arrival_without_advantage_does_not_preempt() {
    // Remaining 3 at t=2 equals the arrival's service time: no preemption
    let mut simulator = scripted(single_cpu(SchedulerKind::Srtf, 2), &[(0.0, 5.0), (2.0, 3.0)]);

    let events = drive(&mut simulator);
    assert!(events.iter().all(|e| e.kind != EventKind::Preemption));
    assert_eq!(departures(&events), vec![(0, 5.0), (1, 8.0)]);
}

#[test]
fn test_simultaneous_shorter_arrivals_preempt_once() {
    let mut simulator = scripted(
        single_cpu(SchedulerKind::Srtf, 3),
        &[(0.0, 5.0), (2.0, 1.0), (2.0, 0.5)],
    );

    let events = drive(&mut simulator);
    let preemptions = events.iter().filter(|e| e.kind == EventKind::Preemption).count();
    assert_eq!(preemptions, 1);
    assert_eq!(simulator.preemptions(), 1);
    // The cancelled departure of process 0 at t=5 never fires
    assert_eq!(departures(&events), vec![(2, 2.5), (1, 3.5), (0, 6.5)]);
}

#[test]
fn test_preempted_process_resuming_elsewhere_splits_busy_time() {
    let config = SimConfig {
        num_cpus: 2,
        ..single_cpu(SchedulerKind::Srtf, 3)
    };
    let mut simulator = scripted(config, &[(0.0, 10.0), (0.1, 0.5), (0.2, 1.0)]);

    let events = drive(&mut simulator);
    assert_eq!(simulator.preemptions(), 1);
    assert_eq!(departures(&events).len(), 3);

    let result = simulator.results().unwrap();
    assert!((result.total_time - 10.4).abs() < 1e-9);

    // One CPU ran 0.2 of process 0 then process 2; the other ran process 1 then the rest of process 0
    let mut utilization = result.cpu_utilization.clone();
    utilization.sort_by(f64::total_cmp);
    assert!((utilization[0] - 1.2 / 10.4).abs() < 1e-9);
    assert!((utilization[1] - 10.3 / 10.4).abs() < 1e-9);
    assert!(utilization.iter().all(|&u| u <= 1.0));

    let busy: f64 = result.cpu_utilization.iter().map(|u| u * result.total_time).sum();
    assert!((busy - 11.5).abs() < 1e-9);
}

#[test]
fn test_hrrn_dequeues_highest_response_ratio() {
    let mut processes = ProcessTable::new();
    processes.insert(Process::new(ProcessId(1), 4.0, 0.0));
    processes.insert(Process::new(ProcessId(2), 1.0, 1.0));

    let mut ready = ReadyQueueSet::new(SchedulerKind::Hrrn, 1);
    ready.insert(&mut processes, ProcessId(1), 0).unwrap();
    ready.insert(&mut processes, ProcessId(2), 0).unwrap();

    assert_eq!(processes.get(ProcessId(1)).unwrap().response_ratio(5.0), 2.25);
    assert_eq!(processes.get(ProcessId(2)).unwrap().response_ratio(5.0), 5.0);
    assert_eq!(ready.dequeue(5.0, &processes, 0).unwrap(), ProcessId(2));
    assert_eq!(ready.dequeue(5.0, &processes, 0).unwrap(), ProcessId(1));
    assert!(ready.dequeue(5.0, &processes, 0).is_err());
}

#[test]
fn test_busy_cpu_utilization_and_throughput_are_exact() {
    // Every arrival lands before the previous departure: the CPU never idles
    let jobs = [(0.0, 1.0), (0.5, 0.5), (0.75, 0.25), (1.25, 0.25)];
    let mut simulator = scripted(single_cpu(SchedulerKind::Fcfs, 4), &jobs);

    let result = simulator.run().unwrap();
    assert_eq!(result.total_time, 2.0);
    assert_eq!(result.departures, 4);
    assert_eq!(result.cpu_utilization, vec![1.0]);
    assert_eq!(result.throughput, 2.0);
}

#[test]
fn test_sjf_runs_shortest_waiting_job_next() {
    let mut simulator = scripted(
        single_cpu(SchedulerKind::Sjf, 3),
        &[(0.0, 4.0), (1.0, 2.0), (2.0, 1.0)],
    );

    let events = drive(&mut simulator);
    assert_eq!(departures(&events), vec![(0, 4.0), (2, 5.0), (1, 7.0)]);
}

#[test]
fn test_time_limit_ends_run() {
    let config = SimConfig {
        arrival_rate: 2.0,
        mean_service_time: 0.4,
        num_cpus: 2,
        end_condition: EndCondition::TimeLimit { seconds: 25.0 },
        seed: Some(11),
        ..SimConfig::default()
    };
    let mut simulator = Simulator::new(config).unwrap();

    let result = simulator.run().unwrap();
    assert!(simulator.has_ended());
    assert!(result.total_time >= 25.0);
    assert!(result.arrivals > 0);
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let config = SimConfig {
        arrival_rate: 3.0,
        mean_service_time: 0.5,
        scheduler: SchedulerKind::Hrrn,
        num_cpus: 2,
        end_condition: EndCondition::ProcessesDeparted { count: 200 },
        seed: Some(42),
        ..SimConfig::default()
    };

    let first = Simulator::new(config.clone()).unwrap().run().unwrap();
    let second = Simulator::new(config).unwrap().run().unwrap();
    assert_eq!(first.total_time, second.total_time);
    assert_eq!(first.average_turnaround_time, second.average_turnaround_time);
    assert_eq!(first.cpu_utilization, second.cpu_utilization);
}

#[test]
fn test_invariants_hold_for_every_policy_and_topology() {
    for scheduler in SchedulerKind::ALL {
        for topology in [QueueTopology::Global, QueueTopology::PerCpu] {
            for (num_cpus, affinity_probability) in [(1, 0.0), (3, 0.0), (4, 0.5)] {
                let config = SimConfig {
                    arrival_rate: 2.5 * num_cpus as f64,
                    mean_service_time: 0.35,
                    scheduler,
                    topology,
                    num_cpus,
                    affinity_probability,
                    end_condition: EndCondition::ProcessesDeparted { count: 300 },
                    seed: Some(2024),
                    ..SimConfig::default()
                };
                let mut simulator = Simulator::new(config).unwrap();
                drive(&mut simulator);

                let result = simulator.results().unwrap();
                assert_eq!(result.departures, 300, "{scheduler} {topology} x{num_cpus}");
                assert_eq!(result.average_queue_lengths.len(), topology.queue_count(num_cpus));
                let mean_utilization =
                    result.cpu_utilization.iter().sum::<f64>() / num_cpus as f64;
                assert!(result.cpu_utilization.iter().all(|&u| (0.0..=1.0 + 1e-9).contains(&u)));
                assert!(mean_utilization <= 1.0 + 1e-9);
                if scheduler != SchedulerKind::Srtf {
                    assert_eq!(result.preemptions, 0);
                }
            }
        }
    }
}

#[test]
fn test_invalid_inputs_are_rejected() {
    let bad_rate = SimConfig {
        arrival_rate: 0.0,
        ..SimConfig::default()
    };
    assert!(Simulator::new(bad_rate).is_err());

    let bad_trace = Simulator::with_sources(
        SimConfig::default(),
        Box::new(ScriptedTimes::new(&[1.0, 1.0], &[-1.0])),
        Box::new(UniformSampler::new(Some(0))),
    )
    .unwrap()
    .run();
    assert!(bad_trace.is_err());

    assert!(SimConfig::from_json_str(r#"{"num_cpus": 0}"#).is_err());
    assert!("round-robin".parse::<SchedulerKind>().is_err());
}
