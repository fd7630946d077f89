//! Rendering of banners, metrics and live event narration

use std::io::{self, Write};

use crate::ready_queue::ReadyQueueSet;
use crate::types::Process;

const LINE_WIDTH: usize = 58;

/// Metrics reported after a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    AverageTurnaroundTime,
    TotalThroughput,
    CpuUtilization,
    AverageProcessesInQueue,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::AverageTurnaroundTime => "Average Turnaround Time",
            Metric::TotalThroughput => "Total Throughput",
            Metric::CpuUtilization => "CPU Utilization",
            Metric::AverageProcessesInQueue => "Average Number of Processes in the Ready Queue",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::AverageTurnaroundTime => "seconds",
            Metric::TotalThroughput => "processes per second",
            Metric::CpuUtilization => "",
            Metric::AverageProcessesInQueue => "processes",
        }
    }

    /// Label for one entry of a per-CPU or per-queue sequence
    fn item_label(&self) -> &'static str {
        match self {
            Metric::AverageProcessesInQueue => "Queue",
            _ => "CPU",
        }
    }
}

/// What happened at a narrated event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveUpdateKind {
    ArrivalToCpu,
    ArrivalToQueue,
    DepartureCpuIdle,
    DepartureNextProcess,
    Preemption,
}

/// One narrated event
pub struct LiveUpdate<'a> {
    pub clock: f64,
    pub kind: LiveUpdateKind,
    /// The arriving, departing or preempted process
    pub process: &'a Process,
    pub ready: &'a ReadyQueueSet,
    /// The process that starts running as a consequence, if any
    pub next: Option<&'a Process>,
}

/// Sink for everything a run reports to the user
pub trait Output {
    fn print_title(&mut self) -> io::Result<()>;
    fn print_header(&mut self, message: &str) -> io::Result<()>;
    fn print_metric(&mut self, metric: Metric, values: &[f64]) -> io::Result<()>;
    fn print_live_update(&mut self, update: &LiveUpdate<'_>) -> io::Result<()>;
}

/// Plain-text output to a terminal (or any writer)
pub struct TerminalOutput<W: Write> {
    out: W,
}

impl TerminalOutput<io::Stdout> {
    pub fn stdout() -> Self {
        TerminalOutput { out: io::stdout() }
    }
}

impl<W: Write> TerminalOutput<W> {
    pub fn new(out: W) -> Self {
        TerminalOutput { out }
    }

    fn banner(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "╔{}╗", "═".repeat(LINE_WIDTH))?;
        writeln!(self.out, "║  {:<width$}║", message, width = LINE_WIDTH - 2)?;
        writeln!(self.out, "╚{}╝", "═".repeat(LINE_WIDTH))?;
        writeln!(self.out)
    }
}

fn cpu_label(process: &Process) -> String {
    process
        .cpu_index
        .map(|cpu| cpu.to_string())
        .unwrap_or_else(|| "?".to_string())
}

impl<W: Write> Output for TerminalOutput<W> {
    fn print_title(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.banner("DISCRETE EVENT M/M/c SIMULATOR")
    }

    fn print_header(&mut self, message: &str) -> io::Result<()> {
        self.banner(message)
    }

    fn print_metric(&mut self, metric: Metric, values: &[f64]) -> io::Result<()> {
        let unit = metric.unit();
        if let [value] = values {
            writeln!(self.out, "{}: {:.4} {}", metric.label(), value, unit)?;
        } else {
            writeln!(self.out, "{}:", metric.label())?;
            for (index, value) in values.iter().enumerate() {
                writeln!(self.out, "    {} {}: {:.4} {}", metric.item_label(), index, value, unit)?;
            }
        }
        writeln!(self.out)
    }

    fn print_live_update(&mut self, update: &LiveUpdate<'_>) -> io::Result<()> {
        let process = update.process;
        let cpu = cpu_label(process);
        write!(self.out, "{:.4} | ", update.clock)?;

        match (update.kind, update.next) {
            (LiveUpdateKind::ArrivalToCpu, _) => write!(
                self.out,
                "Process {} arrived. CPU {cpu} was idle, so process {} ({:.4}) started running on CPU {cpu}.",
                process.id, process.id, process.service_time
            )?,
            (LiveUpdateKind::ArrivalToQueue, _) => {
                let queue = process.rq_index.unwrap_or(0);
                let size = update.ready.size(queue).unwrap_or(0);
                if update.ready.is_global() {
                    write!(
                        self.out,
                        "Process {} arrived. No CPU was idle, so the process was added to the Ready Queue ({size}).",
                        process.id
                    )?;
                } else {
                    write!(
                        self.out,
                        "Process {} arrived. CPU {queue} was busy, so the process was added to Ready Queue {queue} ({size}).",
                        process.id
                    )?;
                }
            }
            (LiveUpdateKind::DepartureNextProcess, Some(next)) => write!(
                self.out,
                "Process {} departed from CPU {cpu}. Process {} ({:.4}) moving to CPU {cpu}.",
                process.id, next.id, next.time_left
            )?,
            (LiveUpdateKind::DepartureCpuIdle, _) | (LiveUpdateKind::DepartureNextProcess, None) => {
                write!(
                    self.out,
                    "Process {} departed from CPU {cpu}. CPU {cpu} is now idle.",
                    process.id
                )?
            }
            (LiveUpdateKind::Preemption, next) => {
                let queue = process.rq_index.unwrap_or(0);
                let size = update.ready.size(queue).unwrap_or(0);
                write!(
                    self.out,
                    "Process {} was preempted after running for {:.4} seconds on CPU {cpu}. \
                     The process was added to Ready Queue {queue} ({size})",
                    process.id,
                    update.clock - process.last_run_time
                )?;
                match next {
                    Some(next) => write!(
                        self.out,
                        " and process {} ({:.4}) started running on CPU {}.",
                        next.id,
                        next.time_left,
                        cpu_label(next)
                    )?,
                    None => write!(self.out, ".")?,
                }
            }
        }

        writeln!(self.out)
    }
}
