//! M/M/c Simulation Engine CLI
//!
//! Command-line interface for running multi-CPU queuing simulations and
//! comparing ready-queue scheduling policies on the same workload.

use anyhow::{Context, bail};
use clap::Parser;
use std::fs;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mmc_simulation_engine::{
    config::{DEFAULT_N, DEFAULT_TIME_LIMIT},
    generators::{ScriptedTimes, UniformSampler},
    output::{Metric, Output, TerminalOutput},
    EndCondition, QueueLengthMethod, QueueTopology, SchedulerKind, SimConfig, SimulationResult,
    Simulator,
};

#[derive(Parser, Debug)]
#[command(name = "mmc-sim")]
#[command(about = "Simulate a multi-CPU queuing system under different schedulers", long_about = None)]
struct Args {
    /// JSON config file to start from (flags override its values)
    #[arg(long)]
    config: Option<String>,

    /// Average arrival rate (processes per second)
    #[arg(short, long)]
    arrival_rate: Option<f64>,

    /// Average service time (seconds)
    #[arg(short, long)]
    service_time: Option<f64>,

    /// Schedulers to compare (comma-separated: fcfs,sjf,srtf,hrrn or "all")
    #[arg(long)]
    schedulers: Option<String>,

    /// Number of CPUs
    #[arg(short, long)]
    cpus: Option<usize>,

    /// Ready queue setup: per-cpu or global
    #[arg(long)]
    topology: Option<String>,

    /// End condition: arrived, departed or time
    #[arg(short, long)]
    end_condition: Option<String>,

    /// Number of processes for the arrived/departed end conditions
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Time limit (seconds) for the time end condition
    #[arg(short, long)]
    time_limit: Option<f64>,

    /// Probability that a new process prefers a specific CPU
    #[arg(long)]
    affinity: Option<f64>,

    /// Integrate queue occupancy exactly instead of sampling it
    #[arg(long)]
    exact_queue_length: bool,

    /// Print every arrival, departure and preemption as it happens
    #[arg(long)]
    live: bool,

    /// Random seed (shared by every compared scheduler)
    #[arg(long)]
    seed: Option<u64>,

    /// Replay a fixed workload from JSON ({"service_times": [...], "inter_arrival_times": [...]})
    #[arg(long)]
    trace: Option<String>,

    /// Output JSON file path (optional)
    #[arg(short, long)]
    output: Option<String>,
}

/// Apply command-line overrides on top of the base configuration
fn build_config(args: &Args) -> anyhow::Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::from_json_file(path)?,
        None => SimConfig::default(),
    };

    if let Some(rate) = args.arrival_rate {
        config.arrival_rate = rate;
    }
    if let Some(service_time) = args.service_time {
        config.mean_service_time = service_time;
    }
    if let Some(cpus) = args.cpus {
        config.num_cpus = cpus;
    }
    if let Some(topology) = &args.topology {
        config.topology = topology.parse::<QueueTopology>()?;
    }
    if let Some(probability) = args.affinity {
        config.affinity_probability = probability;
    }
    if args.exact_queue_length {
        config.queue_length_method = QueueLengthMethod::Exact;
    }
    if args.live {
        config.live_updates = true;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config.end_condition = match args.end_condition.as_deref() {
        Some("arrived" | "0") => EndCondition::ProcessesArrived {
            count: args.count.unwrap_or(DEFAULT_N),
        },
        Some("departed" | "1") => EndCondition::ProcessesDeparted {
            count: args.count.unwrap_or(DEFAULT_N),
        },
        Some("time" | "2") => EndCondition::TimeLimit {
            seconds: args.time_limit.unwrap_or(DEFAULT_TIME_LIMIT),
        },
        Some(other) => bail!("Unknown end condition: {other}"),
        None => match (config.end_condition, args.count, args.time_limit) {
            (_, _, Some(seconds)) => EndCondition::TimeLimit { seconds },
            (EndCondition::ProcessesArrived { .. }, Some(count), None) => {
                EndCondition::ProcessesArrived { count }
            }
            (_, Some(count), None) => EndCondition::ProcessesDeparted { count },
            (current, None, None) => current,
        },
    };

    config.validate()?;
    Ok(config)
}

/// Parse the scheduler list; defaults to the configured scheduler
fn parse_schedulers(list: Option<&str>, fallback: SchedulerKind) -> anyhow::Result<Vec<SchedulerKind>> {
    match list {
        None => Ok(vec![fallback]),
        Some(list) if list.trim().eq_ignore_ascii_case("all") => Ok(SchedulerKind::ALL.to_vec()),
        Some(list) => list
            .split(',')
            .map(|name| name.parse::<SchedulerKind>().map_err(anyhow::Error::from))
            .collect(),
    }
}

fn print_metrics(out: &mut dyn Output, result: &SimulationResult) -> anyhow::Result<()> {
    out.print_metric(Metric::AverageTurnaroundTime, &[result.average_turnaround_time])?;
    out.print_metric(Metric::TotalThroughput, &[result.throughput])?;
    out.print_metric(Metric::CpuUtilization, &result.cpu_utilization)?;
    out.print_metric(Metric::AverageProcessesInQueue, &result.average_queue_lengths)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mmc_sim=info,mmc_simulation_engine=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut config = build_config(&args)?;
    let schedulers = parse_schedulers(args.schedulers.as_deref(), config.scheduler)?;

    // Same seed for every scheduler so they see the same workload
    let seed = config.seed.unwrap_or_else(rand::random);
    config.seed = Some(seed);

    let trace: Option<ScriptedTimes> = match &args.trace {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("Failed to read trace {path}"))?;
            Some(serde_json::from_str(&text).with_context(|| format!("Invalid trace {path}"))?)
        }
        None => None,
    };

    let mut out = TerminalOutput::stdout();
    out.print_title()?;

    println!("Configuration:");
    println!("  Arrival rate: {} processes/s", config.arrival_rate);
    println!("  Mean service time: {} s", config.mean_service_time);
    println!("  CPUs: {} ({} ready queue)", config.num_cpus, config.topology);
    println!("  End condition: {:?}", config.end_condition);
    println!("  Seed: {seed}\n");

    out.print_header("Initialization Complete")?;

    let mut results = Vec::new();

    for scheduler in &schedulers {
        let run_config = SimConfig {
            scheduler: *scheduler,
            ..config.clone()
        };

        let simulator = match &trace {
            Some(trace) => Simulator::with_sources(
                run_config,
                Box::new(trace.clone()),
                Box::new(UniformSampler::new(Some(seed.wrapping_add(1)))),
            )?,
            None => Simulator::new(run_config)?,
        };
        let mut simulator = if config.live_updates {
            simulator.with_live_output(Box::new(TerminalOutput::stdout()))
        } else {
            simulator
        };

        info!(scheduler = %scheduler, "running simulation");
        let result = simulator.run()?;

        out.print_header(&format!("{scheduler} Simulation Complete"))?;
        print_metrics(&mut out, &result)?;
        results.push(result);
    }

    out.print_header("Statistics Complete")?;

    // Comparison table
    if results.len() > 1 {
        println!(
            "{:<10} {:>12} {:>12} {:>14} {:>12} {:>12}",
            "Scheduler", "Turnaround", "Throughput", "Utilization", "Avg Queue", "Preemptions"
        );
        println!("{}", "-".repeat(77));

        for result in &results {
            let utilization =
                result.cpu_utilization.iter().sum::<f64>() / result.cpu_utilization.len() as f64;
            let queue_length: f64 = result.average_queue_lengths.iter().sum();
            println!(
                "{:<10} {:>12.4} {:>12.4} {:>14.4} {:>12.4} {:>12}",
                result.scheduler,
                result.average_turnaround_time,
                result.throughput,
                utilization,
                queue_length,
                result.preemptions,
            );
        }
        println!();
    }

    // Output to JSON if requested
    if let Some(output_path) = args.output {
        println!("Writing results to {}...", output_path);
        let json = serde_json::to_string_pretty(&results)?;
        fs::write(&output_path, json).with_context(|| format!("Failed to write {output_path}"))?;
        println!("  Results saved");
    }

    println!("\n✅ Simulation complete!\n");
    Ok(())
}
