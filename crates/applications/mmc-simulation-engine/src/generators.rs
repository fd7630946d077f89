//! Interval and index generation
//!
//! Inter-arrival and service times are exponentially distributed (Poisson
//! arrivals, exponential service), giving the M/M/c model. A scripted source
//! replays fixed intervals for deterministic runs and trace replay.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Source of inter-arrival and service times
pub trait TimeSource {
    /// Time until the next arrival, or `None` once no further processes will arrive
    fn next_inter_arrival_time(&mut self) -> Result<Option<f64>>;

    /// CPU time required by the next process
    fn next_service_time(&mut self) -> Result<f64>;
}

/// Uniform random choices used for CPU routing and affinity
pub trait IndexSampler {
    /// Uniform index in `[0, bound)`
    fn random_index(&mut self, bound: usize) -> usize;

    /// Uniform float in `[0, 1)`
    fn random_unit(&mut self) -> f64;
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Reject samples that indicate a misconfigured rate
fn checked(sample: f64, what: &str) -> Result<f64> {
    if sample.is_nan() {
        return Err(SimError::generator(format!("{what} is NaN")));
    }
    if sample.is_infinite() {
        return Err(SimError::generator(format!("{what} is infinite")));
    }
    Ok(sample)
}

/// Exponential inter-arrival and service time generator
pub struct ExponentialTimes {
    inter_arrival: Exp<f64>,
    service: Exp<f64>,
    rng: StdRng,
}

impl ExponentialTimes {
    /// Create a generator
    ///
    /// # Arguments
    /// * `arrival_rate` - Mean arrivals per second (lambda)
    /// * `mean_service_time` - Mean service time in seconds
    /// * `seed` - Fixed seed for reproducible runs, or `None` for entropy
    pub fn new(arrival_rate: f64, mean_service_time: f64, seed: Option<u64>) -> Result<Self> {
        let inter_arrival = Exp::new(arrival_rate)
            .map_err(|e| SimError::generator(format!("arrival rate {arrival_rate}: {e}")))?;
        let service = Exp::new(1.0 / mean_service_time).map_err(|e| {
            SimError::generator(format!("mean service time {mean_service_time}: {e}"))
        })?;

        Ok(ExponentialTimes {
            inter_arrival,
            service,
            rng: seeded_rng(seed),
        })
    }
}

impl TimeSource for ExponentialTimes {
    fn next_inter_arrival_time(&mut self) -> Result<Option<f64>> {
        let sample = self.inter_arrival.sample(&mut self.rng);
        checked(sample, "interarrival time").map(Some)
    }

    fn next_service_time(&mut self) -> Result<f64> {
        let sample = self.service.sample(&mut self.rng);
        checked(sample, "service time")
    }
}

/// Replays a fixed workload
///
/// The first process arrives at time 0 and takes the first service time;
/// each following process arrives after the next inter-arrival time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptedTimes {
    pub service_times: VecDeque<f64>,
    pub inter_arrival_times: VecDeque<f64>,
}

impl ScriptedTimes {
    pub fn new(service_times: &[f64], inter_arrival_times: &[f64]) -> Self {
        ScriptedTimes {
            service_times: service_times.iter().copied().collect(),
            inter_arrival_times: inter_arrival_times.iter().copied().collect(),
        }
    }

    /// Build from absolute `(arrival_time, service_time)` pairs sorted by arrival
    pub fn from_arrivals(jobs: &[(f64, f64)]) -> Self {
        let service_times = jobs.iter().map(|&(_, service)| service).collect();
        let inter_arrival_times = jobs
            .windows(2)
            .map(|pair| pair[1].0 - pair[0].0)
            .collect();

        ScriptedTimes {
            service_times,
            inter_arrival_times,
        }
    }
}

impl TimeSource for ScriptedTimes {
    fn next_inter_arrival_time(&mut self) -> Result<Option<f64>> {
        match self.inter_arrival_times.pop_front() {
            Some(interval) if interval < 0.0 => Err(SimError::generator(format!(
                "negative interarrival time {interval}"
            ))),
            Some(interval) => checked(interval, "interarrival time").map(Some),
            None => Ok(None),
        }
    }

    fn next_service_time(&mut self) -> Result<f64> {
        let service = self
            .service_times
            .pop_front()
            .ok_or_else(|| SimError::generator("scripted workload has no service time left"))?;
        checked(service, "service time")
    }
}

/// Uniform sampler backed by a seedable RNG
pub struct UniformSampler {
    rng: StdRng,
}

impl UniformSampler {
    pub fn new(seed: Option<u64>) -> Self {
        UniformSampler {
            rng: seeded_rng(seed),
        }
    }
}

impl IndexSampler for UniformSampler {
    fn random_index(&mut self, bound: usize) -> usize {
        if bound <= 1 {
            return 0;
        }
        self.rng.gen_range(0..bound)
    }

    fn random_unit(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }
}
