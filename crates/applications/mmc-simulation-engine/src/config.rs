//! Run parameters for a simulation
//!
//! Every field has a default so a config file only needs to name the
//! parameters it changes:
//!
//! ```json
//! { "arrival_rate": 0.9, "scheduler": "srtf", "num_cpus": 2,
//!   "end_condition": { "kind": "processes_departed", "count": 5000 } }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::types::{QueueTopology, SchedulerKind};

pub const DEFAULT_N: u64 = 10_000;
pub const DEFAULT_TIME_LIMIT: f64 = 100.0;

/// When the run stops
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndCondition {
    ProcessesArrived { count: u64 },
    ProcessesDeparted { count: u64 },
    TimeLimit { seconds: f64 },
}

impl Default for EndCondition {
    fn default() -> Self {
        EndCondition::ProcessesDeparted { count: DEFAULT_N }
    }
}

/// How the average ready-queue occupancy is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueLengthMethod {
    /// Fixed-interval sampling at half the mean inter-arrival time
    #[default]
    Sampled,
    /// Occupancy integrated exactly between size changes
    Exact,
}

/// Parameters consumed when a simulator is constructed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub arrival_rate: f64,      // Processes per second (lambda)
    pub mean_service_time: f64, // Seconds
    pub scheduler: SchedulerKind,
    pub topology: QueueTopology,
    pub num_cpus: usize,
    pub end_condition: EndCondition,
    pub affinity_probability: f64,
    pub queue_length_method: QueueLengthMethod,
    pub live_updates: bool,
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            arrival_rate: 1.0,
            mean_service_time: 1.0,
            scheduler: SchedulerKind::Fcfs,
            topology: QueueTopology::Global,
            num_cpus: 1,
            end_condition: EndCondition::default(),
            affinity_probability: 0.0,
            queue_length_method: QueueLengthMethod::Sampled,
            live_updates: false,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| SimError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: SimConfig = serde_json::from_str(text)
            .map_err(|e| SimError::config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Number of ready queues implied by the topology
    pub fn num_queues(&self) -> usize {
        self.topology.queue_count(self.num_cpus)
    }

    /// Reject parameters the simulation cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.arrival_rate.is_finite() && self.arrival_rate > 0.0) {
            return Err(SimError::config(format!(
                "arrival rate must be positive, got {}",
                self.arrival_rate
            )));
        }
        if !(self.mean_service_time.is_finite() && self.mean_service_time > 0.0) {
            return Err(SimError::config(format!(
                "mean service time must be positive, got {}",
                self.mean_service_time
            )));
        }
        if self.num_cpus == 0 {
            return Err(SimError::config("number of CPUs must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.affinity_probability) {
            return Err(SimError::config(format!(
                "affinity probability must be within [0, 1], got {}",
                self.affinity_probability
            )));
        }
        match self.end_condition {
            EndCondition::ProcessesArrived { count } | EndCondition::ProcessesDeparted { count } => {
                if count == 0 {
                    return Err(SimError::config("process count must be positive"));
                }
            }
            EndCondition::TimeLimit { seconds } => {
                if !(seconds.is_finite() && seconds > 0.0) {
                    return Err(SimError::config(format!(
                        "time limit must be positive, got {seconds}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_queues(), 1);
        assert_eq!(config.end_condition, EndCondition::ProcessesDeparted { count: 10_000 });
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let mut config = SimConfig::default();
        config.arrival_rate = 0.0;
        assert!(matches!(config.validate(), Err(SimError::Config(_))));

        let mut config = SimConfig::default();
        config.mean_service_time = -1.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.num_cpus = 0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.end_condition = EndCondition::TimeLimit { seconds: 0.0 };
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.affinity_probability = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config = SimConfig::from_json_str(
            r#"{ "scheduler": "hrrn", "topology": "per-cpu", "num_cpus": 3,
                 "end_condition": { "kind": "time_limit", "seconds": 50.0 } }"#,
        )
        .unwrap();

        assert_eq!(config.scheduler, SchedulerKind::Hrrn);
        assert_eq!(config.num_queues(), 3);
        assert_eq!(config.arrival_rate, 1.0);
        assert_eq!(config.end_condition, EndCondition::TimeLimit { seconds: 50.0 });
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        assert!(matches!(
            SimConfig::from_json_str(r#"{ "scheduler": "lottery" }"#),
            Err(SimError::Config(_))
        ));
        assert!(SimConfig::from_json_str(r#"{ "num_cpus": 0 }"#).is_err());
    }
}
