//! Decides when a run is over

use crate::config::EndCondition;

#[derive(Debug, Clone)]
pub struct EndChecker {
    condition: EndCondition,
    arrivals: u64,
    departures: u64,
    ended: bool,
}

impl EndChecker {
    pub fn new(condition: EndCondition) -> Self {
        EndChecker {
            condition,
            arrivals: 0,
            departures: 0,
            ended: false,
        }
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Record an arrival handled at `clock`
    pub fn log_arrival(&mut self, clock: f64) {
        self.arrivals += 1;

        match self.condition {
            EndCondition::ProcessesArrived { count } if self.arrivals >= count => self.ended = true,
            EndCondition::TimeLimit { seconds } if clock >= seconds => self.ended = true,
            _ => {}
        }
    }

    /// Record a departure handled at `clock`
    pub fn log_departure(&mut self, clock: f64) {
        self.departures += 1;

        match self.condition {
            EndCondition::ProcessesDeparted { count } if self.departures >= count => self.ended = true,
            EndCondition::TimeLimit { seconds } if clock >= seconds => self.ended = true,
            _ => {}
        }
    }

    pub fn arrivals(&self) -> u64 {
        self.arrivals
    }

    pub fn departures(&self) -> u64 {
        self.departures
    }
}
