//! Time-ordered queue of pending events
//!
//! Events fire in ascending time order. Events scheduled for the same
//! instant fire in the order they were scheduled.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::error::{InvariantViolation, Result};
use crate::types::{EventKind, ProcessId};

/// A pending occurrence concerning one process
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
    pub process: ProcessId,
}

/// Event wrapper ordered by (time, scheduling sequence)
#[derive(Debug, Clone, Copy)]
struct TimedEvent {
    seq: u64,
    event: Event,
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.event
            .time
            .total_cmp(&other.event.time)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for TimedEvent {}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

/// Pending events, earliest first
#[derive(Debug, Default)]
pub struct EventQueue {
    events: BTreeSet<TimedEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event; it fires after every already-scheduled event with time <= `time`
    pub fn schedule(&mut self, kind: EventKind, time: f64, process: ProcessId) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.insert(TimedEvent {
            seq,
            event: Event { time, kind, process },
        });
    }

    pub fn peek_earliest(&self) -> Option<&Event> {
        self.events.first().map(|timed| &timed.event)
    }

    /// Remove and return the earliest event
    pub fn pop_earliest(&mut self) -> Result<Event> {
        self.events
            .pop_first()
            .map(|timed| timed.event)
            .ok_or_else(|| InvariantViolation::EmptyEventQueue.into())
    }

    /// Unlink the first event of `kind` for `process`; returns whether one was found
    pub fn cancel(&mut self, kind: EventKind, process: ProcessId) -> bool {
        let found = self
            .events
            .iter()
            .find(|timed| timed.event.kind == kind && timed.event.process == process)
            .copied();

        match found {
            Some(timed) => self.events.remove(&timed),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Pending events in firing order
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|timed| &timed.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_pop_order() {
        let mut queue = EventQueue::new();
        queue.schedule(EventKind::Departure, 3.0, ProcessId(0));
        queue.schedule(EventKind::Arrival, 1.0, ProcessId(1));
        queue.schedule(EventKind::Arrival, 2.0, ProcessId(2));

        assert_eq!(queue.peek_earliest().unwrap().time, 1.0);
        let times: Vec<f64> = (0..3).map(|_| queue.pop_earliest().unwrap().time).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_ties_fire_in_scheduling_order() {
        let mut queue = EventQueue::new();
        queue.schedule(EventKind::Departure, 5.0, ProcessId(10));
        queue.schedule(EventKind::Arrival, 5.0, ProcessId(11));
        queue.schedule(EventKind::Preemption, 5.0, ProcessId(12));
        queue.schedule(EventKind::Arrival, 4.0, ProcessId(13));

        let order: Vec<u64> = (0..4).map(|_| queue.pop_earliest().unwrap().process.0).collect();
        assert_eq!(order, vec![13, 10, 11, 12]);
    }

    #[test]
    fn test_random_schedules_pop_non_decreasing() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut queue = EventQueue::new();

        for i in 0..500 {
            // Coarse times force plenty of ties
            let time = rng.gen_range(0..50) as f64 * 0.5;
            queue.schedule(EventKind::Arrival, time, ProcessId(i));
        }

        let mut last = (f64::NEG_INFINITY, 0u64);
        while !queue.is_empty() {
            let event = queue.pop_earliest().unwrap();
            assert!(event.time >= last.0);
            if event.time == last.0 {
                // Same instant: earlier-scheduled (lower id here) first
                assert!(event.process.0 > last.1);
            }
            last = (event.time, event.process.0);
        }
    }

    #[test]
    fn test_cancel_first_match_only() {
        let mut queue = EventQueue::new();
        queue.schedule(EventKind::Arrival, 1.0, ProcessId(1));
        queue.schedule(EventKind::Departure, 4.0, ProcessId(1));
        queue.schedule(EventKind::Departure, 2.0, ProcessId(2));

        assert!(queue.cancel(EventKind::Departure, ProcessId(1)));
        assert!(!queue.cancel(EventKind::Departure, ProcessId(1)));
        assert!(!queue.cancel(EventKind::Preemption, ProcessId(2)));
        assert_eq!(queue.len(), 2);

        let remaining: Vec<EventKind> = queue.iter().map(|e| e.kind).collect();
        assert_eq!(remaining, vec![EventKind::Arrival, EventKind::Departure]);
    }

    #[test]
    fn test_pop_empty_is_invariant_violation() {
        let mut queue = EventQueue::new();
        let err = queue.pop_earliest().unwrap_err();
        assert!(err.is_invariant());
    }
}
