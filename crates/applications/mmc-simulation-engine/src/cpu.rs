//! Fixed-size pool of CPU slots
//!
//! Each slot runs at most one process. Slot selection is the simulator's job;
//! the pool only binds, reports and detaches occupants.

use crate::error::{InvariantViolation, Result};
use crate::process::ProcessTable;
use crate::types::ProcessId;

#[derive(Debug, Clone)]
pub struct CpuPool {
    slots: Vec<Option<ProcessId>>,
}

impl CpuPool {
    pub fn new(num_cpus: usize) -> Self {
        CpuPool {
            slots: vec![None; num_cpus],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, index: usize) -> Result<Option<ProcessId>> {
        self.slots.get(index).copied().ok_or_else(|| {
            InvariantViolation::CpuOutOfRange {
                index,
                count: self.slots.len(),
            }
            .into()
        })
    }

    /// Indices of slots with no occupant, ascending
    pub fn idle_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn is_idle(&self, index: usize) -> Result<bool> {
        Ok(self.slot(index)?.is_none())
    }

    pub fn occupant(&self, index: usize) -> Result<Option<ProcessId>> {
        self.slot(index)
    }

    /// Bind a process to an idle slot and start its run segment at `time`
    pub fn assign(
        &mut self,
        time: f64,
        processes: &mut ProcessTable,
        id: ProcessId,
        index: usize,
    ) -> Result<()> {
        if let Some(occupant) = self.slot(index)? {
            return Err(InvariantViolation::CpuBusy {
                cpu: index,
                occupant,
            }
            .into());
        }

        let process = processes.get_mut(id)?;
        process.cpu_index = Some(index);
        process.last_run_time = time;
        self.slots[index] = Some(id);
        Ok(())
    }

    /// Detach the occupant, returning it with the length of its finished run segment
    ///
    /// The process keeps its `cpu_index` as the slot it last occupied.
    pub fn release(
        &mut self,
        time: f64,
        processes: &ProcessTable,
        index: usize,
    ) -> Result<(ProcessId, f64)> {
        let id = self.slot(index)?.ok_or(InvariantViolation::CpuIdle(index))?;
        let elapsed = time - processes.get(id)?.last_run_time;
        self.slots[index] = None;
        Ok((id, elapsed))
    }

    /// Occupants by slot
    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<ProcessId>)> + '_ {
        self.slots.iter().copied().enumerate()
    }
}
