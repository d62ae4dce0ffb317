// Context switch unit. Owns the "live" register file and moves it in and
// out of PCBs; on real hardware the two methods below become the assembly
// save/restore routines and nothing else changes.
use log::debug;

use super::pcb::{CpuContext, Pcb};

pub struct ContextUnit {
    cpu: CpuContext,
}

impl ContextUnit {
    pub fn new() -> Self {
        ContextUnit {
            cpu: CpuContext::default(),
        }
    }

    /// Save the live register file into the outgoing process.
    pub fn save(&self, pcb: &mut Pcb) {
        pcb.context = self.cpu;
        debug!(target: "SCHEDULER", "saved context for pid {} ('{}')", pcb.pid, pcb.name);
    }

    /// Load the incoming process's register file.
    pub fn restore(&mut self, pcb: &Pcb) {
        self.cpu = pcb.context;
        debug!(target: "SCHEDULER", "restored context for pid {} ('{}')", pcb.pid, pcb.name);
    }
}

impl Default for ContextUnit {
    fn default() -> Self {
        ContextUnit::new()
    }
}
