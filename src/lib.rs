//! tickos: a deterministic, tick-driven process scheduling engine for a
//! single-CPU teaching kernel. Three subsystems share the load: the memory
//! manager (fixed-region heap + stack pool), the process manager (PCB
//! table, state machine, priority ready queue, IPC) and the scheduler
//! (tick accounting, quantum preemption, aging).
//!
//! The engine is single-threaded and cooperative: each public operation is
//! an atomic unit driven from tick, shell, or process context. Each
//! per-subsystem `spin::Mutex` singleton is that subsystem's single
//! monitor; there is no finer-grained locking, and none is needed on one
//! CPU.
#![no_std]

extern crate alloc;

pub mod logger;
pub mod memory;
pub mod process;
pub mod scheduler;
pub mod selftest;
pub mod serial;
pub mod shell;

pub use process::{Pid, ProcessPriority, ProcessState};
pub use scheduler::SchedPolicy;
pub use x86_64::VirtAddr;

/// Boot quantum handed to the scheduler before any per-priority quantum
/// applies.
pub const BOOT_QUANTUM: u32 = 100;

/// Bring the core up in its fixed order: logging, memory, processes,
/// scheduler. Also resets every subsystem, so a fresh call re-creates
/// cold-boot state.
pub fn init() {
    logger::init();
    memory::init();
    process::init();
    scheduler::init(SchedPolicy::Priority, BOOT_QUANTUM);
    scheduler::start();
}
