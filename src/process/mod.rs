// Process management: PCB types, the process table + ready queue, and the
// context switch unit.
pub mod context;
pub mod manager;
pub mod pcb;

pub use context::ContextUnit;
pub use manager::{
    block, boost_priority, count, count_by_state, create, create_with_time, current_pid, exit,
    get_name, get_priority, get_state, has_message, init, print_info, print_table, receive,
    reset_age, send, set_priority, set_state, sleep, stats, terminate, unblock, IpcError,
    ProcessManager, ProcessStats, MAX_PROCESSES,
};
pub use pcb::{CpuContext, Pcb, Pid, ProcessPriority, ProcessState, MESSAGE_CAPACITY};
