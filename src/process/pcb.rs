// Process Control Block and the types threaded through it.
use alloc::string::String;
use core::fmt;
use x86_64::VirtAddr;

/// Process ID. PID 0 is reserved for "idle / none" and is never assigned.
pub type Pid = u32;

/// Display names are clipped to this many bytes at creation.
pub const MAX_NAME_LEN: usize = 31;

/// Per-process message ring capacity, in words.
pub const MESSAGE_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Linked into the ready queue, waiting for the CPU.
    Ready,
    /// Owns the CPU. At most one process is in this state.
    Current,
    Blocked,
    /// Transitional: dequeued by the scheduler but not yet dispatched.
    Waiting,
    Sleeping,
    Terminated,
}

impl ProcessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Ready => "READY",
            ProcessState::Current => "CURRENT",
            ProcessState::Blocked => "BLOCKED",
            ProcessState::Waiting => "WAITING",
            ProcessState::Sleeping => "SLEEPING",
            ProcessState::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProcessPriority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl ProcessPriority {
    /// Default time quantum per level. Higher priority gets a shorter slice
    /// for responsiveness.
    pub fn default_quantum(self) -> u32 {
        match self {
            ProcessPriority::Critical => 50,
            ProcessPriority::High => 100,
            ProcessPriority::Normal => 150,
            ProcessPriority::Low => 200,
        }
    }

    /// One level up, saturating at CRITICAL.
    pub fn boosted(self) -> ProcessPriority {
        match self {
            ProcessPriority::Low => ProcessPriority::Normal,
            ProcessPriority::Normal => ProcessPriority::High,
            _ => ProcessPriority::Critical,
        }
    }

    /// Parse a shell token: full name (any case), first letter, or 0-3.
    pub fn parse(token: &str) -> Option<ProcessPriority> {
        if token.eq_ignore_ascii_case("critical") || token.eq_ignore_ascii_case("c") || token == "3"
        {
            Some(ProcessPriority::Critical)
        } else if token.eq_ignore_ascii_case("high")
            || token.eq_ignore_ascii_case("h")
            || token == "2"
        {
            Some(ProcessPriority::High)
        } else if token.eq_ignore_ascii_case("normal")
            || token.eq_ignore_ascii_case("n")
            || token == "1"
        {
            Some(ProcessPriority::Normal)
        } else if token.eq_ignore_ascii_case("low")
            || token.eq_ignore_ascii_case("l")
            || token == "0"
        {
            Some(ProcessPriority::Low)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessPriority::Low => "LOW",
            ProcessPriority::Normal => "NORMAL",
            ProcessPriority::High => "HIGH",
            ProcessPriority::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ProcessPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Saved CPU register file. Written when a process is created and by the
/// context unit's save path, read by its restore path; nothing else
/// interprets these fields.
#[derive(Debug, Clone, Copy)]
pub struct CpuContext {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub rsp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    pub rflags: u64,
    pub cs: u64,
    pub ss: u64,
    pub ds: u64,
    pub es: u64,
    pub fs: u64,
    pub gs: u64,
}

impl Default for CpuContext {
    fn default() -> Self {
        CpuContext {
            rax: 0,
            rbx: 0,
            rcx: 0,
            rdx: 0,
            rsi: 0,
            rdi: 0,
            rbp: 0,
            rsp: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            rip: 0,
            rflags: 0x202, // interrupts enabled, reserved bit set
            cs: 0x08,
            ss: 0x10,
            ds: 0x10,
            es: 0x10,
            fs: 0x10,
            gs: 0x10,
        }
    }
}

impl CpuContext {
    /// Initial register file for a fresh process. The classic registers get
    /// PID-derived values so a register dump identifies whose context is
    /// loaded.
    pub fn initial(pid: Pid, entry_point: VirtAddr, stack_top: VirtAddr) -> Self {
        let pid = pid as u64;
        CpuContext {
            rip: entry_point.as_u64(),
            rsp: stack_top.as_u64(),
            rbp: stack_top.as_u64(),
            rax: 0xAAAA_0000 | pid,
            rbx: 0xBBBB_0000 | pid,
            rcx: 0xCCCC_0000 | pid,
            rdx: 0xDDDD_0000 | pid,
            rsi: 0x5151_E000 | pid,
            rdi: 0xD1D1_0000 | pid,
            ..CpuContext::default()
        }
    }
}

/// Process Control Block. One per live process, owned by the process
/// manager's table.
#[derive(Debug)]
pub struct Pcb {
    pub pid: Pid,
    pub name: String,
    pub state: ProcessState,
    pub priority: ProcessPriority,

    // Scheduling
    pub quantum: u32,
    pub remaining_quantum: u32,
    pub cpu_time: u32,
    pub wait_time: u32,
    pub creation_time: u32,
    pub age: u32,

    // Execution budget for simulation mode. 0 means unbounded.
    pub required_time: u32,
    pub remaining_time: u32,

    // Sleep countdown, meaningful only while state is SLEEPING.
    pub sleep_remaining: u32,

    // Memory ownership
    pub stack_base: VirtAddr,
    pub stack_top: VirtAddr,
    pub stack_size: u64,
    /// Heap block backing this PCB, freed at termination.
    pub pcb_block: VirtAddr,

    pub context: CpuContext,

    // IPC
    pub messages: heapless::Vec<u32, MESSAGE_CAPACITY>,
    pub waiting_for_msg: bool,

    pub parent_pid: Pid,
    pub exit_code: i32,

    // Ready queue links (table slot indices), valid only while READY.
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

impl Pcb {
    /// Progress toward the execution budget, as a percentage. `None` for
    /// unbounded processes.
    pub fn progress_percent(&self) -> Option<u32> {
        if self.required_time == 0 {
            None
        } else {
            Some((self.cpu_time.min(self.required_time) * 100) / self.required_time)
        }
    }
}
