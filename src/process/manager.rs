// Process manager: PCB table, state machine, priority-ordered ready queue
// and message passing. The table is a fixed arena of PCB slots; the ready
// queue is a doubly-linked list threaded through slot indices, so the
// scheduler only ever sees PIDs, never borrows into the queue.
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use spin::Mutex;
use x86_64::VirtAddr;

use super::pcb::{CpuContext, Pcb, Pid, ProcessPriority, ProcessState, MAX_NAME_LEN};
use crate::kprintln;
use crate::memory::{self, MemoryManager};

/// Process table capacity.
pub const MAX_PROCESSES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcError {
    NoSuchProcess,
    QueueFull,
    NoCurrentProcess,
    /// The caller's ring was empty; it has been blocked and flagged as
    /// waiting for a message.
    WouldBlock,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub total_processes: u32,
    pub active_processes: u32,
    pub ready_processes: u32,
    pub blocked_processes: u32,
    pub terminated_processes: u32,
}

pub struct ProcessManager {
    table: Vec<Option<Pcb>>,
    head: Option<usize>,
    tail: Option<usize>,
    current: Option<usize>,
    next_pid: Pid,
    total_created: u32,
}

impl ProcessManager {
    pub fn new() -> Self {
        ProcessManager {
            table: (0..MAX_PROCESSES).map(|_| None).collect(),
            head: None,
            tail: None,
            current: None,
            next_pid: 1,
            total_created: 0,
        }
    }

    fn slot_of(&self, pid: Pid) -> Option<usize> {
        self.table
            .iter()
            .position(|e| e.as_ref().map_or(false, |p| p.pid == pid))
    }

    fn priority_of(&self, slot: usize) -> Option<ProcessPriority> {
        self.table[slot].as_ref().map(|p| p.priority)
    }

    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.slot_of(pid).and_then(|i| self.table[i].as_ref())
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        let slot = self.slot_of(pid)?;
        self.table[slot].as_mut()
    }

    pub fn current(&self) -> Option<&Pcb> {
        self.current.and_then(|i| self.table[i].as_ref())
    }

    pub fn current_pid(&self) -> Option<Pid> {
        self.current().map(|p| p.pid)
    }

    pub fn processes(&self) -> impl Iterator<Item = &Pcb> {
        self.table.iter().flatten()
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.processes().map(|p| p.pid).collect()
    }

    /// PIDs in ready-queue order, head first.
    pub fn ready_pids(&self) -> Vec<Pid> {
        let mut out = Vec::new();
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            match self.table[slot].as_ref() {
                Some(p) => {
                    out.push(p.pid);
                    cursor = p.next;
                }
                None => break,
            }
        }
        out
    }

    // Insert a slot into the ready queue at its priority position: after
    // every process of higher or equal priority, so equal priorities stay
    // FIFO.
    fn enqueue(&mut self, slot: usize) {
        let priority = match self.priority_of(slot) {
            Some(p) => p,
            None => return,
        };
        if let Some(p) = self.table[slot].as_mut() {
            p.state = ProcessState::Ready;
            p.sleep_remaining = 0;
            p.prev = None;
            p.next = None;
        }

        let head = match self.head {
            Some(h) => h,
            None => {
                self.head = Some(slot);
                self.tail = Some(slot);
                return;
            }
        };

        if self.priority_of(head).map_or(false, |hp| priority > hp) {
            if let Some(p) = self.table[slot].as_mut() {
                p.next = Some(head);
            }
            if let Some(h) = self.table[head].as_mut() {
                h.prev = Some(slot);
            }
            self.head = Some(slot);
            return;
        }

        let mut cursor = head;
        loop {
            let next = self.table[cursor].as_ref().and_then(|p| p.next);
            match next {
                Some(n) if self.priority_of(n).map_or(false, |np| np >= priority) => cursor = n,
                _ => break,
            }
        }

        let cursor_next = self.table[cursor].as_ref().and_then(|p| p.next);
        if let Some(p) = self.table[slot].as_mut() {
            p.prev = Some(cursor);
            p.next = cursor_next;
        }
        match cursor_next {
            Some(n) => {
                if let Some(np) = self.table[n].as_mut() {
                    np.prev = Some(slot);
                }
            }
            None => self.tail = Some(slot),
        }
        if let Some(cp) = self.table[cursor].as_mut() {
            cp.next = Some(slot);
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match self.table[slot].as_ref() {
            Some(p) => (p.prev, p.next),
            None => return,
        };
        match prev {
            Some(p) => {
                if let Some(pp) = self.table[p].as_mut() {
                    pp.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(np) = self.table[n].as_mut() {
                    np.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        if let Some(p) = self.table[slot].as_mut() {
            p.prev = None;
            p.next = None;
        }
    }

    /// Create a process with no execution budget.
    pub fn create(
        &mut self,
        mem: &mut MemoryManager,
        name: &str,
        entry_point: VirtAddr,
        priority: ProcessPriority,
        now: u32,
    ) -> Option<Pid> {
        self.create_with_time(mem, name, entry_point, priority, 0, now)
    }

    /// Create a process that terminates after `required_time` CPU ticks
    /// (0 = unbounded). Returns `None` and rolls every claim back on any
    /// failure.
    pub fn create_with_time(
        &mut self,
        mem: &mut MemoryManager,
        name: &str,
        entry_point: VirtAddr,
        priority: ProcessPriority,
        required_time: u32,
        now: u32,
    ) -> Option<Pid> {
        let pcb_block = match mem.allocate(core::mem::size_of::<Pcb>() as u64) {
            Some(addr) => addr,
            None => {
                warn!(target: "PROCESS", "failed to allocate PCB for '{}'", name);
                return None;
            }
        };

        let pid = self.next_pid;
        self.next_pid += 1;

        let stack_top = match mem.stack_alloc(pid) {
            Some(top) => top,
            None => {
                warn!(target: "PROCESS", "failed to allocate stack for '{}'", name);
                mem.free(Some(pcb_block));
                return None;
            }
        };
        let stack_base = VirtAddr::new(stack_top.as_u64() - memory::STACK_SIZE);

        let slot = match self.table.iter().position(|e| e.is_none()) {
            Some(s) => s,
            None => {
                warn!(target: "PROCESS", "process table full, cannot create '{}'", name);
                mem.stack_free(pid);
                mem.free(Some(pcb_block));
                return None;
            }
        };

        let quantum = priority.default_quantum();
        let pcb = Pcb {
            pid,
            name: bounded_name(name),
            state: ProcessState::Ready,
            priority,
            quantum,
            remaining_quantum: quantum,
            cpu_time: 0,
            wait_time: 0,
            creation_time: now,
            age: 0,
            required_time,
            remaining_time: required_time,
            sleep_remaining: 0,
            stack_base,
            stack_top,
            stack_size: memory::STACK_SIZE,
            pcb_block,
            context: CpuContext::initial(pid, entry_point, stack_top),
            messages: heapless::Vec::new(),
            waiting_for_msg: false,
            parent_pid: self.current_pid().unwrap_or(0),
            exit_code: 0,
            prev: None,
            next: None,
        };

        self.table[slot] = Some(pcb);
        self.enqueue(slot);
        self.total_created += 1;

        info!(
            target: "PROCESS",
            "created process '{}' (pid {}, priority {})",
            name, pid, priority
        );
        if required_time > 0 {
            info!(target: "PROCESS", "pid {} required time: {} ticks", pid, required_time);
        }
        Some(pid)
    }

    /// Tear a process down: unlink, release its stack and PCB block, clear
    /// its table slot.
    pub fn terminate(&mut self, mem: &mut MemoryManager, pid: Pid) {
        let slot = match self.slot_of(pid) {
            Some(s) => s,
            None => {
                warn!(target: "PROCESS", "cannot terminate: pid {} not found", pid);
                return;
            }
        };

        if let Some(p) = self.table[slot].as_ref() {
            info!(target: "PROCESS", "terminating process '{}' (pid {})", p.name, pid);
            if p.state == ProcessState::Ready {
                self.unlink(slot);
            }
        }
        if self.current == Some(slot) {
            self.current = None;
        }
        if let Some(p) = self.table[slot].as_mut() {
            p.state = ProcessState::Terminated;
        }

        mem.stack_free(pid);
        if let Some(p) = self.table[slot].take() {
            mem.free(Some(p.pcb_block));
        }
    }

    /// The current process exits voluntarily with `exit_code`.
    pub fn exit(&mut self, mem: &mut MemoryManager, exit_code: i32) {
        let pid = match self.current_pid() {
            Some(p) => p,
            None => {
                warn!(target: "PROCESS", "no current process to exit");
                return;
            }
        };
        if let Some(p) = self.get_mut(pid) {
            p.exit_code = exit_code;
            info!(target: "PROCESS", "process '{}' exiting with code {}", p.name, exit_code);
        }
        self.terminate(mem, pid);
    }

    /// Move a process to `new_state`, keeping ready-queue membership and the
    /// current-process pointer consistent.
    pub fn set_state(&mut self, pid: Pid, new_state: ProcessState) {
        let slot = match self.slot_of(pid) {
            Some(s) => s,
            None => return,
        };
        let old_state = match self.table[slot].as_ref() {
            Some(p) => p.state,
            None => return,
        };

        if old_state == ProcessState::Ready && new_state != ProcessState::Ready {
            self.unlink(slot);
        }
        if let Some(p) = self.table[slot].as_mut() {
            p.state = new_state;
        }
        if old_state != ProcessState::Ready && new_state == ProcessState::Ready {
            self.enqueue(slot);
        }

        if new_state == ProcessState::Current {
            self.current = Some(slot);
        } else if self.current == Some(slot) {
            self.current = None;
        }
    }

    pub fn get_state(&self, pid: Pid) -> Option<ProcessState> {
        self.get(pid).map(|p| p.state)
    }

    pub fn block(&mut self, pid: Pid) {
        self.set_state(pid, ProcessState::Blocked);
    }

    pub fn unblock(&mut self, pid: Pid) {
        self.set_state(pid, ProcessState::Ready);
    }

    /// Put a process to sleep for `ticks`. The scheduler's per-tick scan
    /// wakes it when the countdown runs out.
    pub fn sleep(&mut self, pid: Pid, ticks: u32) {
        self.set_state(pid, ProcessState::Sleeping);
        if let Some(p) = self.get_mut(pid) {
            p.sleep_remaining = ticks;
        }
    }

    pub fn set_priority(&mut self, pid: Pid, priority: ProcessPriority) {
        let slot = match self.slot_of(pid) {
            Some(s) => s,
            None => return,
        };
        let was_ready = match self.table[slot].as_mut() {
            Some(p) => {
                p.priority = priority;
                p.state == ProcessState::Ready
            }
            None => return,
        };
        if was_ready {
            self.unlink(slot);
            self.enqueue(slot);
        }
    }

    /// Raise priority one level (saturating at CRITICAL), relocating within
    /// the ready queue behind its new peers.
    pub fn boost_priority(&mut self, pid: Pid) {
        let boosted = match self.get(pid) {
            Some(p) if p.priority < ProcessPriority::Critical => p.priority.boosted(),
            _ => return,
        };
        self.set_priority(pid, boosted);
    }

    pub fn reset_age(&mut self, pid: Pid) {
        if let Some(p) = self.get_mut(pid) {
            p.age = 0;
        }
    }

    /// One tick of wait accounting: every READY process ages by one tick.
    pub fn age_ready(&mut self) {
        for entry in self.table.iter_mut() {
            if let Some(p) = entry {
                if p.state == ProcessState::Ready {
                    p.age += 1;
                    p.wait_time += 1;
                }
            }
        }
    }

    /// One tick of sleep accounting: due sleepers return to the ready queue.
    pub fn wake_sleepers(&mut self) {
        let mut woken = Vec::new();
        for entry in self.table.iter_mut() {
            if let Some(p) = entry {
                if p.state == ProcessState::Sleeping {
                    if p.sleep_remaining > 0 {
                        p.sleep_remaining -= 1;
                    }
                    if p.sleep_remaining == 0 {
                        woken.push(p.pid);
                    }
                }
            }
        }
        for pid in woken {
            debug!(target: "PROCESS", "pid {} woke from sleep", pid);
            self.set_state(pid, ProcessState::Ready);
        }
    }

    /// Unlink the head of the ready queue and park it in the transitional
    /// WAITING state until the scheduler dispatches it.
    pub fn dequeue_ready(&mut self) -> Option<Pid> {
        let head = self.head?;
        self.unlink(head);
        match self.table[head].as_mut() {
            Some(p) => {
                p.state = ProcessState::Waiting;
                Some(p.pid)
            }
            None => None,
        }
    }

    /// Put a process back on the ready queue directly.
    pub fn enqueue_ready(&mut self, pid: Pid) {
        if let Some(slot) = self.slot_of(pid) {
            self.enqueue(slot);
        }
    }

    // ---- IPC ----

    /// Append one word to `dest_pid`'s message ring; wakes the destination
    /// if it was waiting for a message.
    pub fn send(&mut self, dest_pid: Pid, message: u32) -> Result<(), IpcError> {
        let slot = match self.slot_of(dest_pid) {
            Some(s) => s,
            None => {
                warn!(target: "IPC", "destination process {} not found", dest_pid);
                return Err(IpcError::NoSuchProcess);
            }
        };
        let was_waiting = match self.table[slot].as_mut() {
            Some(p) => {
                if p.messages.push(message).is_err() {
                    warn!(target: "IPC", "message queue full for pid {}", dest_pid);
                    return Err(IpcError::QueueFull);
                }
                let w = p.waiting_for_msg;
                p.waiting_for_msg = false;
                w
            }
            None => return Err(IpcError::NoSuchProcess),
        };
        if was_waiting {
            self.unblock(dest_pid);
        }
        Ok(())
    }

    /// Pop the oldest message for the current process. An empty ring blocks
    /// the caller: it is flagged as waiting, moved to BLOCKED, and the call
    /// fails with `WouldBlock` until someone sends to it.
    pub fn receive(&mut self) -> Result<u32, IpcError> {
        let slot = match self.current {
            Some(s) => s,
            None => return Err(IpcError::NoCurrentProcess),
        };
        let (pid, empty) = match self.table[slot].as_ref() {
            Some(p) => (p.pid, p.messages.is_empty()),
            None => return Err(IpcError::NoCurrentProcess),
        };
        if empty {
            if let Some(p) = self.table[slot].as_mut() {
                p.waiting_for_msg = true;
            }
            self.block(pid);
            return Err(IpcError::WouldBlock);
        }
        match self.table[slot].as_mut() {
            Some(p) => Ok(p.messages.remove(0)),
            None => Err(IpcError::NoCurrentProcess),
        }
    }

    pub fn has_message(&self, pid: Pid) -> bool {
        self.get(pid).map_or(false, |p| !p.messages.is_empty())
    }

    // ---- Reporting ----

    pub fn count(&self) -> u32 {
        self.processes().count() as u32
    }

    pub fn count_by_state(&self, state: ProcessState) -> u32 {
        self.processes().filter(|p| p.state == state).count() as u32
    }

    pub fn stats(&self) -> ProcessStats {
        let mut stats = ProcessStats {
            total_processes: self.total_created,
            ..ProcessStats::default()
        };
        for p in self.processes() {
            stats.active_processes += 1;
            match p.state {
                ProcessState::Ready => stats.ready_processes += 1,
                ProcessState::Blocked | ProcessState::Waiting | ProcessState::Sleeping => {
                    stats.blocked_processes += 1
                }
                ProcessState::Terminated => stats.terminated_processes += 1,
                ProcessState::Current => {}
            }
        }
        stats
    }

    pub fn print_table(&self) {
        kprintln!();
        kprintln!("=== Process Table ===");
        kprintln!("PID  Name            State       Pri  CPU    Req    Progress");
        kprintln!("---  --------------  ----------  ---  -----  -----  --------");
        let mut count = 0;
        for p in self.processes() {
            let progress = match p.progress_percent() {
                Some(_) if p.cpu_time >= p.required_time => String::from("DONE"),
                Some(pct) => format!("{:>3}%", pct),
                None => String::from("-"),
            };
            let required = if p.required_time > 0 {
                format!("{}", p.required_time)
            } else {
                String::from("-")
            };
            kprintln!(
                "{:>3}  {:<14}  {:<10}  {:>3}  {:>5}  {:>5}  {}",
                p.pid,
                p.name,
                p.state,
                p.priority as u32,
                p.cpu_time,
                required,
                progress
            );
            count += 1;
        }
        kprintln!("---");
        kprintln!("Total: {} active processes", count);
        kprintln!("====================");
        kprintln!();
    }

    pub fn print_info(&self, pid: Pid) {
        let p = match self.get(pid) {
            Some(p) => p,
            None => {
                kprintln!("Process not found");
                return;
            }
        };
        kprintln!();
        kprintln!("=== Process Information ===");
        kprintln!("PID:          {}", p.pid);
        kprintln!("Name:         {}", p.name);
        kprintln!("State:        {}", p.state);
        kprintln!("Priority:     {}", p.priority);
        kprintln!("Parent PID:   {}", p.parent_pid);
        kprintln!("Stack Base:   {:#010X}", p.stack_base.as_u64());
        kprintln!("Stack Top:    {:#010X}", p.stack_top.as_u64());
        kprintln!("Stack Size:   {} bytes", p.stack_size);
        kprintln!("Quantum:      {} ticks", p.quantum);
        kprintln!("CPU Time:     {}", p.cpu_time);
        kprintln!("Wait Time:    {}", p.wait_time);
        kprintln!("Age:          {}", p.age);
        if p.required_time > 0 {
            kprintln!("Required:     {} ({} remaining)", p.required_time, p.remaining_time);
        }
        kprintln!("Messages:     {}", p.messages.len());
        kprintln!("==========================");
        kprintln!();
    }
}

fn bounded_name(name: &str) -> String {
    let mut end = name.len().min(MAX_NAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    String::from(&name[..end])
}

lazy_static! {
    static ref PROCESS_MANAGER: Mutex<ProcessManager> = Mutex::new(ProcessManager::new());
}

pub(crate) fn manager() -> spin::MutexGuard<'static, ProcessManager> {
    PROCESS_MANAGER.lock()
}

/// Reset the process manager to its boot state. Called once at boot, after
/// the memory manager and before the scheduler.
pub fn init() {
    *PROCESS_MANAGER.lock() = ProcessManager::new();
    info!(target: "PROCESS", "process manager initialized");
    info!(target: "PROCESS", "max processes: {}", MAX_PROCESSES);
}

pub fn create(name: &str, entry_point: VirtAddr, priority: ProcessPriority) -> Option<Pid> {
    create_with_time(name, entry_point, priority, 0)
}

pub fn create_with_time(
    name: &str,
    entry_point: VirtAddr,
    priority: ProcessPriority,
    required_time: u32,
) -> Option<Pid> {
    let now = crate::scheduler::current_tick();
    let mut procs = PROCESS_MANAGER.lock();
    let mut mem = memory::manager();
    procs.create_with_time(&mut mem, name, entry_point, priority, required_time, now)
}

pub fn terminate(pid: Pid) {
    let mut procs = PROCESS_MANAGER.lock();
    let mut mem = memory::manager();
    procs.terminate(&mut mem, pid)
}

pub fn exit(exit_code: i32) {
    let mut procs = PROCESS_MANAGER.lock();
    let mut mem = memory::manager();
    procs.exit(&mut mem, exit_code)
}

pub fn set_state(pid: Pid, state: ProcessState) {
    PROCESS_MANAGER.lock().set_state(pid, state)
}

pub fn get_state(pid: Pid) -> Option<ProcessState> {
    PROCESS_MANAGER.lock().get_state(pid)
}

pub fn block(pid: Pid) {
    PROCESS_MANAGER.lock().block(pid)
}

pub fn unblock(pid: Pid) {
    PROCESS_MANAGER.lock().unblock(pid)
}

pub fn sleep(pid: Pid, ticks: u32) {
    PROCESS_MANAGER.lock().sleep(pid, ticks)
}

pub fn set_priority(pid: Pid, priority: ProcessPriority) {
    PROCESS_MANAGER.lock().set_priority(pid, priority)
}

pub fn boost_priority(pid: Pid) {
    PROCESS_MANAGER.lock().boost_priority(pid)
}

pub fn reset_age(pid: Pid) {
    PROCESS_MANAGER.lock().reset_age(pid)
}

pub fn send(dest_pid: Pid, message: u32) -> Result<(), IpcError> {
    let woke = {
        let mut procs = PROCESS_MANAGER.lock();
        let was_waiting = procs.get(dest_pid).map_or(false, |p| p.waiting_for_msg);
        procs.send(dest_pid, message)?;
        was_waiting
    };
    // A send that woke a waiting receiver puts it on the ready queue from
    // outside the scheduler, so it gets the same dispatch-on-arrival ping
    // as creation.
    if woke {
        crate::scheduler::notify_ready(dest_pid);
    }
    Ok(())
}

pub fn receive() -> Result<u32, IpcError> {
    PROCESS_MANAGER.lock().receive()
}

pub fn has_message(pid: Pid) -> bool {
    PROCESS_MANAGER.lock().has_message(pid)
}

pub fn current_pid() -> Option<Pid> {
    PROCESS_MANAGER.lock().current_pid()
}

pub fn get_name(pid: Pid) -> Option<String> {
    PROCESS_MANAGER.lock().get(pid).map(|p| p.name.clone())
}

pub fn get_priority(pid: Pid) -> Option<ProcessPriority> {
    PROCESS_MANAGER.lock().get(pid).map(|p| p.priority)
}

pub fn count() -> u32 {
    PROCESS_MANAGER.lock().count()
}

pub fn count_by_state(state: ProcessState) -> u32 {
    PROCESS_MANAGER.lock().count_by_state(state)
}

pub fn stats() -> ProcessStats {
    PROCESS_MANAGER.lock().stats()
}

pub fn print_table() {
    PROCESS_MANAGER.lock().print_table()
}

pub fn print_info(pid: Pid) {
    PROCESS_MANAGER.lock().print_info(pid)
}
