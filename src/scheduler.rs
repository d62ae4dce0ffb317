// Scheduler: tick accounting, quantum expiry, policy-driven selection,
// context switch bookkeeping and priority aging. Driven entirely by an
// external tick entry point; one call bills exactly one logical tick.
//
// The scheduler mutates processes only through `ProcessManager` operations,
// which it receives as an argument, so it can be exercised on plain
// instances in tests and behind the global singleton at runtime.
use core::fmt;
use lazy_static::lazy_static;
use log::{debug, info};
use spin::Mutex;

use crate::kprintln;
use crate::memory::{self, MemoryManager};
use crate::process::{self, ContextUnit, Pid, ProcessManager, ProcessPriority, ProcessState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    RoundRobin,
    Priority,
    PriorityRr,
    Fcfs,
}

impl SchedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedPolicy::RoundRobin => "Round-Robin",
            SchedPolicy::Priority => "Priority-Based",
            SchedPolicy::PriorityRr => "Priority Round-Robin",
            SchedPolicy::Fcfs => "First-Come-First-Served",
        }
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedConfig {
    pub policy: SchedPolicy,
    pub default_quantum: u32,
    pub min_quantum: u32,
    pub max_quantum: u32,
    pub aging_threshold: u32,
    pub aging_boost_interval: u32,
    pub enable_aging: bool,
    pub enable_preemption: bool,
}

impl SchedConfig {
    fn new(policy: SchedPolicy, default_quantum: u32) -> Self {
        let mut config = SchedConfig {
            policy,
            default_quantum,
            min_quantum: 10,
            max_quantum: 1000,
            aging_threshold: 100,
            aging_boost_interval: 50,
            enable_aging: true,
            enable_preemption: true,
        };
        config.default_quantum = default_quantum.clamp(config.min_quantum, config.max_quantum);
        config
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedStats {
    pub total_ticks: u32,
    pub idle_ticks: u32,
    pub context_switches: u32,
    pub preemptions: u32,
    pub voluntary_yields: u32,
    pub aging_boosts: u32,
}

pub struct Scheduler {
    config: SchedConfig,
    stats: SchedStats,
    running: bool,
    current_tick: u32,
    time_slice_remaining: u32,
    context: ContextUnit,
}

impl Scheduler {
    pub fn new(policy: SchedPolicy, default_quantum: u32) -> Self {
        let config = SchedConfig::new(policy, default_quantum);
        info!(target: "SCHEDULER", "scheduler initialized");
        info!(target: "SCHEDULER", "policy: {}", config.policy);
        info!(target: "SCHEDULER", "time quantum: {} ticks", config.default_quantum);
        Scheduler {
            time_slice_remaining: config.default_quantum,
            config,
            stats: SchedStats::default(),
            running: false,
            current_tick: 0,
            context: ContextUnit::new(),
        }
    }

    pub fn start(&mut self, procs: &mut ProcessManager) {
        self.running = true;
        info!(target: "SCHEDULER", "scheduler started");
        self.schedule(procs);
    }

    pub fn stop(&mut self) {
        self.running = false;
        info!(target: "SCHEDULER", "scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current_tick(&self) -> u32 {
        self.current_tick
    }

    pub fn time_slice_remaining(&self) -> u32 {
        self.time_slice_remaining
    }

    /// One logical tick: bill the running process, retire it when its
    /// budget is spent, preempt it when its slice runs out, and apply wait
    /// accounting plus the periodic aging check.
    pub fn tick(&mut self, procs: &mut ProcessManager, mem: &mut MemoryManager) {
        if !self.running {
            return;
        }
        self.current_tick += 1;
        self.stats.total_ticks += 1;

        // Everyone in the ready queue waits this tick; due sleepers return
        // to the queue before the dispatch decision below.
        procs.age_ready();
        procs.wake_sleepers();

        let current = match procs.current_pid() {
            Some(pid) => pid,
            None => {
                self.stats.idle_ticks += 1;
                self.schedule(procs);
                return;
            }
        };

        let mut completed = false;
        if let Some(p) = procs.get_mut(current) {
            p.cpu_time += 1;
            if p.required_time > 0 {
                p.remaining_time = p.required_time.saturating_sub(p.cpu_time);
                if p.cpu_time >= p.required_time {
                    info!(
                        target: "SCHEDULER",
                        "process {} ('{}') completed after {} ticks",
                        p.pid, p.name, p.cpu_time
                    );
                    completed = true;
                }
            }
        }
        if completed {
            procs.terminate(mem, current);
            self.schedule(procs);
            return;
        }

        if self.time_slice_remaining > 0 {
            self.time_slice_remaining -= 1;
            if let Some(p) = procs.get_mut(current) {
                p.remaining_quantum = self.time_slice_remaining;
            }
        }
        if self.config.enable_preemption && self.time_slice_remaining == 0 {
            debug!(target: "SCHEDULER", "time quantum expired for pid {}", current);
            self.stats.preemptions += 1;
            self.schedule(procs);
            return;
        }

        if self.config.enable_aging && self.current_tick % self.config.aging_boost_interval == 0 {
            self.check_aging(procs);
        }
    }

    /// Make a scheduling decision: demote the current process back to the
    /// ready queue, pick the next one under the active policy, and do the
    /// context switch bookkeeping.
    pub fn schedule(&mut self, procs: &mut ProcessManager) {
        if !self.running {
            return;
        }

        let prev = procs.current_pid();
        if let Some(ppid) = prev {
            if procs.get(ppid).map_or(false, |p| p.state == ProcessState::Current) {
                debug!(target: "SCHEDULER", "returning pid {} to ready queue", ppid);
                procs.set_state(ppid, ProcessState::Ready);
            }
        }

        let next = match self.select_next(procs) {
            Some(pid) => pid,
            None => {
                info!(target: "SCHEDULER", "no process to schedule");
                return;
            }
        };

        procs.set_state(next, ProcessState::Current);
        let quantum = procs
            .get(next)
            .map_or(self.config.default_quantum, |p| p.quantum);
        self.time_slice_remaining = quantum;
        if let Some(p) = procs.get_mut(next) {
            p.remaining_quantum = quantum;
        }
        self.stats.context_switches += 1;
        debug!(target: "SCHEDULER", "switching to pid {}", next);

        if let Some(ppid) = prev {
            if ppid != next {
                self.switch_context(procs, ppid, next);
            }
        }
    }

    /// Called when a process enters the ready queue from outside the
    /// scheduler (creation or IPC wake-up): dispatch immediately when the
    /// CPU is idle, or reschedule when a strictly higher priority arrives.
    pub fn notify_ready(&mut self, procs: &mut ProcessManager, pid: Pid) {
        if !self.running {
            return;
        }
        let arriving = match procs.get(pid).map(|p| p.priority) {
            Some(prio) => prio,
            None => return,
        };
        match procs.current().map(|c| c.priority) {
            None => self.schedule(procs),
            Some(current) => {
                if self.config.enable_preemption && arriving > current {
                    self.schedule(procs);
                }
            }
        }
    }

    /// Current process gives up the CPU voluntarily.
    pub fn yield_cpu(&mut self, procs: &mut ProcessManager) {
        self.stats.voluntary_yields += 1;
        match procs.current_pid() {
            Some(pid) => info!(target: "SCHEDULER", "pid {} yielded the CPU", pid),
            None => info!(target: "SCHEDULER", "yield with no current process"),
        }
        self.schedule(procs);
    }

    fn select_next(&mut self, procs: &mut ProcessManager) -> Option<Pid> {
        match self.config.policy {
            SchedPolicy::RoundRobin => Self::select_round_robin(procs),
            SchedPolicy::Priority => Self::select_priority(procs),
            SchedPolicy::PriorityRr => Self::select_priority_rr(procs),
            SchedPolicy::Fcfs => Self::select_fcfs(procs),
        }
    }

    // The ready queue already encodes priority order and FIFO within a
    // level, so every policy reduces to taking its head; the variants
    // record intent and leave room for richer selection later.

    fn select_round_robin(procs: &mut ProcessManager) -> Option<Pid> {
        procs.dequeue_ready()
    }

    fn select_priority(procs: &mut ProcessManager) -> Option<Pid> {
        procs.dequeue_ready()
    }

    fn select_priority_rr(procs: &mut ProcessManager) -> Option<Pid> {
        procs.dequeue_ready()
    }

    fn select_fcfs(procs: &mut ProcessManager) -> Option<Pid> {
        procs.dequeue_ready()
    }

    fn switch_context(&mut self, procs: &mut ProcessManager, from: Pid, to: Pid) {
        if let Some(p) = procs.get_mut(from) {
            self.context.save(p);
        }
        if let Some(p) = procs.get(to) {
            self.context.restore(p);
        }
        debug!(target: "SCHEDULER", "context switch: pid {} -> pid {}", from, to);
    }

    /// Boost starved READY processes. Age accrues in `tick`; this applies
    /// the threshold and relocates boosted processes in the queue.
    pub fn check_aging(&mut self, procs: &mut ProcessManager) {
        if !self.config.enable_aging {
            return;
        }
        for pid in procs.pids() {
            let due = match procs.get(pid) {
                Some(p) => {
                    p.state == ProcessState::Ready
                        && p.age >= self.config.aging_threshold
                        && p.priority < ProcessPriority::Critical
                }
                None => false,
            };
            if due {
                if let Some(p) = procs.get(pid) {
                    info!(
                        target: "SCHEDULER",
                        "aging: boosting priority of pid {} (age {})",
                        pid, p.age
                    );
                }
                procs.boost_priority(pid);
                procs.reset_age(pid);
                self.stats.aging_boosts += 1;
            }
        }
    }

    // ---- Configuration ----

    pub fn set_policy(&mut self, policy: SchedPolicy) {
        self.config.policy = policy;
        info!(target: "SCHEDULER", "policy changed to: {}", policy);
    }

    pub fn policy(&self) -> SchedPolicy {
        self.config.policy
    }

    pub fn set_quantum(&mut self, quantum: u32) {
        let clamped = quantum.clamp(self.config.min_quantum, self.config.max_quantum);
        self.config.default_quantum = clamped;
        info!(target: "SCHEDULER", "time quantum set to: {} ticks", clamped);
    }

    pub fn quantum(&self) -> u32 {
        self.config.default_quantum
    }

    pub fn enable_aging(&mut self, enable: bool) {
        self.config.enable_aging = enable;
        info!(target: "SCHEDULER", "aging {}", if enable { "enabled" } else { "disabled" });
    }

    pub fn set_aging_threshold(&mut self, threshold: u32) {
        self.config.aging_threshold = threshold;
        info!(target: "SCHEDULER", "aging threshold set to: {} ticks", threshold);
    }

    pub fn set_aging_interval(&mut self, interval: u32) {
        self.config.aging_boost_interval = interval.max(1);
        info!(target: "SCHEDULER", "aging check interval set to: {} ticks", interval.max(1));
    }

    pub fn enable_preemption(&mut self, enable: bool) {
        self.config.enable_preemption = enable;
        info!(
            target: "SCHEDULER",
            "preemption {}",
            if enable { "enabled" } else { "disabled" }
        );
    }

    pub fn is_preemptive(&self) -> bool {
        self.config.enable_preemption
    }

    /// Per-process quantum override, clamped like the default. Takes effect
    /// at the process's next dispatch.
    pub fn set_process_quantum(&mut self, procs: &mut ProcessManager, pid: Pid, quantum: u32) {
        let clamped = quantum.clamp(self.config.min_quantum, self.config.max_quantum);
        if let Some(p) = procs.get_mut(pid) {
            p.quantum = clamped;
            info!(target: "SCHEDULER", "quantum for pid {} set to: {} ticks", pid, clamped);
        }
    }

    pub fn process_quantum(&self, procs: &ProcessManager, pid: Pid) -> u32 {
        procs.get(pid).map_or(0, |p| p.quantum)
    }

    // ---- Statistics ----

    pub fn stats(&self) -> SchedStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = SchedStats::default();
        info!(target: "SCHEDULER", "statistics reset");
    }

    pub fn config(&self) -> SchedConfig {
        self.config
    }

    pub fn print_stats(&self) {
        kprintln!();
        kprintln!("=== Scheduler Statistics ===");
        kprintln!("Total Ticks:       {}", self.stats.total_ticks);
        kprintln!("Idle Ticks:        {}", self.stats.idle_ticks);
        kprintln!("Context Switches:  {}", self.stats.context_switches);
        kprintln!("Preemptions:       {}", self.stats.preemptions);
        kprintln!("Voluntary Yields:  {}", self.stats.voluntary_yields);
        kprintln!("Aging Boosts:      {}", self.stats.aging_boosts);
        if self.stats.total_ticks > 0 {
            let busy = self.stats.total_ticks - self.stats.idle_ticks;
            kprintln!("CPU Utilization:   {}%", (busy * 100) / self.stats.total_ticks);
        }
        kprintln!("===========================");
        kprintln!();
    }

    pub fn print_config(&self) {
        kprintln!();
        kprintln!("=== Scheduler Configuration ===");
        kprintln!("Policy:            {}", self.config.policy);
        kprintln!("Default Quantum:   {} ticks", self.config.default_quantum);
        kprintln!(
            "Quantum Range:     {} - {} ticks",
            self.config.min_quantum,
            self.config.max_quantum
        );
        kprintln!(
            "Aging:             {}",
            if self.config.enable_aging { "Enabled" } else { "Disabled" }
        );
        if self.config.enable_aging {
            kprintln!("  Threshold:       {} ticks", self.config.aging_threshold);
            kprintln!("  Check Interval:  {} ticks", self.config.aging_boost_interval);
        }
        kprintln!(
            "Preemption:        {}",
            if self.config.enable_preemption { "Enabled" } else { "Disabled" }
        );
        kprintln!(
            "Scheduler:         {}",
            if self.running { "Running" } else { "Stopped" }
        );
        kprintln!("==============================");
        kprintln!();
    }

    /// One-line status for `ps`.
    pub fn print_status(&self, procs: &ProcessManager) {
        let current = match procs.current() {
            Some(p) => p.name.as_str(),
            None => "idle",
        };
        kprintln!(
            "Scheduler: {} | Policy: {} | Tick: {} | Slice: {} | Current: {}",
            if self.running { "Running" } else { "Stopped" },
            self.config.policy,
            self.current_tick,
            self.time_slice_remaining,
            current
        );
    }
}

lazy_static! {
    static ref SCHEDULER: Mutex<Scheduler> =
        Mutex::new(Scheduler::new(SchedPolicy::Priority, 100));
}

/// Reset the scheduler to its boot configuration. Called once at boot,
/// after the process manager.
pub fn init(policy: SchedPolicy, default_quantum: u32) {
    *SCHEDULER.lock() = Scheduler::new(policy, default_quantum);
}

pub fn start() {
    let mut sched = SCHEDULER.lock();
    let mut procs = process::manager::manager();
    sched.start(&mut procs);
}

pub fn stop() {
    SCHEDULER.lock().stop()
}

pub fn is_running() -> bool {
    SCHEDULER.lock().is_running()
}

pub fn current_tick() -> u32 {
    SCHEDULER.lock().current_tick()
}

/// External tick entry point: one call is one logical tick.
pub fn tick() {
    let mut sched = SCHEDULER.lock();
    let mut procs = process::manager::manager();
    let mut mem = memory::manager();
    sched.tick(&mut procs, &mut mem);
}

pub fn schedule() {
    let mut sched = SCHEDULER.lock();
    let mut procs = process::manager::manager();
    sched.schedule(&mut procs);
}

pub fn yield_cpu() {
    let mut sched = SCHEDULER.lock();
    let mut procs = process::manager::manager();
    sched.yield_cpu(&mut procs);
}

pub fn notify_ready(pid: Pid) {
    let mut sched = SCHEDULER.lock();
    let mut procs = process::manager::manager();
    sched.notify_ready(&mut procs, pid);
}

pub fn set_policy(policy: SchedPolicy) {
    SCHEDULER.lock().set_policy(policy)
}

pub fn policy() -> SchedPolicy {
    SCHEDULER.lock().policy()
}

pub fn set_quantum(quantum: u32) {
    SCHEDULER.lock().set_quantum(quantum)
}

pub fn quantum() -> u32 {
    SCHEDULER.lock().quantum()
}

pub fn enable_aging(enable: bool) {
    SCHEDULER.lock().enable_aging(enable)
}

pub fn set_aging_threshold(threshold: u32) {
    SCHEDULER.lock().set_aging_threshold(threshold)
}

pub fn set_aging_interval(interval: u32) {
    SCHEDULER.lock().set_aging_interval(interval)
}

pub fn enable_preemption(enable: bool) {
    SCHEDULER.lock().enable_preemption(enable)
}

pub fn is_preemptive() -> bool {
    SCHEDULER.lock().is_preemptive()
}

pub fn set_process_quantum(pid: Pid, quantum: u32) {
    let mut sched = SCHEDULER.lock();
    let mut procs = process::manager::manager();
    sched.set_process_quantum(&mut procs, pid, quantum);
}

pub fn process_quantum(pid: Pid) -> u32 {
    let sched = SCHEDULER.lock();
    let procs = process::manager::manager();
    sched.process_quantum(&procs, pid)
}

pub fn stats() -> SchedStats {
    SCHEDULER.lock().stats()
}

pub fn reset_stats() {
    SCHEDULER.lock().reset_stats()
}

pub fn print_stats() {
    SCHEDULER.lock().print_stats()
}

pub fn print_config() {
    SCHEDULER.lock().print_config()
}

pub fn print_status() {
    let sched = SCHEDULER.lock();
    let procs = process::manager::manager();
    sched.print_status(&procs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use x86_64::VirtAddr;

    const ENTRY: u64 = 0x0010_0000;

    fn boot(policy: SchedPolicy) -> (MemoryManager, ProcessManager, Scheduler) {
        let mem = MemoryManager::new();
        let mut procs = ProcessManager::new();
        let mut sched = Scheduler::new(policy, 100);
        sched.start(&mut procs);
        (mem, procs, sched)
    }

    fn spawn(
        mem: &mut MemoryManager,
        procs: &mut ProcessManager,
        sched: &mut Scheduler,
        name: &str,
        priority: ProcessPriority,
        required: u32,
    ) -> Pid {
        let pid = procs
            .create_with_time(mem, name, VirtAddr::new(ENTRY), priority, required, sched.current_tick())
            .expect("create failed");
        sched.notify_ready(procs, pid);
        pid
    }

    #[test]
    fn quantum_is_clamped_to_configured_range() {
        let (_mem, _procs, mut sched) = boot(SchedPolicy::Priority);
        sched.set_quantum(5);
        assert_eq!(sched.quantum(), 10);
        sched.set_quantum(2000);
        assert_eq!(sched.quantum(), 1000);
        sched.set_quantum(300);
        assert_eq!(sched.quantum(), 300);
    }

    #[test]
    fn constructor_clamps_the_default_quantum() {
        let sched = Scheduler::new(SchedPolicy::Priority, 3);
        assert_eq!(sched.quantum(), 10);
    }

    #[test]
    fn tick_is_a_noop_when_stopped() {
        let (mut mem, mut procs, mut sched) = boot(SchedPolicy::Priority);
        spawn(&mut mem, &mut procs, &mut sched, "p", ProcessPriority::Normal, 0);
        sched.stop();
        sched.tick(&mut procs, &mut mem);
        assert_eq!(sched.stats().total_ticks, 0);
        assert_eq!(sched.current_tick(), 0);
    }

    #[test]
    fn idle_ticks_accumulate_without_processes() {
        let (mut mem, mut procs, mut sched) = boot(SchedPolicy::Priority);
        for _ in 0..5 {
            sched.tick(&mut procs, &mut mem);
        }
        assert_eq!(sched.stats().total_ticks, 5);
        assert_eq!(sched.stats().idle_ticks, 5);
        assert_eq!(sched.stats().context_switches, 0);
    }

    #[test]
    fn creation_dispatches_when_idle() {
        let (mut mem, mut procs, mut sched) = boot(SchedPolicy::Priority);
        let pid = spawn(&mut mem, &mut procs, &mut sched, "p", ProcessPriority::Normal, 0);
        assert_eq!(procs.get_state(pid), Some(ProcessState::Current));
        assert_eq!(sched.stats().context_switches, 1);
        assert_eq!(sched.time_slice_remaining(), 150);
    }

    #[test]
    fn equal_priority_arrival_does_not_preempt() {
        let (mut mem, mut procs, mut sched) = boot(SchedPolicy::Priority);
        let a = spawn(&mut mem, &mut procs, &mut sched, "a", ProcessPriority::Normal, 0);
        let b = spawn(&mut mem, &mut procs, &mut sched, "b", ProcessPriority::Normal, 0);
        assert_eq!(procs.get_state(a), Some(ProcessState::Current));
        assert_eq!(procs.get_state(b), Some(ProcessState::Ready));
        assert_eq!(sched.stats().context_switches, 1);
    }

    #[test]
    fn yield_reschedules_and_counts() {
        let (mut mem, mut procs, mut sched) = boot(SchedPolicy::Priority);
        let a = spawn(&mut mem, &mut procs, &mut sched, "a", ProcessPriority::Normal, 0);
        let b = spawn(&mut mem, &mut procs, &mut sched, "b", ProcessPriority::Normal, 0);
        sched.yield_cpu(&mut procs);
        assert_eq!(sched.stats().voluntary_yields, 1);
        assert_eq!(procs.get_state(b), Some(ProcessState::Current));
        assert_eq!(procs.get_state(a), Some(ProcessState::Ready));
    }

    #[test]
    fn preemption_disabled_lets_the_slice_run_dry_quietly() {
        let (mut mem, mut procs, mut sched) = boot(SchedPolicy::Priority);
        sched.enable_preemption(false);
        let a = spawn(&mut mem, &mut procs, &mut sched, "a", ProcessPriority::Normal, 0);
        let _b = spawn(&mut mem, &mut procs, &mut sched, "b", ProcessPriority::Normal, 0);
        for _ in 0..400 {
            sched.tick(&mut procs, &mut mem);
        }
        assert_eq!(procs.get_state(a), Some(ProcessState::Current));
        assert_eq!(sched.stats().preemptions, 0);
    }

    #[test]
    fn per_process_quantum_override_applies_at_dispatch() {
        let (mut mem, mut procs, mut sched) = boot(SchedPolicy::Priority);
        let a = spawn(&mut mem, &mut procs, &mut sched, "a", ProcessPriority::Normal, 0);
        let b = spawn(&mut mem, &mut procs, &mut sched, "b", ProcessPriority::Normal, 0);
        sched.set_process_quantum(&mut procs, b, 20);
        assert_eq!(sched.process_quantum(&procs, b), 20);
        // Below the minimum clamps up.
        sched.set_process_quantum(&mut procs, a, 1);
        assert_eq!(sched.process_quantum(&procs, a), 10);
        // Run a's 10-tick slice out; b is dispatched with its override.
        for _ in 0..150 {
            sched.tick(&mut procs, &mut mem);
        }
        // a was preempted at its default 150 first; after b's dispatch the
        // slice is b's 20.
        assert_eq!(procs.get_state(b), Some(ProcessState::Current));
        assert_eq!(sched.time_slice_remaining(), 20);
        assert_eq!(sched.process_quantum(&procs, 99), 0);
    }

    #[test]
    fn aging_disabled_never_boosts() {
        let (mut mem, mut procs, mut sched) = boot(SchedPolicy::Priority);
        sched.enable_aging(false);
        let _h = spawn(&mut mem, &mut procs, &mut sched, "h", ProcessPriority::High, 0);
        let l = spawn(&mut mem, &mut procs, &mut sched, "l", ProcessPriority::Low, 0);
        for _ in 0..500 {
            sched.tick(&mut procs, &mut mem);
        }
        assert_eq!(procs.get(l).map(|p| p.priority), Some(ProcessPriority::Low));
        assert_eq!(sched.stats().aging_boosts, 0);
    }

    #[test]
    fn all_policies_take_the_queue_head() {
        for policy in [
            SchedPolicy::RoundRobin,
            SchedPolicy::Priority,
            SchedPolicy::PriorityRr,
            SchedPolicy::Fcfs,
        ] {
            let (mut mem, mut procs, mut sched) = boot(policy);
            let a = spawn(&mut mem, &mut procs, &mut sched, "a", ProcessPriority::Normal, 0);
            assert_eq!(procs.get_state(a), Some(ProcessState::Current), "{:?}", policy);
        }
    }

    #[test]
    fn remaining_quantum_tracks_the_live_slice() {
        let (mut mem, mut procs, mut sched) = boot(SchedPolicy::Priority);
        let a = spawn(&mut mem, &mut procs, &mut sched, "a", ProcessPriority::Normal, 0);
        for _ in 0..10 {
            sched.tick(&mut procs, &mut mem);
        }
        let p = procs.get(a).unwrap();
        assert_eq!(p.remaining_quantum, 140);
        assert!(p.remaining_quantum <= p.quantum);
    }

    #[test]
    fn stats_reset_clears_counters() {
        let (mut mem, mut procs, mut sched) = boot(SchedPolicy::Priority);
        spawn(&mut mem, &mut procs, &mut sched, "a", ProcessPriority::Normal, 0);
        for _ in 0..3 {
            sched.tick(&mut procs, &mut mem);
        }
        assert!(sched.stats().total_ticks > 0);
        sched.reset_stats();
        assert_eq!(sched.stats(), SchedStats::default());
    }

    #[test]
    fn sleeping_process_wakes_after_its_countdown() {
        let (mut mem, mut procs, mut sched) = boot(SchedPolicy::Priority);
        let a = spawn(&mut mem, &mut procs, &mut sched, "a", ProcessPriority::Normal, 0);
        let b = spawn(&mut mem, &mut procs, &mut sched, "b", ProcessPriority::Normal, 0);
        procs.sleep(b, 5);
        assert_eq!(procs.get_state(b), Some(ProcessState::Sleeping));
        for _ in 0..5 {
            sched.tick(&mut procs, &mut mem);
        }
        assert_eq!(procs.get_state(b), Some(ProcessState::Ready));
        assert_eq!(procs.get_state(a), Some(ProcessState::Current));
    }
}
