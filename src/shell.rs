// Command shell: parses text commands and drives the core operations.
// `handle_line` is the whole surface; `run` feeds it from the serial
// byte source.
use alloc::string::String;
use x86_64::VirtAddr;

use crate::process::ProcessPriority;
use crate::{kprint, kprintln, memory, process, scheduler, selftest, serial};

/// Where shell-created processes nominally begin executing. Sits in the
/// kernel text region below the heap.
pub const DEFAULT_ENTRY: u64 = 0x0010_0000;

const MAX_INPUT: usize = 128;

pub fn handle_line(line: &str) {
    let mut parts = line.split_whitespace();
    let cmd = match parts.next() {
        Some(c) => c,
        None => return,
    };
    match cmd {
        "help" => print_help(),
        "memstats" => memory::print_stats(),
        "memtest" => selftest::run_memory_test(),
        "ps" => {
            process::print_table();
            scheduler::print_status();
        }
        "proctest" => selftest::run_process_test(),
        "create" => cmd_create(parts.next(), parts.next(), parts.next()),
        "tick" => cmd_tick(parts.next()),
        "kill" => cmd_kill(parts.next()),
        "info" => cmd_info(parts.next()),
        "schedstats" => scheduler::print_stats(),
        "schedconf" => scheduler::print_config(),
        "clear" => kprint!("\x1b[2J\x1b[H"),
        _ => {
            kprintln!("Unknown command: {}", cmd);
            kprintln!("Type 'help' for available commands");
        }
    }
}

fn print_help() {
    kprintln!("Available commands:");
    kprintln!("  help                           - Show this help message");
    kprintln!("  memstats                       - Display memory statistics");
    kprintln!("  memtest                        - Run memory manager tests");
    kprintln!("  ps                             - Show process table and scheduler status");
    kprintln!("  proctest                       - Run process manager tests");
    kprintln!("  create <name> <priority> [t]   - Create a process (t = required ticks)");
    kprintln!("  tick [n]                       - Advance the scheduler n ticks (default 1)");
    kprintln!("  kill <pid>                     - Terminate a process");
    kprintln!("  info <pid>                     - Show detailed process information");
    kprintln!("  schedstats                     - Display scheduler statistics");
    kprintln!("  schedconf                      - Display scheduler configuration");
    kprintln!("  clear                          - Clear the screen");
    kprintln!("Priorities: critical|high|normal|low (or c|h|n|l, or 0-3)");
}

fn cmd_create(name: Option<&str>, priority: Option<&str>, ticks: Option<&str>) {
    let (name, priority) = match (name, priority) {
        (Some(n), Some(p)) => (n, p),
        _ => {
            kprintln!("Usage: create <name> <priority> [ticks]");
            return;
        }
    };
    let priority = match ProcessPriority::parse(priority) {
        Some(p) => p,
        None => {
            kprintln!("Invalid priority '{}': expected critical|high|normal|low", priority);
            return;
        }
    };
    let required = match ticks {
        Some(t) => match t.parse::<u32>() {
            Ok(v) => v,
            Err(_) => {
                kprintln!("Invalid tick count '{}'", t);
                return;
            }
        },
        None => 0,
    };

    match process::create_with_time(name, VirtAddr::new(DEFAULT_ENTRY), priority, required) {
        Some(pid) => {
            scheduler::notify_ready(pid);
            kprintln!("Created process '{}' with PID {}", name, pid);
        }
        None => kprintln!("Failed to create process '{}'", name),
    }
}

fn cmd_tick(count: Option<&str>) {
    let n = match count {
        Some(t) => match t.parse::<u32>() {
            Ok(v) => v,
            Err(_) => {
                kprintln!("Invalid tick count '{}'", t);
                return;
            }
        },
        None => 1,
    };
    for _ in 0..n {
        scheduler::tick();
    }
    kprintln!("Advanced {} tick(s), now at tick {}", n, scheduler::current_tick());
}

fn cmd_kill(pid: Option<&str>) {
    match pid.and_then(|p| p.parse::<u32>().ok()) {
        Some(pid) => process::terminate(pid),
        None => kprintln!("Usage: kill <pid>"),
    }
}

fn cmd_info(pid: Option<&str>) {
    match pid.and_then(|p| p.parse::<u32>().ok()) {
        Some(pid) => process::print_info(pid),
        None => kprintln!("Usage: info <pid>"),
    }
}

/// Interactive loop: prompt, read a line from the byte source, dispatch.
/// Returns when the source is exhausted.
pub fn run() {
    loop {
        kprint!("tickos> ");
        let line = match read_line() {
            Some(l) => l,
            None => return,
        };
        handle_line(line.trim());
    }
}

fn read_line() -> Option<String> {
    let mut buf = String::new();
    loop {
        let byte = serial::get_byte()?;
        match byte {
            b'\r' | b'\n' => return Some(buf),
            0x08 | 0x7F => {
                buf.pop();
            }
            0x20..=0x7E if buf.len() < MAX_INPUT - 1 => buf.push(byte as char),
            _ => {}
        }
    }
}
