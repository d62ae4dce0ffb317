// Built-in self tests, reachable from the shell as `memtest` and
// `proctest`. These narrate what they exercise and print YES/NO checks
// rather than asserting, so a failure leaves the system running.
use x86_64::VirtAddr;

use crate::process::{ProcessPriority, ProcessState};
use crate::shell::DEFAULT_ENTRY;
use crate::{kprintln, memory, process, scheduler};

pub fn run_memory_test() {
    kprintln!();
    kprintln!("=== Memory Manager Test ===");

    kprintln!("Test 1: Basic allocation...");
    if let Some(ptr) = memory::allocate(1024) {
        kprintln!("  Allocated 1KB at {:#010X}", ptr.as_u64());
        memory::free(Some(ptr));
        kprintln!("  Freed 1KB");
    }

    kprintln!("Test 2: Multiple allocations...");
    let a = memory::allocate(512);
    let b = memory::allocate(2048);
    let c = memory::allocate(256);
    kprintln!("  Allocated 512B, 2KB, 256B");

    kprintln!("Test 3: Free middle block...");
    memory::free(b);
    kprintln!("  Freed 2KB block");

    kprintln!("Test 4: Allocate in freed space...");
    let d = memory::allocate(1024);
    match (b, d) {
        (Some(b), Some(d)) => {
            kprintln!("  Allocated 1KB at {:#010X}", d.as_u64());
            kprintln!("  Reused freed base: {}", if b == d { "YES" } else { "NO" });
        }
        _ => kprintln!("  Allocation failed"),
    }

    kprintln!("Test 5: Zeroed allocation...");
    if let Some(arr) = memory::zero_allocate(10, 4) {
        let zeroed = memory::peek_bytes(arr, 40)
            .map_or(false, |bytes| bytes.iter().all(|&b| b == 0));
        kprintln!("  Allocated and zeroed array of 10 words");
        kprintln!("  All bytes zero: {}", if zeroed { "YES" } else { "NO" });
        memory::free(Some(arr));
    }

    kprintln!("Test 6: Stack allocation...");
    let s1 = memory::stack_alloc(9001);
    let s2 = memory::stack_alloc(9002);
    if let (Some(s1), Some(s2)) = (s1, s2) {
        kprintln!("  Stack 1 top at {:#010X}", s1.as_u64());
        kprintln!("  Stack 2 top at {:#010X}", s2.as_u64());
        memory::stack_free(9001);
        memory::stack_free(9002);
        kprintln!("  Freed both stacks");
    }

    memory::free(a);
    memory::free(c);
    memory::free(d);

    kprintln!("=== Test Complete ===");
    memory::print_stats();
}

pub fn run_process_test() {
    kprintln!();
    kprintln!("=== Process Manager Test ===");
    let entry = VirtAddr::new(DEFAULT_ENTRY);

    kprintln!("Test 1: Creating processes at three priorities...");
    let low = process::create_with_time("pt-low", entry, ProcessPriority::Low, 400);
    let norm = process::create_with_time("pt-norm", entry, ProcessPriority::Normal, 400);
    let high = process::create_with_time("pt-high", entry, ProcessPriority::High, 400);
    let (low, norm, high) = match (low, norm, high) {
        (Some(l), Some(n), Some(h)) => {
            kprintln!("  Created PIDs {}, {}, {}", l, n, h);
            (l, n, h)
        }
        _ => {
            kprintln!("  Creation failed, aborting test");
            return;
        }
    };
    for pid in [low, norm, high] {
        scheduler::notify_ready(pid);
    }

    kprintln!("Test 2: Highest priority runs first...");
    let current = process::current_pid();
    kprintln!(
        "  Current is pt-high: {}",
        if current == Some(high) { "YES" } else { "NO" }
    );

    kprintln!("Test 3: Advancing 25 ticks...");
    for _ in 0..25 {
        scheduler::tick();
    }
    let cpu = process::stats();
    kprintln!("  Active processes: {}", cpu.active_processes);
    process::print_table();

    kprintln!("Test 4: Message passing...");
    let sent = process::send(norm, 0xCAFE).is_ok();
    kprintln!("  Send to pt-norm: {}", if sent { "YES" } else { "NO" });
    kprintln!(
        "  pt-norm has a message: {}",
        if process::has_message(norm) { "YES" } else { "NO" }
    );

    kprintln!("Test 5: Killing test processes...");
    for pid in [low, norm, high] {
        process::terminate(pid);
    }
    scheduler::schedule();
    kprintln!(
        "  All gone: {}",
        if process::get_state(low).is_none()
            && process::get_state(norm).is_none()
            && process::get_state(high).is_none()
        {
            "YES"
        } else {
            "NO"
        }
    );
    kprintln!(
        "  Ready queue empty: {}",
        if process::count_by_state(ProcessState::Ready) == 0 { "YES" } else { "NO" }
    );

    kprintln!("=== Test Complete ===");
    kprintln!();
}
