// Memory manager: fixed-region first-fit heap allocator plus the per-process
// stack pool. The region layout is part of the external contract with the
// boot stub and linker, so the constants below are bit-exact.
use alloc::vec;
use alloc::vec::Vec;
use lazy_static::lazy_static;
use log::{info, warn};
use spin::Mutex;
use x86_64::VirtAddr;

use crate::kprintln;

/// Heap base address.
pub const HEAP_START: u64 = 0x0020_0000;
/// Heap size in bytes (30 MiB).
pub const HEAP_SIZE: u64 = 0x01E0_0000;
/// Per-process stack size (16 KiB).
pub const STACK_SIZE: u64 = 0x4000;
/// Number of stack slots; slot i sits at `stack pool base + i * STACK_SIZE`.
pub const MAX_STACKS: usize = 32;
/// Upper bound on heap bookkeeping descriptors.
pub const MAX_BLOCKS: usize = 1024;

/// A block is only split when the remainder would exceed this.
const SPLIT_THRESHOLD: u64 = 32;
const STACK_POOL_START: u64 = HEAP_START + HEAP_SIZE;
const REGION_SIZE: u64 = HEAP_SIZE + MAX_STACKS as u64 * STACK_SIZE;

#[derive(Debug, Clone, Copy)]
struct HeapBlock {
    addr: u64,
    size: u64,
    free: bool,
}

#[derive(Debug, Clone, Copy)]
struct StackSlot {
    base: u64,
    top: u64,
    size: u64,
    pid: u32,
    free: bool,
}

impl StackSlot {
    const fn empty() -> Self {
        StackSlot {
            base: 0,
            top: 0,
            size: 0,
            pid: 0,
            free: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub total_heap: u64,
    pub used_heap: u64,
    pub free_heap: u64,
    pub total_stacks: u64,
    pub num_stacks: u32,
    pub num_allocations: u32,
    pub num_blocks: u32,
}

pub struct MemoryManager {
    blocks: Vec<HeapBlock>,
    heap_used: u64,
    stacks: [StackSlot; MAX_STACKS],
    num_stacks: u32,
    // Backing bytes for the whole fixed region, so zero-on-claim and
    // realloc copies are observable operations rather than bookkeeping
    // fiction. Indexed by offset from HEAP_START.
    bytes: Vec<u8>,
}

impl MemoryManager {
    pub fn new() -> Self {
        let mut blocks = Vec::with_capacity(MAX_BLOCKS);
        blocks.push(HeapBlock {
            addr: HEAP_START,
            size: HEAP_SIZE,
            free: true,
        });
        MemoryManager {
            blocks,
            heap_used: 0,
            stacks: [StackSlot::empty(); MAX_STACKS],
            num_stacks: 0,
            bytes: vec![0; REGION_SIZE as usize],
        }
    }

    fn find_free_block(&self, size: u64) -> Option<usize> {
        self.blocks.iter().position(|b| b.free && b.size >= size)
    }

    fn split_block(&mut self, index: usize, size: u64) {
        let block = self.blocks[index];
        if block.size > size + SPLIT_THRESHOLD && self.blocks.len() < MAX_BLOCKS {
            self.blocks.push(HeapBlock {
                addr: block.addr + size,
                size: block.size - size,
                free: true,
            });
            self.blocks[index].size = size;
        }
    }

    /// Merge adjacent free descriptors until a full pass makes no progress.
    fn coalesce(&mut self) {
        loop {
            let mut merged = false;
            'scan: for i in 0..self.blocks.len() {
                if !self.blocks[i].free {
                    continue;
                }
                let end = self.blocks[i].addr + self.blocks[i].size;
                for j in 0..self.blocks.len() {
                    if j != i && self.blocks[j].free && self.blocks[j].addr == end {
                        self.blocks[i].size += self.blocks[j].size;
                        self.blocks.remove(j);
                        merged = true;
                        break 'scan;
                    }
                }
            }
            if !merged {
                break;
            }
        }
    }

    /// First-fit allocation. Returns the block base, or `None` when the heap
    /// cannot satisfy the request even after a coalesce pass.
    pub fn allocate(&mut self, size: u64) -> Option<VirtAddr> {
        if size == 0 {
            return None;
        }
        let size = (size + 3) & !3;

        let mut found = self.find_free_block(size);
        if found.is_none() {
            self.coalesce();
            found = self.find_free_block(size);
        }
        let index = match found {
            Some(i) => i,
            None => {
                warn!(target: "MEMORY", "allocation of {} bytes failed: out of memory", size);
                return None;
            }
        };

        self.split_block(index, size);
        self.blocks[index].free = false;
        self.heap_used += self.blocks[index].size;
        Some(VirtAddr::new(self.blocks[index].addr))
    }

    pub fn free(&mut self, ptr: Option<VirtAddr>) {
        let addr = match ptr {
            Some(p) => p.as_u64(),
            None => return,
        };
        match self.blocks.iter().position(|b| b.addr == addr) {
            None => warn!(target: "MEMORY", "attempt to free invalid pointer {:#010X}", addr),
            Some(i) if self.blocks[i].free => {
                warn!(target: "MEMORY", "double free at {:#010X}", addr)
            }
            Some(i) => {
                self.blocks[i].free = true;
                self.heap_used -= self.blocks[i].size;
                self.coalesce();
            }
        }
    }

    pub fn reallocate(&mut self, ptr: Option<VirtAddr>, new_size: u64) -> Option<VirtAddr> {
        let old = match ptr {
            Some(p) => p,
            None => return self.allocate(new_size),
        };
        if new_size == 0 {
            self.free(Some(old));
            return None;
        }

        let old_size = match self
            .blocks
            .iter()
            .find(|b| b.addr == old.as_u64() && !b.free)
        {
            Some(b) => b.size,
            None => {
                warn!(target: "MEMORY", "reallocate of invalid pointer {:#010X}", old.as_u64());
                return None;
            }
        };

        if new_size <= old_size {
            return Some(old);
        }

        let new = self.allocate(new_size)?;
        let src = (old.as_u64() - HEAP_START) as usize;
        let dst = (new.as_u64() - HEAP_START) as usize;
        let len = old_size as usize;
        self.bytes.copy_within(src..src + len, dst);
        self.free(Some(old));
        Some(new)
    }

    /// Allocate `count * size` bytes and zero them.
    pub fn zero_allocate(&mut self, count: u64, size: u64) -> Option<VirtAddr> {
        let total = count.checked_mul(size)?;
        let ptr = self.allocate(total)?;
        let start = (ptr.as_u64() - HEAP_START) as usize;
        self.bytes[start..start + total as usize].fill(0);
        Some(ptr)
    }

    /// Claim a stack slot for `pid`, zero it, and return the stack top
    /// (stacks grow downward).
    pub fn stack_alloc(&mut self, pid: u32) -> Option<VirtAddr> {
        for i in 0..MAX_STACKS {
            if self.stacks[i].free {
                let base = STACK_POOL_START + i as u64 * STACK_SIZE;
                let top = base + STACK_SIZE;
                self.stacks[i] = StackSlot {
                    base,
                    top,
                    size: STACK_SIZE,
                    pid,
                    free: false,
                };
                self.num_stacks += 1;

                let start = (base - HEAP_START) as usize;
                self.bytes[start..start + STACK_SIZE as usize].fill(0);
                return Some(VirtAddr::new(top));
            }
        }
        warn!(target: "MEMORY", "no free stack slot for pid {}", pid);
        None
    }

    pub fn stack_free(&mut self, pid: u32) {
        for slot in self.stacks.iter_mut() {
            if !slot.free && slot.pid == pid {
                *slot = StackSlot::empty();
                self.num_stacks -= 1;
                return;
            }
        }
    }

    pub fn stack_base(&self, pid: u32) -> Option<VirtAddr> {
        self.stacks
            .iter()
            .find(|s| !s.free && s.pid == pid)
            .map(|s| VirtAddr::new(s.base))
    }

    pub fn stack_top(&self, pid: u32) -> Option<VirtAddr> {
        self.stacks
            .iter()
            .find(|s| !s.free && s.pid == pid)
            .map(|s| VirtAddr::new(s.top))
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            total_heap: HEAP_SIZE,
            used_heap: self.heap_used,
            free_heap: HEAP_SIZE - self.heap_used,
            total_stacks: self.num_stacks as u64 * STACK_SIZE,
            num_stacks: self.num_stacks,
            num_allocations: self.blocks.iter().filter(|b| !b.free).count() as u32,
            num_blocks: self.blocks.len() as u32,
        }
    }

    /// Public coalesce entry point.
    pub fn defragment(&mut self) {
        self.coalesce();
        info!(target: "MEMORY", "heap defragmented");
    }

    pub fn print_stats(&self) {
        let stats = self.stats();
        kprintln!();
        kprintln!("=== Memory Statistics ===");
        kprintln!("Heap Total:  {} KB", stats.total_heap / 1024);
        kprintln!("Heap Used:   {} KB", stats.used_heap / 1024);
        kprintln!("Heap Free:   {} KB", stats.free_heap / 1024);
        kprintln!("Allocations: {}", stats.num_allocations);
        kprintln!("Stacks:      {} ({} KB)", stats.num_stacks, stats.total_stacks / 1024);
        kprintln!("Heap Blocks: {}", stats.num_blocks);
        kprintln!("========================");
        kprintln!();
    }

    /// Read bytes out of the backing region. `None` when the range falls
    /// outside the managed region.
    pub fn peek(&self, addr: VirtAddr, len: usize) -> Option<&[u8]> {
        let start = addr.as_u64().checked_sub(HEAP_START)? as usize;
        let end = start.checked_add(len)?;
        self.bytes.get(start..end)
    }

    /// Write bytes into the backing region. Returns false when the range
    /// falls outside the managed region.
    pub fn poke(&mut self, addr: VirtAddr, data: &[u8]) -> bool {
        let start = match addr.as_u64().checked_sub(HEAP_START) {
            Some(s) => s as usize,
            None => return false,
        };
        match self.bytes.get_mut(start..start + data.len()) {
            Some(dst) => {
                dst.copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn assert_coalesced(&self) {
        for i in 0..self.blocks.len() {
            if !self.blocks[i].free {
                continue;
            }
            let end = self.blocks[i].addr + self.blocks[i].size;
            assert!(
                !self.blocks.iter().any(|b| b.free && b.addr == end),
                "adjacent free blocks left after coalesce"
            );
        }
    }
}

lazy_static! {
    static ref MEMORY_MANAGER: Mutex<MemoryManager> = Mutex::new(MemoryManager::new());
}

pub(crate) fn manager() -> spin::MutexGuard<'static, MemoryManager> {
    MEMORY_MANAGER.lock()
}

/// Reset the memory manager to its boot state. Called once at boot, before
/// the process manager comes up.
pub fn init() {
    *MEMORY_MANAGER.lock() = MemoryManager::new();
    info!(target: "MEMORY", "memory manager initialized");
    info!(
        target: "MEMORY",
        "heap {:#010X}..{:#010X} ({} MB)",
        HEAP_START,
        HEAP_START + HEAP_SIZE,
        HEAP_SIZE / 1024 / 1024
    );
}

pub fn allocate(size: u64) -> Option<VirtAddr> {
    MEMORY_MANAGER.lock().allocate(size)
}

pub fn free(ptr: Option<VirtAddr>) {
    MEMORY_MANAGER.lock().free(ptr)
}

pub fn reallocate(ptr: Option<VirtAddr>, new_size: u64) -> Option<VirtAddr> {
    MEMORY_MANAGER.lock().reallocate(ptr, new_size)
}

pub fn zero_allocate(count: u64, size: u64) -> Option<VirtAddr> {
    MEMORY_MANAGER.lock().zero_allocate(count, size)
}

pub fn stack_alloc(pid: u32) -> Option<VirtAddr> {
    MEMORY_MANAGER.lock().stack_alloc(pid)
}

pub fn stack_free(pid: u32) {
    MEMORY_MANAGER.lock().stack_free(pid)
}

pub fn stack_base(pid: u32) -> Option<VirtAddr> {
    MEMORY_MANAGER.lock().stack_base(pid)
}

pub fn stack_top(pid: u32) -> Option<VirtAddr> {
    MEMORY_MANAGER.lock().stack_top(pid)
}

pub fn stats() -> MemoryStats {
    MEMORY_MANAGER.lock().stats()
}

pub fn defragment() {
    MEMORY_MANAGER.lock().defragment()
}

pub fn print_stats() {
    MEMORY_MANAGER.lock().print_stats()
}

/// Copy bytes out of the backing region (selftest helper).
pub fn peek_bytes(addr: VirtAddr, len: usize) -> Option<Vec<u8>> {
    MEMORY_MANAGER.lock().peek(addr, len).map(|s| s.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_allocation_fails() {
        let mut mm = MemoryManager::new();
        assert_eq!(mm.allocate(0), None);
        assert_eq!(mm.stats().used_heap, 0);
    }

    #[test]
    fn allocations_are_four_byte_aligned() {
        let mut mm = MemoryManager::new();
        let a = mm.allocate(5).unwrap();
        let b = mm.allocate(4).unwrap();
        assert_eq!(a.as_u64(), HEAP_START);
        assert_eq!(b.as_u64(), HEAP_START + 8);
        assert_eq!(mm.stats().used_heap, 12);
    }

    #[test]
    fn first_fit_reuses_freed_block() {
        let mut mm = MemoryManager::new();
        let a = mm.allocate(512).unwrap();
        let b = mm.allocate(2048).unwrap();
        let c = mm.allocate(256).unwrap();
        mm.free(Some(b));
        let d = mm.allocate(1024).unwrap();
        assert_eq!(d, b, "new allocation should land at the freed base");
        assert_eq!(mm.stats().used_heap, 512 + 1024 + 256);
        assert_eq!(mm.stats().free_heap, HEAP_SIZE - (512 + 1024 + 256));
        let _ = (a, c);
    }

    #[test]
    fn freeing_everything_coalesces_to_one_block() {
        let mut mm = MemoryManager::new();
        let a = mm.allocate(512).unwrap();
        let b = mm.allocate(2048).unwrap();
        let c = mm.allocate(256).unwrap();
        mm.free(Some(b));
        let d = mm.allocate(1024).unwrap();
        mm.free(Some(a));
        mm.free(Some(d));
        mm.free(Some(c));
        mm.assert_coalesced();
        assert_eq!(mm.stats().num_blocks, 1);
        assert_eq!(mm.stats().free_heap, HEAP_SIZE);
        assert_eq!(mm.stats().used_heap, 0);
    }

    #[test]
    fn every_free_leaves_no_adjacent_free_blocks() {
        let mut mm = MemoryManager::new();
        let mut live = alloc::vec::Vec::new();
        for size in [64u64, 700, 12, 4096, 96, 256, 2000, 40] {
            live.push(mm.allocate(size).unwrap());
        }
        // Free in an order that creates holes next to holes.
        for index in [1usize, 3, 2, 6, 5, 0, 7, 4] {
            mm.free(Some(live[index]));
            mm.assert_coalesced();
        }
        assert_eq!(mm.stats().free_heap, HEAP_SIZE);
    }

    #[test]
    fn double_free_is_a_logged_noop() {
        let mut mm = MemoryManager::new();
        let a = mm.allocate(128).unwrap();
        mm.free(Some(a));
        let before = mm.stats();
        mm.free(Some(a));
        assert_eq!(mm.stats(), before);
    }

    #[test]
    fn invalid_pointer_free_is_a_logged_noop() {
        let mut mm = MemoryManager::new();
        let _a = mm.allocate(128).unwrap();
        let before = mm.stats();
        mm.free(Some(VirtAddr::new(HEAP_START + 12345)));
        assert_eq!(mm.stats(), before);
        mm.free(None);
        assert_eq!(mm.stats(), before);
    }

    #[test]
    fn allocate_then_free_restores_free_byte_total() {
        let mut mm = MemoryManager::new();
        let initial = mm.stats().free_heap;
        let p = mm.allocate(4096).unwrap();
        assert!(mm.stats().free_heap < initial);
        mm.free(Some(p));
        assert_eq!(mm.stats().free_heap, initial);
    }

    #[test]
    fn small_remainder_is_not_split() {
        let mut mm = MemoryManager::new();
        let a = mm.allocate(104).unwrap();
        mm.free(Some(a));
        // Carve a 104-byte hole between two live blocks, then request 96:
        // the 8-byte remainder is below the split threshold.
        let a = mm.allocate(104).unwrap();
        let _guard = mm.allocate(64).unwrap();
        mm.free(Some(a));
        let b = mm.allocate(96).unwrap();
        assert_eq!(b, a);
        assert_eq!(mm.stats().used_heap, 104 + 64);
    }

    #[test]
    fn exhaustion_returns_none_and_keeps_bookkeeping() {
        let mut mm = MemoryManager::new();
        let whole = mm.allocate(HEAP_SIZE).unwrap();
        assert_eq!(mm.allocate(4), None);
        mm.free(Some(whole));
        assert_eq!(mm.stats().free_heap, HEAP_SIZE);
        assert_eq!(mm.allocate(HEAP_SIZE + 4), None);
    }

    #[test]
    fn reallocate_in_place_when_block_is_large_enough() {
        let mut mm = MemoryManager::new();
        let a = mm.allocate(256).unwrap();
        assert_eq!(mm.reallocate(Some(a), 200), Some(a));
        assert_eq!(mm.reallocate(Some(a), 256), Some(a));
    }

    #[test]
    fn reallocate_moves_and_copies_contents() {
        let mut mm = MemoryManager::new();
        let a = mm.allocate(64).unwrap();
        let _pin = mm.allocate(64).unwrap();
        let pattern: alloc::vec::Vec<u8> = (0..64).collect();
        assert!(mm.poke(a, &pattern));
        let b = mm.reallocate(Some(a), 256).unwrap();
        assert_ne!(a, b);
        assert_eq!(mm.peek(b, 64).unwrap(), &pattern[..]);
        // The old block is free again.
        let c = mm.allocate(64).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn reallocate_null_and_zero_edges() {
        let mut mm = MemoryManager::new();
        let p = mm.reallocate(None, 128).unwrap();
        assert_eq!(mm.reallocate(Some(p), 0), None);
        assert_eq!(mm.stats().used_heap, 0);
    }

    #[test]
    fn zero_allocate_clears_previous_contents() {
        let mut mm = MemoryManager::new();
        let a = mm.allocate(40).unwrap();
        assert!(mm.poke(a, &[0xFF; 40]));
        mm.free(Some(a));
        let b = mm.zero_allocate(10, 4).unwrap();
        assert_eq!(b, a);
        assert_eq!(mm.peek(b, 40).unwrap(), &[0u8; 40]);
    }

    #[test]
    fn stack_slots_follow_the_fixed_layout() {
        let mut mm = MemoryManager::new();
        let top1 = mm.stack_alloc(1).unwrap();
        let top2 = mm.stack_alloc(2).unwrap();
        assert_eq!(top1.as_u64(), STACK_POOL_START + STACK_SIZE);
        assert_eq!(top2.as_u64(), STACK_POOL_START + 2 * STACK_SIZE);
        assert_eq!(mm.stack_base(1).unwrap().as_u64(), STACK_POOL_START);
        assert_eq!(
            mm.stack_top(1).unwrap().as_u64() - mm.stack_base(1).unwrap().as_u64(),
            STACK_SIZE
        );
    }

    #[test]
    fn stack_pool_exhausts_at_capacity() {
        let mut mm = MemoryManager::new();
        for pid in 1..=MAX_STACKS as u32 {
            assert!(mm.stack_alloc(pid).is_some());
        }
        assert_eq!(mm.stack_alloc(99), None);
        mm.stack_free(7);
        let top = mm.stack_alloc(99).unwrap();
        // Slot 6 (pid 7's) is the first free slot again.
        assert_eq!(top.as_u64(), STACK_POOL_START + 7 * STACK_SIZE);
    }

    #[test]
    fn stack_free_clears_ownership() {
        let mut mm = MemoryManager::new();
        mm.stack_alloc(5);
        assert!(mm.stack_base(5).is_some());
        mm.stack_free(5);
        assert_eq!(mm.stack_base(5), None);
        assert_eq!(mm.stack_top(5), None);
        assert_eq!(mm.stats().num_stacks, 0);
        // Unknown pid is a no-op.
        mm.stack_free(42);
        assert_eq!(mm.stats().num_stacks, 0);
    }

    #[test]
    fn stack_is_zeroed_on_claim() {
        let mut mm = MemoryManager::new();
        let top = mm.stack_alloc(3).unwrap();
        let base = mm.stack_base(3).unwrap();
        assert!(mm.poke(base, &[0xAB; 64]));
        mm.stack_free(3);
        let top2 = mm.stack_alloc(4).unwrap();
        assert_eq!(top, top2);
        assert_eq!(mm.peek(base, 64).unwrap(), &[0u8; 64]);
    }
}
