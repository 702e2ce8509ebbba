use lazy_static::lazy_static;
use std::sync::Mutex;

use super::allocator::TagAllocator;

lazy_static! {
    pub static ref tag_memory: Mutex<Option<TagAllocator>> = Mutex::new(None);
}

/**
 * Build the process wide heap.
 *
 * A repeated call resets the whole heap: the old region is given back to
 * the OS and a fresh one is mapped, so every handle from before is dead.
 *
 * @return true when the heap is ready, false when the region cannot be
 * mapped.
 */
pub fn tainit() -> bool {
    let mut memory_guard = tag_memory.lock().unwrap();

    if let Some(old_allocator) = memory_guard.take() {
        old_allocator.teardown();
    }

    match TagAllocator::init() {
        Some(allocator) => {
            *memory_guard = Some(allocator);
            true
        }
        None => false,
    }
}

/**
 * Tear the process wide heap down and give the region back to the OS.
 * Without a heap this is a no-op.
 */
pub fn tateardown() {
    let mut memory_guard = tag_memory.lock().unwrap();

    if let Some(allocator) = memory_guard.take() {
        allocator.teardown();
    }
}

/**
 * Run the heap checker over the process wide heap.
 *
 * @param verbose Print a record per block on top of the error report.
 * @return Number of violations found, zero when no heap exists yet.
 */
pub fn tacheck(verbose: bool) -> usize {
    let memory_guard = tag_memory.lock().unwrap();

    match memory_guard.as_ref() {
        Some(allocator) => allocator.check_heap(verbose),
        None => 0,
    }
}
