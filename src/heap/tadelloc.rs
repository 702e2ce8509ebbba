use super::allocator::TagAllocator;
use super::globals::tag_memory;

/**
 * Free a block of the process wide heap.
 *
 * Like [`super::talloc::talloc`] this sets the heap up when it does not
 * exist yet, so the very first public call can be a free.
 *
 * @param block_ptr Pointer previously returned by talloc or tarealloc.
 * Null is a no-op.
 *
 * # Safety
 *
 * block_ptr must be null or a live handle from the process wide heap.
 */
pub unsafe fn tadelloc(block_ptr: *mut u8) {
    let mut memory_guard = tag_memory.lock().unwrap();

    if memory_guard.is_none() {
        match TagAllocator::init() {
            Some(allocator) => *memory_guard = Some(allocator),
            None => return,
        }
    }

    if let Some(allocator) = memory_guard.as_mut() {
        unsafe { allocator.free(block_ptr) };
    }
}
