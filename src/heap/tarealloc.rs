use super::allocator::TagAllocator;
use super::globals::tag_memory;

/**
 * Resize a block of the process wide heap.
 *
 * @param block_ptr Block to resize, null makes this a plain talloc.
 * @param size New payload size, zero frees the block and returns None.
 * @return The new block with the old bytes moved over, or None when no
 * block of the new size can be found. On None the old block stays valid.
 *
 * # Safety
 *
 * Same contract as [`super::tadelloc::tadelloc`], and the payload must be
 * fine with living at a new address.
 */
pub unsafe fn tarealloc(block_ptr: *mut u8, size: usize) -> Option<*mut u8> {
    let mut memory_guard = tag_memory.lock().unwrap();

    if memory_guard.is_none() {
        *memory_guard = Some(TagAllocator::init()?);
    }

    let allocator = memory_guard.as_mut()?;
    unsafe { allocator.reallocate(block_ptr, size) }
}
