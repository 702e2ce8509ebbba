use super::allocator::TagAllocator;
use super::globals::tag_memory;

/**
 * Allocate size bytes from the process wide heap.
 *
 * The first caller pays for the heap setup, there is no need to call
 * [`super::globals::tainit`] by hand.
 *
 * @param size Number of bytes needed, zero allocates nothing.
 * @return Doubleword aligned pointer to at least size bytes, or None when
 * the heap cannot be built or is exhausted.
 */
pub fn talloc(size: usize) -> Option<*mut u8> {
    let mut memory_guard = tag_memory.lock().unwrap();

    if memory_guard.is_none() {
        *memory_guard = Some(TagAllocator::init()?);
    }

    memory_guard
        .as_mut()
        .and_then(|allocator| allocator.allocate(size))
}
