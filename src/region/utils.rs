use libc::{
    _SC_PAGESIZE, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, mmap, munmap,
    sysconf,
};
use std::ptr;

/**
 * Takes page size from the OS
 */
pub fn get_page_size() -> usize {
    unsafe { sysconf(_SC_PAGESIZE) as usize }
}

/**
 * Takes a number and rounds up to the closer page size multiplier
 *
 * example:
 * system page size = 4096
 * size = 5000
 *
 * rounded to page size = 8192
 */
pub fn round_up_to_page_size(size: usize) -> usize {
    let page_size = get_page_size();
    ((size + page_size - 1) / page_size) * page_size
}

/**
 * Asks the OS for a private anonymous block of memory, returns a pointer
 * to its first byte
 *
 * @param size The size of the mapping, must be a page size multiplier.
 * @return The mapping base address.
 *
 * @warning This function may return None if the system runs out of memory.
 */
pub fn map_region(size: usize) -> Option<*mut u8> {
    let addr = unsafe {
        mmap(
            ptr::null_mut(),
            size,
            PROT_READ | PROT_WRITE,
            MAP_PRIVATE | MAP_ANONYMOUS,
            -1,
            0,
        )
    };

    if addr == MAP_FAILED {
        return None;
    }

    Some(addr as *mut u8)
}

/**
 * Uses munmap for giving a block back to the OS
 */
pub fn unmap_region(start: *mut u8, size: usize) {
    unsafe {
        munmap(start as *mut _, size);
    }
}
