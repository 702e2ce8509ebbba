use std::ptr;

pub mod utils;

/*
 * The region is the backing store for the whole heap: one contiguous block
 * of memory taken from the OS once at startup and given back once at
 * teardown.
 *
 * The allocator on top never talks to the OS directly, it only moves a
 * "break" pointer forward inside the region, in the spirit of the old sbrk
 * call but capped at a fixed maximum
 *
 * __________________________________________________
 * |                    |                            |
 * |    used by heap    |        still unused        |
 * |                    |                            |
 * __________________________________________________
 * ^                    ^                            ^
 * start                brk                          max_addr
 *
 * Every sbrk call hands out the old break and pushes it to the right, the
 * break never moves back. When the break would pass max_addr the region is
 * exhausted and sbrk reports out of memory, it's then on the heap layer to
 * recycle what was freed before
 */

pub const MAX_REGION_SIZE: usize = 20 * (1 << 20); /* 20 MiB */

pub struct MemoryRegion {
    start: *mut u8,
    brk: *mut u8,
    max_addr: *mut u8,
    map_size: usize,
}

impl MemoryRegion {
    /**
     * Map a fresh backing region of MAX_REGION_SIZE bytes.
     *
     * @return The region with the break sitting at the very start, or None
     * if the OS refuses the mapping.
     *
     * @note The region content is whatever the OS hands out, callers must
     * not count on any byte value.
     */
    pub fn init() -> Option<Self> {
        let map_size = utils::round_up_to_page_size(MAX_REGION_SIZE);
        let start = utils::map_region(map_size)?;

        Some(Self {
            start,
            brk: start,
            max_addr: (start as usize + MAX_REGION_SIZE) as *mut u8,
            map_size,
        })
    }

    /**
     * Push the break forward by increment bytes.
     *
     * @param increment Number of bytes to grow the logical heap by.
     * @return Pointer to the old break, the base of the newly reserved
     * bytes. Returns None when the break would pass the region cap, and
     * the break stays where it was.
     */
    pub fn sbrk(&mut self, increment: usize) -> Option<*mut u8> {
        let old_brk = self.brk;

        if self.brk as usize + increment > self.max_addr as usize {
            eprintln!("ERROR: region sbrk failed, ran out of memory");
            return None;
        }

        self.brk = (self.brk as usize + increment) as *mut u8;
        Some(old_brk)
    }

    /**
     * Current break position, one past the last reserved byte.
     */
    pub fn current_brk(&self) -> *mut u8 {
        self.brk
    }

    /**
     * Give the whole mapping back to the OS. Every pointer into the region
     * is dangling after this. Calling it twice is harmless.
     */
    pub fn teardown(&mut self) {
        if self.start.is_null() {
            return;
        }

        utils::unmap_region(self.start, self.map_size);
        self.start = ptr::null_mut();
        self.brk = ptr::null_mut();
        self.max_addr = ptr::null_mut();
    }
}
