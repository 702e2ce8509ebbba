use std::cmp;
use std::ptr;

use crate::region::MemoryRegion;
use crate::utils::align_up;

use super::utils::{
    footer_ptr, get_allocated, get_at, get_blksize, header_ptr, next_block_ptr, pack,
    prev_block_ptr, put_at,
};
use super::{CHUNK_SIZE, DOUBLE_SIZE, MIN_BLOCK_SIZE, WORD_SIZE};

/**
 * The allocator itself: the backing region plus a cursor on the first
 * list position. Blocks are found by walking the implicit list from
 * heap_listp, first free block that is big enough wins.
 *
 * The struct owns the whole heap, so tests can build as many independent
 * instances as they want. The process wide singleton lives in
 * [`super::globals`].
 */
pub struct TagAllocator {
    pub region: MemoryRegion,
    pub heap_listp: *mut u8,
}

/*
 * Raw pointers strip Send, but the instance is only ever reached through
 * the global mutex or owned by a single test thread.
 */
unsafe impl Send for TagAllocator {}

impl TagAllocator {
    /**
     * Build a fresh heap: map the region, lay down the alignment pad, the
     * prologue pair and the epilogue header, then grow by one chunk so
     * there is a first free block to hand out.
     *
     * @return The ready allocator, or None when the region cannot be
     * mapped or the first extension fails.
     */
    pub fn init() -> Option<Self> {
        let mut region = MemoryRegion::init()?;

        let base = match region.sbrk(4 * WORD_SIZE) {
            Some(base) => base,
            None => {
                region.teardown();
                return None;
            }
        };

        let mut allocator = Self {
            region,
            heap_listp: ptr::null_mut(),
        };

        unsafe {
            /* alignment padding, keeps every payload on a doubleword */
            put_at(base, 0);
            /* prologue block, header and footer back to back */
            put_at(base.add(WORD_SIZE), pack(DOUBLE_SIZE, true));
            put_at(base.add(2 * WORD_SIZE), pack(DOUBLE_SIZE, true));
            /* epilogue, a lone allocated header of size zero */
            put_at(base.add(3 * WORD_SIZE), pack(0, true));

            allocator.heap_listp = base.add(2 * WORD_SIZE);

            if allocator.extend_heap(CHUNK_SIZE / WORD_SIZE).is_none() {
                allocator.teardown();
                return None;
            }
        }

        Some(allocator)
    }

    /**
     * Allocate size bytes and return a pointer to the first payload byte.
     *
     * The request is padded with the header and footer pair and rounded up
     * to a doubleword multiple, requests at or below one doubleword take
     * the minimum block.
     *
     * @param size Number of bytes the caller needs, zero allocates nothing.
     * @return Doubleword aligned pointer to at least size bytes of
     * uninitialized storage, or None when the region is exhausted. On
     * None the heap is left exactly as it was.
     */
    pub fn allocate(&mut self, size: usize) -> Option<*mut u8> {
        if size == 0 {
            return None;
        }

        let asize = if size <= DOUBLE_SIZE {
            2 * DOUBLE_SIZE
        } else {
            align_up(size + 2 * WORD_SIZE)
        };

        unsafe {
            if let Some(block_ptr) = self.find_fit(asize) {
                self.place(block_ptr, asize);
                return Some(block_ptr);
            }

            /* no block fits, grow the heap by at least one chunk */
            let extend_size = cmp::max(asize, CHUNK_SIZE);
            let block_ptr = self.extend_heap(extend_size / WORD_SIZE)?;
            self.place(block_ptr, asize);
            Some(block_ptr)
        }
    }

    /**
     * Free an allocated block and merge it with free neighbors right away.
     *
     * @param block_ptr Pointer previously returned by allocate or
     * reallocate of this instance. Null is a no-op.
     *
     * # Safety
     *
     * block_ptr must be null or a live handle from this instance, nothing
     * here can tell a stranger pointer apart from a real one.
     */
    pub unsafe fn free(&mut self, block_ptr: *mut u8) {
        if block_ptr.is_null() {
            return;
        }

        unsafe {
            let size = get_blksize(header_ptr(block_ptr));

            put_at(header_ptr(block_ptr), pack(size, false));
            put_at(footer_ptr(block_ptr), pack(size, false));
            self.coalesce(block_ptr);
        }
    }

    /**
     * Resize a block the naive way: allocate a new one, move the bytes
     * over, free the old one.
     *
     * @param block_ptr Block to resize. Null makes this a plain allocate.
     * @param size New payload size. Zero makes this a plain free and
     * returns None. A smaller size truncates the payload.
     * @return The new block, or None when no block of the new size can be
     * found. On None the old block is left untouched and stays valid.
     *
     * # Safety
     *
     * Same contract as [`Self::free`]. The payload is moved as raw bytes,
     * so it must be fine with living at a new address.
     */
    pub unsafe fn reallocate(&mut self, block_ptr: *mut u8, size: usize) -> Option<*mut u8> {
        if size == 0 {
            unsafe { self.free(block_ptr) };
            return None;
        }

        if block_ptr.is_null() {
            return self.allocate(size);
        }

        let new_blkptr = self.allocate(size)?;

        unsafe {
            let payload_capacity = get_blksize(header_ptr(block_ptr)) - 2 * WORD_SIZE;
            let copy_size = cmp::min(size, payload_capacity);

            ptr::copy_nonoverlapping(block_ptr, new_blkptr, copy_size);
            self.free(block_ptr);
        }

        Some(new_blkptr)
    }

    /**
     * Grow the heap by words * WORD_SIZE bytes, rounded up to an even
     * number of words so block sizes stay doubleword multiples.
     *
     * The new free block starts where the old epilogue header was, and a
     * fresh epilogue closes the heap at the new break.
     *
     * @return The new free block after merging with a free tail, or None
     * when the region cap is hit.
     */
    unsafe fn extend_heap(&mut self, words: usize) -> Option<*mut u8> {
        let size = if words % 2 == 0 {
            words * WORD_SIZE
        } else {
            (words + 1) * WORD_SIZE
        };

        let block_ptr = self.region.sbrk(size)?;

        unsafe {
            /* the old epilogue header becomes the new block header */
            put_at(header_ptr(block_ptr), pack(size, false));
            put_at(footer_ptr(block_ptr), pack(size, false));
            put_at(header_ptr(next_block_ptr(block_ptr)), pack(0, true));

            Some(self.coalesce(block_ptr))
        }
    }

    /*
     * First fit walk from the start of the list. The epilogue is the only
     * block with size zero, so it terminates the loop.
     */
    unsafe fn find_fit(&self, asize: usize) -> Option<*mut u8> {
        unsafe {
            let mut block_ptr = self.heap_listp;

            while get_blksize(header_ptr(block_ptr)) > 0 {
                if !get_allocated(header_ptr(block_ptr))
                    && asize <= get_blksize(header_ptr(block_ptr))
                {
                    return Some(block_ptr);
                }

                block_ptr = next_block_ptr(block_ptr);
            }

            None
        }
    }

    /*
     * Mark a free block of at least asize bytes as allocated. When the
     * leftover would still make a legal block, split it off as a new free
     * block, otherwise hand out the whole thing.
     */
    unsafe fn place(&mut self, block_ptr: *mut u8, asize: usize) {
        unsafe {
            let curr_size = get_blksize(header_ptr(block_ptr));

            if curr_size - asize >= MIN_BLOCK_SIZE {
                put_at(header_ptr(block_ptr), pack(asize, true));
                put_at(footer_ptr(block_ptr), pack(asize, true));

                let rest_ptr = next_block_ptr(block_ptr);
                put_at(header_ptr(rest_ptr), pack(curr_size - asize, false));
                put_at(footer_ptr(rest_ptr), pack(curr_size - asize, false));
            } else {
                put_at(header_ptr(block_ptr), pack(curr_size, true));
                put_at(footer_ptr(block_ptr), pack(curr_size, true));
            }
        }
    }

    /**
     * Merge a free block with whichever neighbors are free and return the
     * merged block. The sentinels read as allocated, so the merge stops at
     * the heap ends by itself.
     *
     * The merged size is summed up before any tag is written, only one
     * header and one footer survive per resulting block.
     */
    unsafe fn coalesce(&mut self, block_ptr: *mut u8) -> *mut u8 {
        unsafe {
            let prev_allocated = get_allocated(footer_ptr(prev_block_ptr(block_ptr)));
            let next_allocated = get_allocated(header_ptr(next_block_ptr(block_ptr)));
            let mut size = get_blksize(header_ptr(block_ptr));

            if prev_allocated && next_allocated {
                return block_ptr;
            }

            if prev_allocated && !next_allocated {
                /* absorb the right neighbor */
                size += get_blksize(header_ptr(next_block_ptr(block_ptr)));

                put_at(header_ptr(block_ptr), pack(size, false));
                /* the footer position follows the fresh header, so this
                 * lands on what was the right neighbor's footer */
                put_at(footer_ptr(block_ptr), pack(size, false));
                return block_ptr;
            }

            if !prev_allocated && next_allocated {
                /* absorb the left neighbor */
                size += get_blksize(header_ptr(prev_block_ptr(block_ptr)));
                let prev_blkptr = prev_block_ptr(block_ptr);

                put_at(footer_ptr(block_ptr), pack(size, false));
                put_at(header_ptr(prev_blkptr), pack(size, false));
                return prev_blkptr;
            }

            /* both neighbors free, sum every size before touching a tag */
            let prev_blkptr = prev_block_ptr(block_ptr);
            let next_blkptr = next_block_ptr(block_ptr);
            size += get_blksize(header_ptr(prev_blkptr)) + get_blksize(header_ptr(next_blkptr));

            put_at(footer_ptr(next_blkptr), pack(size, false));
            put_at(header_ptr(prev_blkptr), pack(size, false));
            prev_blkptr
        }
    }

    /**
     * Walk the heap and report every broken invariant on stderr.
     *
     * Checked per block: doubleword alignment of the payload position,
     * header equal to footer, reserved tag bits clear, minimum block
     * size, and that no two free blocks sit next to each other. The
     * prologue must read <8/allocated>, the epilogue <0/allocated> and sit
     * right below the break.
     *
     * @param verbose Also print a [size:alloc] record per block for both
     * tags, and EOL at the epilogue.
     * @return Number of violations found. The walk mutates nothing.
     */
    pub fn check_heap(&self, verbose: bool) -> usize {
        let mut errors = 0;

        unsafe {
            if verbose {
                println!("Heap ({:p}):", self.heap_listp);
            }

            if get_blksize(header_ptr(self.heap_listp)) != DOUBLE_SIZE
                || !get_allocated(header_ptr(self.heap_listp))
            {
                eprintln!("Error: bad prologue header");
                errors += 1;
            }

            let mut block_ptr = self.heap_listp;
            let mut prev_free = false;

            while get_blksize(header_ptr(block_ptr)) > 0 {
                if verbose {
                    self.print_block(block_ptr);
                }

                errors += self.check_block(block_ptr);

                /* the prologue is exempt from the user block rules */
                if !ptr::eq(block_ptr, self.heap_listp) {
                    if get_blksize(header_ptr(block_ptr)) < MIN_BLOCK_SIZE {
                        eprintln!("Error: block at {:p} is below the minimum size", block_ptr);
                        errors += 1;
                    }

                    let is_free = !get_allocated(header_ptr(block_ptr));
                    if is_free && prev_free {
                        eprintln!("Error: adjacent free blocks at {:p}", block_ptr);
                        errors += 1;
                    }
                    prev_free = is_free;
                }

                block_ptr = next_block_ptr(block_ptr);
            }

            if verbose {
                self.print_block(block_ptr);
            }

            if get_blksize(header_ptr(block_ptr)) != 0 || !get_allocated(header_ptr(block_ptr)) {
                eprintln!("Error: bad epilogue header");
                errors += 1;
            }

            /* the walk must land exactly on the break, anything else means
             * the block sizes do not cover the heap */
            if !ptr::eq(block_ptr, self.region.current_brk()) {
                eprintln!("Error: epilogue header is not at the heap break");
                errors += 1;
            }
        }

        errors
    }

    /*
     * Per block sanity: payload alignment, size granularity, and the two
     * tags telling the same story.
     */
    fn check_block(&self, block_ptr: *mut u8) -> usize {
        let mut errors = 0;

        unsafe {
            if block_ptr as usize % DOUBLE_SIZE != 0 {
                eprintln!("Error: {:p} is not doubleword aligned", block_ptr);
                errors += 1;
            }

            /* a size that is a doubleword multiple keeps the two reserved
             * tag bits clear */
            if get_at(header_ptr(block_ptr)) & 0x6 != 0 {
                eprintln!("Error: reserved tag bits set at {:p}", block_ptr);
                errors += 1;
            }

            if get_at(header_ptr(block_ptr)) != get_at(footer_ptr(block_ptr)) {
                eprintln!("Error: header does not match footer at {:p}", block_ptr);
                errors += 1;
            }
        }

        errors
    }

    /*
     * Print one block as the checker sees it.
     */
    fn print_block(&self, block_ptr: *mut u8) {
        unsafe {
            let hsize = get_blksize(header_ptr(block_ptr));
            let halloc = get_allocated(header_ptr(block_ptr));

            if hsize == 0 {
                println!("{:p}: EOL", block_ptr);
                return;
            }

            let fsize = get_blksize(footer_ptr(block_ptr));
            let falloc = get_allocated(footer_ptr(block_ptr));

            println!(
                "{:p}: header: [{}:{}], footer: [{}:{}]",
                block_ptr,
                hsize,
                if halloc { 'a' } else { 'f' },
                fsize,
                if falloc { 'a' } else { 'f' }
            );
        }
    }

    /**
     * Release the backing region. Every handle from this instance is
     * dangling afterwards.
     */
    pub fn teardown(mut self) {
        self.region.teardown();
    }
}
