use std::ptr;

use crate::heap::allocator::TagAllocator;
use crate::heap::globals::{tacheck, tainit, tateardown};
use crate::heap::tadelloc::tadelloc;
use crate::heap::talloc::talloc;
use crate::heap::tarealloc::tarealloc;
use crate::heap::utils::{
    footer_ptr, get_allocated, get_blksize, header_ptr, next_block_ptr, pack, put_at,
};
use crate::heap::{CHUNK_SIZE, DOUBLE_SIZE, MIN_BLOCK_SIZE, WORD_SIZE};
use crate::region::{MemoryRegion, MAX_REGION_SIZE};
use crate::utils::align_up;

/*
 * Walk the whole heap and return how many free blocks exist together with
 * their summed size. The walk skips the prologue and stops at the
 * epilogue.
 */
fn free_blocks(allocator: &TagAllocator) -> (usize, usize) {
    let mut count = 0;
    let mut total = 0;

    unsafe {
        let mut block_ptr = next_block_ptr(allocator.heap_listp);

        while get_blksize(header_ptr(block_ptr)) > 0 {
            if !get_allocated(header_ptr(block_ptr)) {
                count += 1;
                total += get_blksize(header_ptr(block_ptr));
            }
            block_ptr = next_block_ptr(block_ptr);
        }
    }

    (count, total)
}

#[test]
fn test_align_up() {
    /*
     * 13 is not a doubleword multiplier so it must be rounded up, exact
     * multipliers must come back untouched
     */
    assert_eq!(align_up(13), 16);
    assert_eq!(align_up(16), 16);
    assert_eq!(align_up(1), 8);
}

#[test]
fn test_region_sbrk_moves_the_break() {
    let mut region = MemoryRegion::init().unwrap();
    let first_brk = region.current_brk();

    let old_brk = region.sbrk(32).unwrap();
    assert_eq!(old_brk, first_brk);
    assert_eq!(region.current_brk() as usize, first_brk as usize + 32);

    region.teardown();
}

#[test]
fn test_region_sbrk_refuses_to_pass_the_cap() {
    let mut region = MemoryRegion::init().unwrap();

    assert!(region.sbrk(MAX_REGION_SIZE + 1).is_none());

    /*
     * A failed sbrk must leave the break where it was, so filling the
     * region to the exact cap still works afterwards
     */
    let brk = region.current_brk();
    assert!(region.sbrk(MAX_REGION_SIZE).is_some());
    assert_eq!(region.current_brk() as usize, brk as usize + MAX_REGION_SIZE);
    assert!(region.sbrk(1).is_none());

    region.teardown();
}

#[test]
fn test_allocate_returns_aligned_pointer() {
    let mut allocator = TagAllocator::init().unwrap();

    let block_ptr = allocator.allocate(8).unwrap();
    assert_eq!(block_ptr as usize % DOUBLE_SIZE, 0);

    unsafe {
        ptr::write_bytes(block_ptr, 0xAA, 8);
        allocator.free(block_ptr);
    }

    assert_eq!(allocator.check_heap(false), 0);
    allocator.teardown();
}

#[test]
fn test_write_and_read_back() {
    let mut allocator = TagAllocator::init().unwrap();

    let block_ptr = allocator.allocate(12).unwrap();

    unsafe {
        (block_ptr as *mut i32).write(20);
        assert_eq!((block_ptr as *mut i32).read(), 20);
        allocator.free(block_ptr);
    }

    allocator.teardown();
}

#[test]
fn test_realloc_preserves_contents() {
    let mut allocator = TagAllocator::init().unwrap();

    let block_ptr = allocator.allocate(20).unwrap();

    unsafe {
        (block_ptr as *mut i32).write(20);

        let new_blkptr = allocator.reallocate(block_ptr, 30).unwrap();
        assert_eq!((new_blkptr as *mut i32).read(), 20);

        allocator.free(new_blkptr);
    }

    allocator.teardown();
}

#[test]
fn test_realloc_failure_keeps_the_old_block() {
    let mut allocator = TagAllocator::init().unwrap();

    let block_ptr = allocator.allocate(32).unwrap();

    unsafe {
        (block_ptr as *mut i32).write(77);

        /* nothing close to a whole region can be found, the old block
         * must survive the refusal untouched */
        assert!(allocator.reallocate(block_ptr, MAX_REGION_SIZE).is_none());
        assert!(get_allocated(header_ptr(block_ptr)));
        assert_eq!((block_ptr as *mut i32).read(), 77);

        allocator.free(block_ptr);
    }

    assert_eq!(allocator.check_heap(false), 0);
    allocator.teardown();
}

#[test]
fn test_coalesce_merges_the_neighborhood() {
    let mut allocator = TagAllocator::init().unwrap();

    let a = allocator.allocate(64).unwrap();
    let b = allocator.allocate(64).unwrap();
    let c = allocator.allocate(64).unwrap();

    unsafe {
        allocator.free(a);
        allocator.free(c);
        /* freeing the middle one must fuse all three with the chunk rest */
        allocator.free(b);
    }

    let (count, total) = free_blocks(&allocator);
    assert_eq!(count, 1);
    assert_eq!(total, CHUNK_SIZE);
    assert_eq!(allocator.check_heap(false), 0);

    allocator.teardown();
}

#[test]
fn test_place_splits_and_leaves_the_rest_free() {
    let mut allocator = TagAllocator::init().unwrap();

    /* an 8 bytes request takes the 16 bytes minimum block */
    let block_ptr = allocator.allocate(8).unwrap();

    unsafe {
        assert_eq!(get_blksize(header_ptr(block_ptr)), MIN_BLOCK_SIZE);

        let rest_ptr = next_block_ptr(block_ptr);
        assert!(!get_allocated(header_ptr(rest_ptr)));
        assert_eq!(get_blksize(header_ptr(rest_ptr)), CHUNK_SIZE - MIN_BLOCK_SIZE);

        allocator.free(block_ptr);
    }

    allocator.teardown();
}

#[test]
fn test_place_consumes_an_exact_fit() {
    let mut allocator = TagAllocator::init().unwrap();

    let a = allocator.allocate(24).unwrap(); /* a 32 bytes block */
    let guard = allocator.allocate(8).unwrap(); /* keeps the hole away from the chunk rest */

    unsafe {
        allocator.free(a);

        /* 17 rounds up to a 32 bytes block as well: the hole fits
         * exactly and splitting would leave nothing legal behind */
        let c = allocator.allocate(17).unwrap();
        assert_eq!(c, a);
        assert_eq!(get_blksize(header_ptr(c)), 32);
        assert!(get_allocated(header_ptr(c)));

        allocator.free(c);
        allocator.free(guard);
    }

    assert_eq!(allocator.check_heap(false), 0);
    allocator.teardown();
}

#[test]
fn test_find_fit_takes_the_first_hole() {
    let mut allocator = TagAllocator::init().unwrap();

    let a = allocator.allocate(128).unwrap();
    let b = allocator.allocate(8).unwrap();

    unsafe {
        allocator.free(a);

        /* the freed hole sits before the chunk rest, first fit takes it */
        let c = allocator.allocate(64).unwrap();
        assert_eq!(c, a);

        allocator.free(b);
        allocator.free(c);
    }

    assert_eq!(allocator.check_heap(false), 0);
    allocator.teardown();
}

#[test]
fn test_allocate_zero_returns_none() {
    let mut allocator = TagAllocator::init().unwrap();

    assert!(allocator.allocate(0).is_none());
    assert_eq!(free_blocks(&allocator), (1, CHUNK_SIZE));

    allocator.teardown();
}

#[test]
fn test_free_null_is_a_noop() {
    let mut allocator = TagAllocator::init().unwrap();

    unsafe { allocator.free(ptr::null_mut()) };
    assert_eq!(allocator.check_heap(false), 0);

    allocator.teardown();
}

#[test]
fn test_realloc_null_behaves_like_allocate() {
    let mut allocator = TagAllocator::init().unwrap();

    let block_ptr = unsafe { allocator.reallocate(ptr::null_mut(), 40) }.unwrap();
    assert_eq!(block_ptr as usize % DOUBLE_SIZE, 0);
    assert!(unsafe { get_allocated(header_ptr(block_ptr)) });

    unsafe { allocator.free(block_ptr) };
    allocator.teardown();
}

#[test]
fn test_realloc_to_zero_frees_the_block() {
    let mut allocator = TagAllocator::init().unwrap();

    let block_ptr = allocator.allocate(40).unwrap();
    assert!(unsafe { allocator.reallocate(block_ptr, 0) }.is_none());

    assert_eq!(free_blocks(&allocator), (1, CHUNK_SIZE));

    allocator.teardown();
}

#[test]
fn test_alloc_free_restores_the_heap() {
    let mut allocator = TagAllocator::init().unwrap();

    let before = free_blocks(&allocator);

    let block_ptr = allocator.allocate(100).unwrap();
    unsafe { allocator.free(block_ptr) };

    assert_eq!(free_blocks(&allocator), before);
    assert_eq!(allocator.check_heap(false), 0);

    allocator.teardown();
}

#[test]
fn test_exhaustion_and_reuse() {
    let mut allocator = TagAllocator::init().unwrap();

    let mebibyte = 1 << 20;
    let mut handles = Vec::new();

    while let Some(block_ptr) = allocator.allocate(mebibyte) {
        handles.push(block_ptr);
    }

    /* a 20 MiB region cannot hand out 22 blocks of 1 MiB */
    assert!(handles.len() < 22);
    assert!(!handles.is_empty());

    /* the leftover tail still serves small requests */
    let small = allocator.allocate(1024).unwrap();

    unsafe {
        allocator.free(small);
        for block_ptr in handles {
            allocator.free(block_ptr);
        }
    }

    /* immediate coalescing must leave one single free block behind */
    let (count, _) = free_blocks(&allocator);
    assert_eq!(count, 1);
    assert_eq!(allocator.check_heap(false), 0);

    allocator.teardown();
}

#[test]
fn test_region_cap_boundary() {
    /*
     * The biggest single request: the whole region minus the startup
     * words, the first chunk and the tag pair of the request itself
     */
    let largest = MAX_REGION_SIZE - CHUNK_SIZE - 4 * WORD_SIZE - DOUBLE_SIZE;

    let mut allocator = TagAllocator::init().unwrap();
    let block_ptr = allocator.allocate(largest).unwrap();
    unsafe { allocator.free(block_ptr) };
    assert_eq!(allocator.check_heap(false), 0);
    allocator.teardown();

    /* one byte more must be refused and leave the heap untouched */
    let mut allocator = TagAllocator::init().unwrap();
    assert!(allocator.allocate(largest + 1).is_none());
    assert_eq!(free_blocks(&allocator), (1, CHUNK_SIZE));
    allocator.teardown();
}

#[test]
fn test_check_heap_reports_a_bad_footer() {
    let mut allocator = TagAllocator::init().unwrap();

    let block_ptr = allocator.allocate(32).unwrap();

    unsafe {
        /* scribble over the footer, the walk itself runs on headers and
         * stays on track */
        put_at(footer_ptr(block_ptr), pack(64, true));
        assert!(allocator.check_heap(false) > 0);
    }

    allocator.teardown();
}

#[test]
fn test_global_talloc_surface() {
    /* the very first call builds the singleton by itself */
    let word = talloc(16).unwrap();
    assert_eq!(word as usize % DOUBLE_SIZE, 0);

    unsafe {
        (word as *mut u64).write(0xDEADBEEF);

        let word = tarealloc(word, 64).unwrap();
        assert_eq!((word as *mut u64).read(), 0xDEADBEEF);

        tadelloc(word);
    }

    assert_eq!(tacheck(false), 0);

    tateardown();
    assert!(tainit());
    tateardown();
}
