pub mod allocator;
pub mod globals;
pub mod tadelloc;
pub mod talloc;
pub mod tarealloc;
pub mod utils;

/*
 * The heap is a single run of adjacent blocks, every block carries its
 * metadata in band as a pair of boundary tags
 *
 * _________________________
 * |     header (4 B)      | <- size of the whole block plus allocated bit
 * _________________________
 * _________________________
 * |                       |
 * |       payload         | <- what the caller gets, always a doubleword
 * |                       |    multiple and doubleword aligned
 * _________________________
 * _________________________
 * |     footer (4 B)      | <- exact copy of the header
 * _________________________
 *
 * Header and footer are the same 32 bits value: the upper 29 bits hold the
 * block size in bytes (always a multiple of 8, so the low 3 bits of the
 * size are zero) and the lowest bit tells if the block is allocated.
 *
 * The footer copy is what makes merging with the left neighbor constant
 * time: from any block the previous footer sits right below the own
 * header, so the size and state of the left neighbor is one read away.
 *
 * Two sentinel blocks bracket the heap so that merging never has to test
 * for the heap ends:
 *
 * _________________________
 * |      pad (4 B, 0)     | <- keeps every payload on a doubleword
 * _________________________
 * _________________________
 * |  prologue hdr <8/1>   |
 * _________________________
 * _________________________
 * |  prologue ftr <8/1>   | <- heap_listp points right here
 * _________________________
 * _________________________
 * |      user blocks      |
 * _________________________
 * _________________________
 * |  epilogue hdr <0/1>   | <- always the last 4 bytes before the break
 * _________________________
 *
 * Both sentinels read as allocated, so a merge that reaches them stops by
 * itself. The epilogue is rebuilt at the new end every time the heap grows
 */

pub const WORD_SIZE: usize = 4;
pub const DOUBLE_SIZE: usize = 8; /* double word size */
pub const CHUNK_SIZE: usize = 1 << 12; /* 4 KiB, the default growth step */
pub const MIN_BLOCK_SIZE: usize = 2 * DOUBLE_SIZE; /* header + footer + one doubleword */
