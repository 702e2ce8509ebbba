//! # tagalloc - A Boundary Tag Memory Allocator
//!
//! Classic malloc style allocator that manages a single fixed capacity
//! region with an implicit free list. Every block carries a header and a
//! footer tag, searching is first fit, freed neighbors are merged right
//! away.
//!
//! ```text
//!   tagalloc
//!   ├── region  - Fixed capacity backing store with a monotonic break
//!   ├── heap    - Boundary tag block allocator over the region
//!   └── utils   - Doubleword alignment helper
//! ```

pub mod heap;
pub mod region;
pub mod utils;
