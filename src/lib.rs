//! # kralloc - A Circular Free-List Heap Allocator
//!
//! This crate provides a general-purpose **free-list allocator** with the
//! three classic primitives: allocate, deallocate and reallocate. Memory is
//! obtained from the operating system in extents and managed entirely
//! in-band: every block carries its own header and the free blocks are
//! threaded into a circular list through those headers.
//!
//! ## Overview
//!
//! ```text
//!   Heap after a few allocations and frees:
//!
//!   ┌──┬──────────┬───────┬────────────┬──────┬────────────────────────┐
//!   │S │  free    │ alloc │   alloc    │ free │         alloc          │
//!   └──┴──────────┴───────┴────────────┴──────┴────────────────────────┘
//!    ▲      │                              ▲
//!    │      └──────────────────────────────┘  free list, address order
//!    └───────────────────────────────────────  (highest links back to S)
//!
//!   S = zero-size sentinel that keeps the list non-empty.
//! ```
//!
//! Each block is a header followed by the payload handed to the caller:
//!
//! ```text
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Header (16 bytes)  │         Payload                │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ next: free link │  │  (size - 1) * 16 bytes usable  │
//!   │  │ size: N units   │  │                                │
//!   │  └─────────────────┘  │                                │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   kralloc
//!   ├── align      - align! macro and byte-to-unit rounding
//!   ├── header     - Block header and the address arithmetic around it
//!   ├── free_list  - Circular free list: insertion with coalescing, fit search
//!   ├── heap       - Heap: allocate, deallocate, reallocate, growth
//!   ├── source     - HeapSource trait, sbrk and mmap growth
//!   ├── arena      - Bounded in-process source
//!   ├── config     - Placement and growth selection
//!   ├── error      - AllocError
//!   └── global     - GlobalHeap, a GlobalAlloc adapter
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kralloc::{Config, Heap, OsHeap, Placement};
//!
//! fn main() {
//!     let config = Config::new().with_placement(Placement::BestFit);
//!     let mut heap = Heap::new(OsHeap::new(config.growth), config);
//!
//!     let p = heap.allocate(64).unwrap();
//!
//!     unsafe {
//!         p.as_ptr().write_bytes(0xAB, 64);
//!         let q = heap.reallocate(p.as_ptr(), 256).unwrap();
//!         heap.deallocate(q.as_ptr());
//!     }
//! }
//! ```
//!
//! ## Placement
//!
//! - **First-fit** takes the first sufficient block after the cursor.
//! - **Best-fit** walks the whole list and takes the smallest sufficient
//!   block, stopping early on an exact fit.
//!
//! Both carve the request off the *tail* of the chosen block so the
//! remainder keeps its place in the list.
//!
//! ## Limitations
//!
//! - **Single-threaded core**: [`Heap`] has no locking; [`GlobalHeap`] adds a
//!   spin lock for use as the global allocator.
//! - **No reentrancy**: growth and refusals are logged while [`GlobalHeap`]
//!   holds its lock. Do not install it as `#[global_allocator]` together with
//!   a logger that allocates at `debug` or `warn` level; the nested call
//!   would spin forever.
//! - **No shrinking**: extents are never returned to the system.
//! - **Alignment**: payloads are aligned to 16 bytes; larger alignments are
//!   refused by [`GlobalHeap`].
//! - **Unix-only**: growth relies on `sbrk(2)` and `mmap(2)` through `libc`.
//!
//! ## Safety
//!
//! Deallocating or reallocating a pointer that did not come from the same
//! heap, or that was already released, is undefined behavior and is not
//! detected.

pub mod align;
mod arena;
mod config;
mod error;
mod free_list;
mod global;
mod header;
mod heap;
mod source;

pub use arena::ArenaSource;
pub use config::{Config, Growth, MIN_GROWTH_UNITS, Placement};
pub use error::{AllocError, AllocResult};
pub use free_list::{FreeBlock, Iter as FreeBlocks};
pub use global::GlobalHeap;
pub use header::UNIT;
pub use heap::{Heap, HeapStats};
pub use source::{Extent, HeapSource, OsHeap, PageMap, Sbrk};
