//! # fixed_arena - A Fixed-Capacity Arena Allocator
//!
//! This crate provides a **fixed-capacity allocator** that hands out blocks
//! from a single, statically sized byte buffer. It never calls into a heap
//! manager, not even for its own bookkeeping, which makes it usable where
//! dynamic memory is unavailable (bare-metal, early boot, tests of such code).
//!
//! ## Overview
//!
//! The bookkeeping table is carved out of the arena itself, lazily, on the
//! first allocation:
//!
//! ```text
//!   Arena Layout (table carved):
//!
//!   0                RESERVED                                      CAPACITY
//!   ┌──────────────────┬──────┬──────┬─────────┬──────┬───────────────────┐
//!   │  Metadata Slot   │  A1  │  A2  │   gap   │  A3  │        gap        │
//!   │      Table       │      │      │         │      │                   │
//!   └──────────────────┴──────┴──────┴─────────┴──────┴───────────────────┘
//!   ◄── SLOTS records ─►◄──────────────── usable window ─────────────────►
//! ```
//!
//! Each record describes one live block and links to the next one in
//! ascending offset order:
//!
//! ```text
//!   Live-Block Index:
//!
//!   head ──► ┌───────────────┐     ┌───────────────┐     ┌───────────────┐
//!            │ offset: 1152  │ ──► │ offset: 1280  │ ──► │ offset: 6400  │ ──► EMPTY
//!            │ size:   128   │     │ size:   512   │     │ size:   4096  │
//!            └───────────────┘     └───────────────┘     └───────────────┘
//!              slot 0                slot 3                slot 2
//! ```
//!
//! A new block goes to the start of the lowest gap that fits (first fit by
//! address). Freed blocks are not merged with their neighbours; their bytes
//! simply become part of the surrounding gap. When the last block is freed the
//! table is withdrawn and its bytes are allocatable again.
//!
//! A request for exactly `CAPACITY` bytes on an idle arena takes the
//! **whole-arena fast path**: the table is never carved and the caller owns
//! every byte until the block is freed.
//!
//! ## Crate Structure
//!
//! ```text
//!   fixed_arena
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── arena      - Arena, the placement engine
//!   ├── block      - Allocation records (internal) and Block handles
//!   ├── error      - AllocError
//!   └── table      - Slot table overlay and live-block index (internal)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fixed_arena::{AllocError, DefaultArena};
//!
//! let arena = DefaultArena::new();
//!
//! let a = arena.allocate(128).unwrap();
//! let b = arena.allocate(1024).unwrap();
//!
//! assert!(arena.write(a, 0, &[42]));
//!
//! arena.deallocate(b);
//! let c = arena.allocate(512).unwrap();
//! assert_eq!(c.offset(), b.offset());
//!
//! assert_eq!(arena.allocate(0), Err(AllocError::InvalidSize { requested: 0 }));
//!
//! arena.deallocate(a);
//! arena.deallocate(c);
//! assert!(arena.allocate(100 * 1024).is_ok());
//! ```
//!
//! ## Raw Pointers
//!
//! Blocks are identified by [`Block`] handles. Callers that need addresses
//! use [`Arena::allocate_ptr`], [`Arena::as_ptr`] and [`Arena::deallocate_ptr`];
//! those are the only places that translate between handles and addresses,
//! and all of them are bounds checked against the arena. Every operation
//! takes `&self`, so an address stays valid while other blocks come and go,
//! until its own block is freed or the arena is moved or dropped.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: the arena is not `Sync`
//! - **No coalescing**: free space is only reclaimed through gap search
//! - **Word alignment only**: blocks start on a machine-word boundary
//! - **Bounded metadata**: at most `SLOTS` blocks can be live at once
//!
//! ## Logging
//!
//! Allocation failures, ignored frees and table carving are reported through
//! [`tracing`] at `debug` and `trace` level. The crate never installs a
//! subscriber.

pub mod align;
mod arena;
mod block;
mod error;
mod table;

pub use arena::{Arena, DefaultArena, MAX_SLOTS, TOTAL_CAPACITY};
pub use block::Block;
pub use error::{AllocError, Result};
