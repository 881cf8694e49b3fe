use core::cell::{Cell, UnsafeCell};
use core::fmt;
use core::ptr::{self, NonNull};

use tracing::{debug, trace};

use crate::align;
use crate::block::{Block, EMPTY, Record};
use crate::error::{AllocError, Result};
use crate::table::{self, Gaps, Iter, LiveIndex, RECORD_SIZE};

/// Default arena capacity in bytes (100 KiB).
pub const TOTAL_CAPACITY: usize = 100 * 1024;

/// Default number of simultaneously live blocks.
pub const MAX_SLOTS: usize = 96;

/// An [`Arena`] with the default capacity and slot count.
pub type DefaultArena = Arena<TOTAL_CAPACITY, MAX_SLOTS>;

#[repr(C, align(16))]
struct Storage<const N: usize>(UnsafeCell<[u8; N]>);

/// Fixed-capacity allocator over a single inline byte buffer.
///
/// The arena never touches a heap. Bookkeeping for live blocks lives in a
/// table of `SLOTS` records that is carved out of the front of the buffer
/// on the first allocation and withdrawn again once the last block is freed.
/// A request for exactly `CAPACITY` bytes on an idle arena skips the table and
/// hands out the whole buffer.
///
/// Every operation takes `&self`, so addresses handed out by
/// [`allocate_ptr`](Self::allocate_ptr) and [`as_ptr`](Self::as_ptr) stay
/// usable while other blocks are allocated and freed. The arena is not `Sync`.
pub struct Arena<const CAPACITY: usize = TOTAL_CAPACITY, const SLOTS: usize = MAX_SLOTS> {
  storage: Storage<CAPACITY>,
  /// Slot of the lowest-offset live record, or [`EMPTY`].
  head: Cell<u32>,
  carved: Cell<bool>,
  whole: Cell<bool>,
}

impl<const CAPACITY: usize, const SLOTS: usize> Arena<CAPACITY, SLOTS> {
  const RESERVED: usize = table::reserved_bytes(SLOTS);

  /// Creates an idle arena.
  ///
  /// Fails to compile if the slot table does not fit strictly inside the
  /// arena, if `CAPACITY` is not a multiple of the machine word, or if
  /// either parameter does not fit in a `u32`.
  pub const fn new() -> Self {
    const {
      assert!(SLOTS > 0, "at least one metadata slot is required");
      assert!(
        SLOTS * RECORD_SIZE < CAPACITY,
        "metadata table must fit strictly inside the arena"
      );
      assert!(
        CAPACITY % core::mem::size_of::<usize>() == 0,
        "arena capacity must be a multiple of the machine word"
      );
      assert!(CAPACITY <= u32::MAX as usize, "arena capacity must fit in u32");
      assert!(SLOTS < EMPTY as usize, "slot count must fit in u32");
    }

    Self {
      storage: Storage(UnsafeCell::new([0; CAPACITY])),
      head: Cell::new(EMPTY),
      carved: Cell::new(false),
      whole: Cell::new(false),
    }
  }

  /// Allocates `size` bytes.
  ///
  /// A request for exactly `CAPACITY` bytes succeeds only while the arena is
  /// completely idle and returns the whole buffer. Any other request is
  /// rounded up to the machine word and placed at the start of the lowest
  /// gap that fits.
  ///
  /// # Errors
  ///
  /// * [`AllocError::InvalidSize`] if `size <= 0`.
  /// * [`AllocError::CapacityExhausted`] if no gap is wide enough.
  /// * [`AllocError::MetadataExhausted`] if a gap fits but every slot is taken.
  pub fn allocate(
    &self,
    size: isize,
  ) -> Result<Block> {
    let requested = match usize::try_from(size) {
      Ok(requested) if requested > 0 => requested,
      _ => {
        debug!(size, "rejected allocation of non-positive size");
        return Err(AllocError::InvalidSize { requested: size });
      }
    };

    if requested == CAPACITY {
      return self.take_whole();
    }

    if self.whole.get() {
      debug!(requested, "arena is wholly allocated");
      return Err(AllocError::CapacityExhausted { requested });
    }

    if !self.ensure_table_carved() || requested > CAPACITY {
      debug!(requested, "request does not fit the arena");
      return Err(AllocError::CapacityExhausted { requested });
    }

    let footprint = align!(requested);

    let Some(offset) = self
      .gaps()
      .find(|gap| gap.len() >= footprint)
      .map(|gap| gap.start)
    else {
      debug!(requested, footprint, "no gap fits the request");
      return Err(AllocError::CapacityExhausted { requested });
    };

    let Some(index) = self.index() else {
      return Err(AllocError::CapacityExhausted { requested });
    };

    let Some(slot) = index.free_slot() else {
      debug!(requested, offset, "no metadata slot left");
      return Err(AllocError::MetadataExhausted { requested });
    };

    let record = Record::new(offset as u32, footprint as u32);
    index.place(slot, record);

    trace!(offset, size = footprint, slot, "allocated block");

    Ok(record.block())
  }

  /// Allocates `size` bytes and returns the block address, or `None` on any
  /// failure.
  pub fn allocate_ptr(
    &self,
    size: isize,
  ) -> Option<NonNull<u8>> {
    let block = self.allocate(size).ok()?;
    self.as_ptr(block)
  }

  /// Frees `block`.
  ///
  /// Handles that are stale, already freed or not from this arena are
  /// ignored.
  pub fn deallocate(
    &self,
    block: Block,
  ) {
    if let Err(err) = self.release(block.offset()) {
      debug!(%err, "ignored invalid free");
    }
  }

  /// Frees `block`, reporting handles that do not name a live block.
  ///
  /// # Errors
  ///
  /// [`AllocError::InvalidFree`] if no live block starts at `block.offset()`.
  pub fn try_deallocate(
    &self,
    block: Block,
  ) -> Result<()> {
    self.release(block.offset())
  }

  /// Frees the block starting at `ptr`.
  ///
  /// Null pointers, pointers outside the arena and pointers that are not the
  /// start of a live block are ignored.
  pub fn deallocate_ptr(
    &self,
    ptr: *const u8,
  ) {
    if ptr.is_null() {
      debug!("ignored free of null pointer");
      return;
    }

    let Some(offset) = self.offset_of(ptr) else {
      debug!(?ptr, "ignored free of foreign pointer");
      return;
    };

    if let Err(err) = self.release(offset) {
      debug!(%err, "ignored invalid free");
    }
  }

  /// Address of `block` inside the arena, if `block` is live.
  ///
  /// The pointer is valid for reads and writes of `block.size()` bytes until
  /// the block is freed or the arena is moved or dropped. Later calls on the
  /// arena do not invalidate it.
  pub fn as_ptr(
    &self,
    block: Block,
  ) -> Option<NonNull<u8>> {
    if !self.is_live(block) {
      return None;
    }
    NonNull::new(self.base().wrapping_add(block.offset()))
  }

  /// Copies `src` into `block` starting `at` bytes from its start.
  ///
  /// Returns `false` without writing if `block` is not live or the write
  /// would run past its end.
  pub fn write(
    &self,
    block: Block,
    at: usize,
    src: &[u8],
  ) -> bool {
    let Some(start) = self.checked_span(block, at, src.len()) else {
      return false;
    };
    // SAFETY: `checked_span` keeps `start..start + src.len()` inside a live
    // block, which lies inside the buffer and outside the slot table.
    unsafe { ptr::copy(src.as_ptr(), self.base().add(start), src.len()) };
    true
  }

  /// Copies bytes of `block` starting `at` bytes from its start into `dst`.
  ///
  /// Returns `false` without reading if `block` is not live or the read
  /// would run past its end.
  pub fn read(
    &self,
    block: Block,
    at: usize,
    dst: &mut [u8],
  ) -> bool {
    let Some(start) = self.checked_span(block, at, dst.len()) else {
      return false;
    };
    // SAFETY: as in `write`; the buffer is always initialized.
    unsafe { ptr::copy(self.base().add(start), dst.as_mut_ptr(), dst.len()) };
    true
  }

  /// Byte offset of `ptr` from the arena base, if `ptr` points into the arena.
  pub fn offset_of(
    &self,
    ptr: *const u8,
  ) -> Option<usize> {
    let offset = ptr.addr().checked_sub(self.base().addr())?;
    (offset < CAPACITY).then_some(offset)
  }

  /// Whether `block` is currently allocated from this arena.
  pub fn is_live(
    &self,
    block: Block,
  ) -> bool {
    if self.whole.get() {
      return block == Block::new(0, CAPACITY);
    }
    self.live().any(|record| record.block() == block)
  }

  /// Live blocks in ascending offset order.
  ///
  /// A whole-arena allocation is not tracked by the slot table and is not
  /// listed; see [`is_whole_arena_taken`](Self::is_whole_arena_taken).
  pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
    self.live().map(|record| record.block())
  }

  /// Number of live blocks tracked by the slot table.
  pub fn live_count(&self) -> usize {
    self.live().count()
  }

  /// Whether the slot table currently occupies the front of the arena.
  pub fn is_table_carved(&self) -> bool {
    self.carved.get()
  }

  /// Whether a single allocation currently owns the whole arena.
  pub fn is_whole_arena_taken(&self) -> bool {
    self.whole.get()
  }

  /// First offset available to blocks while the slot table is carved.
  pub const fn usable_base(&self) -> usize {
    Self::RESERVED
  }

  /// Total arena size in bytes.
  pub const fn capacity(&self) -> usize {
    CAPACITY
  }

  /// Bytes not covered by a live block or by the carved slot table.
  pub fn free_bytes(&self) -> usize {
    if self.whole.get() {
      return 0;
    }
    if !self.carved.get() {
      return CAPACITY;
    }
    let used: usize = self.live().map(|record| record.size as usize).sum();
    CAPACITY - Self::RESERVED - used
  }

  /// Size of the widest gap an ordinary allocation could currently use.
  pub fn largest_gap(&self) -> usize {
    if self.whole.get() {
      return 0;
    }
    if !self.carved.get() {
      return CAPACITY - Self::RESERVED;
    }
    self.gaps().map(|gap| gap.len()).max().unwrap_or(0)
  }

  fn take_whole(&self) -> Result<Block> {
    if self.whole.get() || self.carved.get() || self.head.get() != EMPTY {
      debug!(requested = CAPACITY, "arena is not idle");
      return Err(AllocError::CapacityExhausted {
        requested: CAPACITY,
      });
    }
    self.whole.set(true);
    trace!(size = CAPACITY, "allocated whole arena");
    Ok(Block::new(0, CAPACITY))
  }

  fn release(
    &self,
    offset: usize,
  ) -> Result<()> {
    if self.whole.get() && offset == 0 {
      self.whole.set(false);
      trace!(size = CAPACITY, "freed whole arena");
      return Ok(());
    }

    let invalid = AllocError::InvalidFree { offset };
    if !self.carved.get() {
      return Err(invalid);
    }
    let target = u32::try_from(offset).map_err(|_| invalid)?;
    let index = self.index().ok_or(invalid)?;
    let slot = index.remove_by_offset(target).ok_or(invalid)?;
    index.vacate(slot);

    trace!(offset, slot, "freed block");

    if index.is_empty() {
      self.release_table_if_unused();
    }
    Ok(())
  }

  /// Carves the slot table out of the front of the arena if it is absent.
  ///
  /// Returns whether the table is carved afterwards.
  fn ensure_table_carved(&self) -> bool {
    if self.carved.get() {
      return true;
    }
    if self.whole.get() || Self::RESERVED >= CAPACITY {
      return false;
    }
    let Some(index) = self.index() else {
      return false;
    };
    index.reset();
    self.carved.set(true);
    trace!(slots = SLOTS, reserved = Self::RESERVED, "carved slot table");
    true
  }

  fn release_table_if_unused(&self) {
    if self.head.get() != EMPTY {
      return;
    }
    self.carved.set(false);
    trace!("released slot table");
  }

  fn base(&self) -> *mut u8 {
    self.storage.0.get().cast()
  }

  /// Start of `len` bytes at `at` inside `block`, if `block` is live and the
  /// span stays inside it.
  fn checked_span(
    &self,
    block: Block,
    at: usize,
    len: usize,
  ) -> Option<usize> {
    let end = at.checked_add(len)?;
    (end <= block.size() && self.is_live(block)).then(|| block.offset() + at)
  }

  /// Slot table view over the first `SLOTS` records of the buffer.
  ///
  /// Only called while the table is carved or being carved, when no caller
  /// owns those bytes.
  fn index(&self) -> Option<LiveIndex<'_>> {
    // SAFETY: `new` asserts `SLOTS * RECORD_SIZE < CAPACITY`, the buffer is
    // zero-initialized, and `Storage` is 16-byte aligned. The reserved bytes
    // are never part of a block while the table is carved, so nothing else
    // reaches them while the view is alive.
    let records = unsafe { table::overlay_cells::<Record>(self.base(), SLOTS) }?;
    Some(LiveIndex::new(records, &self.head))
  }

  fn live(&self) -> Iter<'_> {
    if !self.carved.get() {
      return Iter::new(&[], EMPTY);
    }
    match self.index() {
      Some(index) => index.iter(),
      None => Iter::new(&[], EMPTY),
    }
  }

  fn gaps(&self) -> Gaps<'_> {
    Gaps::new(self.live(), Self::RESERVED, CAPACITY)
  }
}

impl<const CAPACITY: usize, const SLOTS: usize> Default for Arena<CAPACITY, SLOTS> {
  fn default() -> Self {
    Self::new()
  }
}

impl<const CAPACITY: usize, const SLOTS: usize> fmt::Debug for Arena<CAPACITY, SLOTS> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Arena")
      .field("capacity", &CAPACITY)
      .field("max_slots", &SLOTS)
      .field("carved", &self.carved.get())
      .field("whole", &self.whole.get())
      .field("live", &self.live_count())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn assert_consistent<const C: usize, const M: usize>(arena: &Arena<C, M>) {
    let blocks: Vec<Block> = arena.blocks().collect();

    for pair in blocks.windows(2) {
      assert!(pair[0].offset() < pair[1].offset(), "index out of order");
      assert!(pair[0].end() <= pair[1].offset(), "blocks overlap");
    }
    for block in &blocks {
      assert!(block.offset() >= arena.usable_base());
      assert!(block.end() <= C);
      assert_eq!(block.offset() % core::mem::size_of::<usize>(), 0);
    }
    if arena.is_whole_arena_taken() {
      assert!(!arena.is_table_carved());
      assert!(blocks.is_empty());
    }
  }

  #[test]
  fn test_first_allocation_starts_after_table() {
    let arena = DefaultArena::new();

    let block = arena.allocate(128).unwrap();

    assert!(arena.is_table_carved());
    assert_eq!(block.offset(), arena.usable_base());
    assert_eq!(block.offset(), 96 * 12);
    assert_eq!(block.size(), 128);
  }

  #[test]
  fn test_fit_and_reuse() {
    let arena = DefaultArena::new();

    let a = arena.allocate(128).unwrap();
    let b = arena.allocate(1024).unwrap();
    let c = arena.allocate(4096).unwrap();

    assert_eq!(b.offset(), a.end());
    assert_eq!(c.offset(), b.end());
    assert_consistent(&arena);

    arena.deallocate(b);
    let d = arena.allocate(512).unwrap();

    assert_eq!(d.offset(), b.offset());
    assert!(d.end() <= c.offset());
    assert_consistent(&arena);
  }

  #[test]
  fn test_gap_before_first_block() {
    let arena = DefaultArena::new();

    let a = arena.allocate(64).unwrap();
    let b = arena.allocate(64).unwrap();
    arena.deallocate(a);

    let c = arena.allocate(32).unwrap();
    assert_eq!(c.offset(), arena.usable_base());

    let d = arena.allocate(32).unwrap();
    assert_eq!(d.offset(), c.end());
    assert_eq!(d.end(), b.offset());

    let e = arena.allocate(8).unwrap();
    assert_eq!(e.offset(), b.end());
    assert_consistent(&arena);
  }

  #[test]
  fn test_sizes_are_word_rounded() {
    let arena = DefaultArena::new();
    let word = core::mem::size_of::<usize>();

    let a = arena.allocate(1).unwrap();
    let b = arena.allocate(3).unwrap();

    assert_eq!(a.size(), word);
    assert_eq!(b.offset(), a.offset() + word);
    assert_consistent(&arena);
  }

  #[test]
  fn test_exhaustion_then_recovery() {
    let arena = DefaultArena::new();

    let blocks: Vec<Block> = [128, 1024, 4096]
      .into_iter()
      .map(|size| arena.allocate(size).unwrap())
      .collect();
    for block in blocks {
      arena.deallocate(block);
    }
    assert!(!arena.is_table_carved());

    let big = arena.allocate(102_400).unwrap();
    assert_eq!(big, Block::new(0, TOTAL_CAPACITY));
    assert!(arena.is_whole_arena_taken());
    assert_consistent(&arena);

    assert_eq!(
      arena.allocate(512),
      Err(AllocError::CapacityExhausted { requested: 512 })
    );
    assert!(!arena.is_table_carved());

    arena.deallocate(big);
    assert!(!arena.is_whole_arena_taken());
    assert!(arena.allocate(512).is_ok());
  }

  #[test]
  fn test_whole_arena_requires_idle_arena() {
    let arena = DefaultArena::new();

    let a = arena.allocate(64).unwrap();
    assert_eq!(
      arena.allocate(102_400),
      Err(AllocError::CapacityExhausted { requested: 102_400 })
    );

    arena.deallocate(a);
    let whole = arena.allocate(102_400).unwrap();
    assert_eq!(
      arena.allocate(102_400),
      Err(AllocError::CapacityExhausted { requested: 102_400 })
    );

    arena.deallocate(whole);
    assert!(arena.allocate(102_400).is_ok());
  }

  #[test]
  fn test_invalid_sizes_leave_state_untouched() {
    let arena = DefaultArena::new();

    assert_eq!(arena.allocate(0), Err(AllocError::InvalidSize { requested: 0 }));
    assert_eq!(arena.allocate(-5), Err(AllocError::InvalidSize { requested: -5 }));
    assert!(!arena.is_table_carved());
    assert!(!arena.is_whole_arena_taken());
    assert_eq!(arena.free_bytes(), TOTAL_CAPACITY);
  }

  #[test]
  fn test_invalid_sizes_keep_live_state() {
    let arena = DefaultArena::new();

    let a = arena.allocate(128).unwrap();
    let b = arena.allocate(1024).unwrap();
    arena.deallocate(a);

    let blocks: Vec<Block> = arena.blocks().collect();
    let free = arena.free_bytes();
    assert_eq!(blocks, [b]);

    for size in [0, -5, isize::MIN] {
      assert_eq!(arena.allocate(size), Err(AllocError::InvalidSize { requested: size }));
      assert!(arena.allocate_ptr(size).is_none());
      assert_eq!(arena.blocks().collect::<Vec<_>>(), blocks);
      assert!(arena.is_table_carved());
      assert_eq!(arena.free_bytes(), free);
    }

    arena.deallocate(b);
    let whole = arena.allocate(102_400).unwrap();

    for size in [0, -5, isize::MIN] {
      assert_eq!(arena.allocate(size), Err(AllocError::InvalidSize { requested: size }));
      assert!(arena.is_whole_arena_taken());
      assert!(!arena.is_table_carved());
      assert_eq!(arena.blocks().count(), 0);
      assert_eq!(arena.free_bytes(), 0);
    }

    arena.deallocate(whole);
    assert_eq!(arena.free_bytes(), TOTAL_CAPACITY);
  }

  #[test]
  fn test_oversized_requests_fail() {
    let arena = DefaultArena::new();

    assert_eq!(
      arena.allocate(200_000),
      Err(AllocError::CapacityExhausted { requested: 200_000 })
    );
    // The table is carved before the size is rejected and stays carved.
    assert!(arena.is_table_carved());
    assert_eq!(arena.live_count(), 0);
    assert_eq!(arena.free_bytes(), TOTAL_CAPACITY - arena.usable_base());
    assert_eq!(
      arena.allocate(102_400),
      Err(AllocError::CapacityExhausted { requested: 102_400 })
    );

    assert_eq!(
      arena.allocate(isize::MAX),
      Err(AllocError::CapacityExhausted {
        requested: isize::MAX as usize
      })
    );

    // Fits the arena but not the window left beside the slot table.
    let requested = TOTAL_CAPACITY - 8;
    assert_eq!(
      arena.allocate(requested as isize),
      Err(AllocError::CapacityExhausted { requested })
    );
    assert!(arena.allocate((TOTAL_CAPACITY - arena.usable_base()) as isize).is_ok());
  }

  #[test]
  fn test_invalid_frees_are_ignored() {
    let arena = DefaultArena::new();
    let a = arena.allocate(64).unwrap();
    let b = arena.allocate(64).unwrap();

    arena.deallocate_ptr(core::ptr::null());

    let foreign = 0u64;
    arena.deallocate_ptr(&foreign as *const u64 as *const u8);

    let inside = arena.as_ptr(a).unwrap().as_ptr().wrapping_add(8);
    arena.deallocate_ptr(inside);

    assert_eq!(arena.live_count(), 2);

    arena.deallocate(a);
    arena.deallocate(a);
    assert_eq!(
      arena.try_deallocate(a),
      Err(AllocError::InvalidFree { offset: a.offset() })
    );
    assert_eq!(arena.blocks().collect::<Vec<_>>(), [b]);
  }

  #[test]
  fn test_free_after_full_reclaim_is_noop() {
    let arena = DefaultArena::new();
    let a = arena.allocate(64).unwrap();

    arena.deallocate(a);
    assert!(!arena.is_table_carved());

    assert_eq!(
      arena.try_deallocate(a),
      Err(AllocError::InvalidFree { offset: a.offset() })
    );
    assert!(!arena.is_table_carved());
  }

  #[test]
  fn test_deallocate_by_pointer() {
    let arena = DefaultArena::new();

    let a = arena.allocate_ptr(128).unwrap();
    let b = arena.allocate_ptr(256).unwrap();

    assert_eq!(arena.live_count(), 2);

    arena.deallocate_ptr(a.as_ptr());
    arena.deallocate_ptr(b.as_ptr());

    assert_eq!(arena.live_count(), 0);
    assert!(!arena.is_table_carved());
    assert!(arena.allocate_ptr(102_400).is_some());
  }

  #[test]
  fn test_whole_arena_free_by_pointer() {
    let arena = DefaultArena::new();

    let whole = arena.allocate_ptr(102_400).unwrap();
    assert_eq!(arena.offset_of(whole.as_ptr()), Some(0));
    assert!(arena.allocate_ptr(8).is_none());

    arena.deallocate_ptr(whole.as_ptr());
    assert!(!arena.is_whole_arena_taken());
  }

  #[test]
  fn test_memory_is_usable() {
    let arena = DefaultArena::new();

    let a = arena.allocate(16).unwrap();
    let b = arena.allocate(16).unwrap();

    assert!(arena.write(a, 0, &[0xAB; 16]));
    assert!(arena.write(b, 0, &[0xCD; 16]));

    unsafe {
      let ptr = arena.as_ptr(a).unwrap().as_ptr() as *mut u32;
      assert_eq!(ptr.read(), 0xABAB_ABAB);
      ptr.write(42);
      assert_eq!(ptr.read(), 42);
    }

    let mut word = [0u8; 4];
    assert!(arena.read(a, 0, &mut word));
    assert_eq!(u32::from_ne_bytes(word), 42);

    let mut contents = [0u8; 16];
    assert!(arena.read(b, 0, &mut contents));
    assert_eq!(contents, [0xCD; 16]);

    assert!(!arena.write(a, 12, &[0; 8]));
    assert!(!arena.read(a, usize::MAX, &mut word));
    assert_consistent(&arena);

    arena.deallocate(a);
    assert!(!arena.write(a, 0, &[1]));
    assert!(!arena.read(a, 0, &mut word));
    assert!(arena.as_ptr(a).is_none());
  }

  #[test]
  fn test_pointer_survives_later_allocation() {
    let arena = Arena::<256, 4>::new();

    let a = arena.allocate_ptr(16).unwrap();
    let _b = arena.allocate_ptr(16).unwrap();

    unsafe {
      a.as_ptr().write(7);
      assert_eq!(a.as_ptr().read(), 7);
    }

    let first = arena.blocks().next().unwrap();
    let mut byte = [0u8; 1];
    assert!(arena.read(first, 0, &mut byte));
    assert_eq!(byte, [7]);
  }

  #[test]
  fn test_pointers_keep_contents_across_calls() {
    let arena = DefaultArena::new();

    let ptrs: Vec<NonNull<u8>> = (0..4).map(|_| arena.allocate_ptr(32).unwrap()).collect();
    for (i, ptr) in ptrs.iter().enumerate() {
      unsafe { ptr.as_ptr().write_bytes(i as u8 + 1, 32) };
    }

    arena.deallocate_ptr(ptrs[1].as_ptr());

    let reused = arena.allocate_ptr(16).unwrap();
    assert_eq!(reused, ptrs[1]);
    unsafe { reused.as_ptr().write_bytes(0xEE, 16) };

    let tail = arena.allocate_ptr(64).unwrap();
    unsafe { tail.as_ptr().write_bytes(0xFF, 64) };

    for (i, ptr) in ptrs.iter().enumerate().filter(|(i, _)| *i != 1) {
      let bytes = unsafe { core::slice::from_raw_parts(ptr.as_ptr(), 32) };
      assert!(
        bytes.iter().all(|&byte| byte == i as u8 + 1),
        "block {i} was overwritten"
      );
    }
    let reused = unsafe { core::slice::from_raw_parts(reused.as_ptr(), 16) };
    assert_eq!(reused, [0xEE; 16]);
    let tail = unsafe { core::slice::from_raw_parts(tail.as_ptr(), 64) };
    assert_eq!(tail, [0xFF; 64]);

    assert_eq!(arena.live_count(), 5);
    assert_consistent(&arena);
  }

  #[test]
  fn test_one_past_end_is_foreign() {
    let arena = DefaultArena::new();

    let a = arena.allocate(64).unwrap();
    let base = arena.as_ptr(a).unwrap().as_ptr().wrapping_sub(a.offset());
    let past_end = base.wrapping_add(TOTAL_CAPACITY);

    assert_eq!(arena.offset_of(base), Some(0));
    assert_eq!(arena.offset_of(past_end.wrapping_sub(1)), Some(TOTAL_CAPACITY - 1));
    assert_eq!(arena.offset_of(past_end), None);

    arena.deallocate_ptr(past_end);
    assert_eq!(arena.blocks().collect::<Vec<_>>(), [a]);

    arena.deallocate(a);
    let whole = arena.allocate_ptr(102_400).unwrap();
    assert_eq!(whole.as_ptr(), base);

    arena.deallocate_ptr(past_end);
    assert!(arena.is_whole_arena_taken());

    arena.deallocate_ptr(whole.as_ptr());
    assert!(!arena.is_whole_arena_taken());
  }

  #[test]
  fn test_metadata_ceiling() {
    let arena = DefaultArena::new();

    let blocks: Vec<Block> = (0..MAX_SLOTS)
      .map(|_| arena.allocate(16).unwrap())
      .collect();

    // Leave a hole after every kept block.
    for block in blocks.iter().skip(1).step_by(2) {
      arena.deallocate(*block);
    }
    for _ in 0..MAX_SLOTS / 2 {
      arena.allocate(8).unwrap();
    }
    assert_eq!(arena.live_count(), MAX_SLOTS);
    assert_consistent(&arena);

    assert!(arena.largest_gap() >= 8);
    assert_eq!(
      arena.allocate(8),
      Err(AllocError::MetadataExhausted { requested: 8 })
    );
    assert_eq!(arena.live_count(), MAX_SLOTS);
  }

  #[test]
  fn test_capacity_checked_before_metadata() {
    let arena = Arena::<256, 4>::new();

    for _ in 0..4 {
      arena.allocate(8).unwrap();
    }
    assert_eq!(
      arena.allocate(8),
      Err(AllocError::MetadataExhausted { requested: 8 })
    );
    assert_eq!(
      arena.allocate(250),
      Err(AllocError::CapacityExhausted { requested: 250 })
    );
  }

  #[test]
  fn test_small_arena_fills_exactly() {
    let arena = Arena::<128, 2>::new();
    let window = 128 - arena.usable_base();

    let a = arena.allocate((window - 16) as isize).unwrap();
    let b = arena.allocate(16).unwrap();

    assert_eq!(b.end(), 128);
    assert_eq!(arena.largest_gap(), 0);
    assert_eq!(arena.free_bytes(), 0);

    arena.deallocate(a);
    arena.deallocate(b);
    assert_eq!(arena.free_bytes(), 128);
    assert!(arena.allocate(128).is_ok());
  }

  #[test]
  fn test_failed_request_keeps_table_carved() {
    let arena = DefaultArena::new();

    let requested = TOTAL_CAPACITY - 8;
    assert!(arena.allocate(requested as isize).is_err());
    assert!(arena.is_table_carved());
    assert_eq!(arena.live_count(), 0);

    // The whole-arena path needs the table withdrawn first.
    assert!(arena.allocate(102_400).is_err());
    let a = arena.allocate(8).unwrap();
    arena.deallocate(a);
    assert!(arena.allocate(102_400).is_ok());
  }

  #[test]
  fn test_random_workload_keeps_invariants() {
    let arena = DefaultArena::new();
    let mut live: Vec<Block> = Vec::new();
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    let mut next = move || {
      state ^= state << 13;
      state ^= state >> 7;
      state ^= state << 17;
      state
    };

    for _ in 0..5_000 {
      let roll = next();
      if roll % 3 == 0 && !live.is_empty() {
        let victim = live.swap_remove((roll as usize / 3) % live.len());
        arena.try_deallocate(victim).unwrap();
      } else {
        let size = (roll % 4096) as isize + 1;
        match arena.allocate(size) {
          Ok(block) => {
            assert!(block.size() >= size as usize);
            live.push(block);
          }
          Err(AllocError::CapacityExhausted { .. } | AllocError::MetadataExhausted { .. }) => {}
          Err(err) => panic!("unexpected error: {err}"),
        }
      }

      assert_eq!(arena.live_count(), live.len());
      assert_consistent(&arena);
    }

    for block in live.drain(..) {
      arena.deallocate(block);
    }
    assert!(!arena.is_table_carved());
    assert!(arena.allocate(102_400).is_ok());
  }

  #[test]
  fn test_debug_output() {
    let arena = Arena::<256, 4>::new();
    arena.allocate(8).unwrap();

    let rendered = format!("{arena:?}");
    assert!(rendered.contains("capacity: 256"));
    assert!(rendered.contains("live: 1"));
  }
}
