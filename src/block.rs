use core::ops::Range;

use bytemuck::{Pod, Zeroable};

/// End-of-list marker for [`Record::next`] and the index head.
pub(crate) const EMPTY: u32 = u32::MAX;

/// Bookkeeping entry for one live block.
///
/// Records are stored inside the arena itself, so the layout is `repr(C)` and
/// plain old data: three `u32` words, no padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub(crate) struct Record {
  /// Byte offset of the block from the arena base.
  pub offset: u32,
  /// Block footprint in bytes. Zero marks an unused slot.
  pub size: u32,
  /// Slot index of the next record in ascending offset order, or [`EMPTY`].
  pub next: u32,
}

impl Record {
  pub const VACANT: Self = Self {
    offset: 0,
    size: 0,
    next: EMPTY,
  };

  pub fn new(
    offset: u32,
    size: u32,
  ) -> Self {
    Self {
      offset,
      size,
      next: EMPTY,
    }
  }

  #[inline]
  pub fn is_vacant(&self) -> bool {
    self.size == 0
  }

  #[inline]
  pub fn end(&self) -> usize {
    self.offset as usize + self.size as usize
  }

  pub fn block(&self) -> Block {
    Block::new(self.offset as usize, self.size as usize)
  }
}

/// Handle to a live block inside an [`Arena`](crate::Arena).
///
/// A handle is an arena-relative `(offset, size)` pair. It carries no pointer,
/// so it stays valid across moves of the arena value; use
/// [`Arena::as_ptr`](crate::Arena::as_ptr), [`Arena::read`](crate::Arena::read)
/// or [`Arena::write`](crate::Arena::write) to reach the memory.
///
/// `size` is the block footprint, which is the requested size rounded up to
/// the machine word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Block {
  offset: usize,
  size: usize,
}

impl Block {
  pub(crate) const fn new(
    offset: usize,
    size: usize,
  ) -> Self {
    Self { offset, size }
  }

  /// Byte offset of the block from the arena base.
  #[inline]
  pub const fn offset(&self) -> usize {
    self.offset
  }

  /// Block footprint in bytes.
  #[inline]
  pub const fn size(&self) -> usize {
    self.size
  }

  /// Offset one past the last byte of the block.
  #[inline]
  pub const fn end(&self) -> usize {
    self.offset + self.size
  }

  /// The arena byte range covered by the block.
  #[inline]
  pub const fn range(&self) -> Range<usize> {
    self.offset..self.end()
  }
}
