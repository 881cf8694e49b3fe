use core::cell::Cell;
use core::mem;
use core::ops::Range;
use core::slice;

use bytemuck::Pod;

use crate::align;
use crate::block::{EMPTY, Record};

pub(crate) const RECORD_SIZE: usize = mem::size_of::<Record>();

/// Bytes at the front of the arena withheld while the table is carved.
///
/// Rounded up to the machine word so the usable window starts aligned.
pub(crate) const fn reserved_bytes(slots: usize) -> usize {
  align!(slots * RECORD_SIZE)
}

/// Views `count` values of `T` starting at `base` as shared cells.
///
/// Returns `None` if `base` is not aligned for `T`. `T: Pod` makes any byte
/// pattern already in the buffer a valid value.
///
/// # Safety
///
/// `base` must be valid for reads and writes of `count * size_of::<T>()`
/// initialized bytes for `'a`, and those bytes must only be accessed through
/// cells or raw pointers while the view is alive.
pub(crate) unsafe fn overlay_cells<'a, T: Pod>(
  base: *mut u8,
  count: usize,
) -> Option<&'a [Cell<T>]> {
  if base.addr() % mem::align_of::<T>() != 0 {
    return None;
  }
  Some(unsafe { slice::from_raw_parts(base.cast::<Cell<T>>(), count) })
}

/// View over the slot table and the head of the live-block list.
///
/// The list threads live records through their `next` field in strictly
/// ascending offset order. Vacant slots are never linked.
#[derive(Clone, Copy)]
pub(crate) struct LiveIndex<'a> {
  records: &'a [Cell<Record>],
  head: &'a Cell<u32>,
}

impl<'a> LiveIndex<'a> {
  pub fn new(
    records: &'a [Cell<Record>],
    head: &'a Cell<u32>,
  ) -> Self {
    Self { records, head }
  }

  /// Marks every slot unused and empties the list.
  pub fn reset(&self) {
    for record in self.records {
      record.set(Record::VACANT);
    }
    self.head.set(EMPTY);
  }

  /// First unused slot in table order.
  pub fn free_slot(&self) -> Option<usize> {
    self.records.iter().position(|record| record.get().is_vacant())
  }

  /// Stores `record` in `slot` and links it into the list.
  pub fn place(
    &self,
    slot: usize,
    record: Record,
  ) {
    self.records[slot].set(record);
    self.insert_sorted(slot);
  }

  /// Links `slot` immediately before the first record with a larger offset.
  pub fn insert_sorted(
    &self,
    slot: usize,
  ) {
    let offset = self.get(slot).offset;
    let link = slot as u32;
    let head = self.head.get();

    if head == EMPTY || offset < self.get(head as usize).offset {
      self.set_next(slot, head);
      self.head.set(link);
      return;
    }

    let mut prev = head as usize;
    loop {
      let next = self.get(prev).next;
      if next == EMPTY || self.get(next as usize).offset >= offset {
        break;
      }
      prev = next as usize;
    }

    self.set_next(slot, self.get(prev).next);
    self.set_next(prev, link);
  }

  /// Unlinks the record starting at `offset` and returns its slot.
  ///
  /// The record keeps its offset and size; call [`vacate`](Self::vacate) to
  /// hand the slot back.
  pub fn remove_by_offset(
    &self,
    offset: u32,
  ) -> Option<usize> {
    let mut prev: Option<usize> = None;
    let mut cursor = self.head.get();

    while cursor != EMPTY {
      let current = cursor as usize;
      let record = self.get(current);

      if record.offset == offset {
        match prev {
          None => self.head.set(record.next),
          Some(prev) => self.set_next(prev, record.next),
        }
        self.set_next(current, EMPTY);
        return Some(current);
      }

      prev = Some(current);
      cursor = record.next;
    }

    None
  }

  pub fn vacate(
    &self,
    slot: usize,
  ) {
    self.records[slot].set(Record::VACANT);
  }

  pub fn is_empty(&self) -> bool {
    self.head.get() == EMPTY
  }

  pub fn iter(&self) -> Iter<'a> {
    Iter::new(self.records, self.head.get())
  }

  fn get(
    &self,
    slot: usize,
  ) -> Record {
    self.records[slot].get()
  }

  fn set_next(
    &self,
    slot: usize,
    next: u32,
  ) {
    let mut record = self.get(slot);
    record.next = next;
    self.records[slot].set(record);
  }
}

/// Walks the live-block list in ascending offset order.
///
/// The walk visits at most one record per slot, so a corrupted `next` chain
/// cannot make it spin.
#[derive(Clone)]
pub(crate) struct Iter<'a> {
  records: &'a [Cell<Record>],
  cursor: u32,
  remaining: usize,
}

impl<'a> Iter<'a> {
  pub fn new(
    records: &'a [Cell<Record>],
    head: u32,
  ) -> Self {
    Self {
      records,
      cursor: head,
      remaining: records.len(),
    }
  }
}

impl Iterator for Iter<'_> {
  type Item = Record;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 || self.cursor == EMPTY {
      return None;
    }
    let record = self.records.get(self.cursor as usize)?.get();
    self.cursor = record.next;
    self.remaining -= 1;
    Some(record)
  }
}

/// Free byte ranges of the window `[start, limit)` between live blocks.
///
/// Yields non-empty ranges only, lowest address first.
pub(crate) struct Gaps<'a> {
  live: Iter<'a>,
  cursor: usize,
  limit: usize,
  finished: bool,
}

impl<'a> Gaps<'a> {
  pub fn new(
    live: Iter<'a>,
    start: usize,
    limit: usize,
  ) -> Self {
    Self {
      live,
      cursor: start,
      limit,
      finished: false,
    }
  }
}

impl Iterator for Gaps<'_> {
  type Item = Range<usize>;

  fn next(&mut self) -> Option<Self::Item> {
    while !self.finished {
      match self.live.next() {
        Some(record) => {
          let start = self.cursor;
          let end = record.offset as usize;
          self.cursor = self.cursor.max(record.end());
          if end > start {
            return Some(start..end);
          }
        }
        None => {
          self.finished = true;
          if self.limit > self.cursor {
            return Some(self.cursor..self.limit);
          }
        }
      }
    }
    None
  }
}
