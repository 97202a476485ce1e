//! The circular, address-ordered list of free blocks.
//!
//! The list lives entirely inside the managed memory: every free block's
//! header links to the next free block in address order, and the highest
//! block links back to the lowest. A zero-size sentinel seeds the list so it
//! is never empty, and a roving cursor remembers where the last operation
//! happened.
//!
//! ```text
//!        cursor
//!          │
//!          ▼
//!   ┌───┐    ┌──────┐    ┌────────┐    ┌───┐
//!   │ S │ ─► │ free │ ─► │  free  │ ─► │ f │ ─┐
//!   └───┘    └──────┘    └────────┘    └───┘  │
//!     ▲                                       │
//!     └───────────────────────────────────────┘
//!   low addresses                  high addresses
//! ```

use std::{marker::PhantomData, ptr::{self, NonNull}};

use log::trace;

use crate::header::{Header, UNIT};

/// A free block as seen from outside the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
  /// Address of the block's header.
  pub addr: usize,
  /// Size in units, header included.
  pub units: usize,
}

impl FreeBlock {
  /// One past the last byte of the block.
  pub fn end(&self) -> usize {
    self.addr + self.units * UNIT
  }
}

pub struct FreeList {
  base: *mut Header,
  cursor: *mut Header,
}

impl FreeList {
  pub const fn new() -> Self {
    Self {
      base: ptr::null_mut(),
      cursor: ptr::null_mut(),
    }
  }

  /// True until the first extent has seeded the sentinel.
  pub fn is_unseeded(&self) -> bool {
    self.base.is_null()
  }

  /// Installs the zero-size sentinel at `at`, forming a one-node ring.
  ///
  /// # Safety
  ///
  /// `at` must be one unit of memory the heap owns for good.
  pub unsafe fn seed(
    &mut self,
    at: *mut u8,
  ) {
    let base = at as *mut Header;
    unsafe { Header::write(at, 0, base) };
    self.base = base;
    self.cursor = base;
  }

  /// Returns the block headed by `bp` to the list, merging it with whichever
  /// address-adjacent neighbors are free.
  ///
  /// # Safety
  ///
  /// The list must be seeded and `bp` must head a block that is not on the
  /// list and overlaps no other block.
  pub unsafe fn insert(
    &mut self,
    bp: *mut Header,
  ) {
    unsafe {
      let mut p = self.cursor;

      while !(bp > p && bp < (*p).next) {
        // At the wraparound point, bp sorts before the lowest or after the highest block.
        if p >= (*p).next && (bp > p || bp < (*p).next) {
          break;
        }
        p = (*p).next;
      }

      let upper = (*p).next;
      if Header::end(bp) == upper && upper != self.base {
        (*bp).size += (*upper).size;
        (*bp).next = (*upper).next;
      } else {
        (*bp).next = upper;
      }

      if Header::end(p) == bp {
        (*p).size += (*bp).size;
        (*p).next = (*bp).next;
      } else {
        (*p).next = bp;
      }

      self.cursor = p;
    }
  }

  /// Scans one lap from the cursor and takes the first block of at least
  /// `units`.
  ///
  /// # Safety
  ///
  /// The list must be seeded.
  pub unsafe fn first_fit(
    &mut self,
    units: usize,
  ) -> Option<NonNull<u8>> {
    unsafe {
      let mut prev = self.cursor;
      let mut p = (*prev).next;

      loop {
        if (*p).size >= units {
          trace!("first fit: {} units from block {:p} of {}", units, p, (*p).size);
          return Some(self.take(prev, p, units));
        }
        if p == self.cursor {
          return None;
        }
        prev = p;
        p = (*p).next;
      }
    }
  }

  /// Scans one full lap and takes the smallest block of at least `units`,
  /// stopping early on an exact fit.
  ///
  /// # Safety
  ///
  /// The list must be seeded.
  pub unsafe fn best_fit(
    &mut self,
    units: usize,
  ) -> Option<NonNull<u8>> {
    unsafe {
      let mut prev = self.cursor;
      let mut p = (*prev).next;
      let mut best: Option<(*mut Header, *mut Header)> = None;

      loop {
        if (*p).size == units {
          trace!("best fit: exact {} units at {:p}", units, p);
          return Some(self.take(prev, p, units));
        }
        if (*p).size > units && best.is_none_or(|(_, b)| (*p).size < (*b).size) {
          best = Some((prev, p));
        }
        if p == self.cursor {
          break;
        }
        prev = p;
        p = (*p).next;
      }

      let (prev, p) = best?;
      trace!("best fit: {} units from block {:p} of {}", units, p, (*p).size);
      Some(self.take(prev, p, units))
    }
  }

  /// Hands out `units` of `p`, whose list predecessor is `prev`.
  unsafe fn take(
    &mut self,
    prev: *mut Header,
    p: *mut Header,
    units: usize,
  ) -> NonNull<u8> {
    unsafe {
      let block = if (*p).size == units {
        (*prev).next = (*p).next;
        p
      } else {
        Header::split_tail(p, units)
      };

      self.cursor = prev;
      Header::payload(block)
    }
  }

  /// Free blocks in list order, starting after the sentinel.
  pub fn iter(&self) -> Iter<'_> {
    let next = if self.base.is_null() {
      ptr::null_mut()
    } else {
      unsafe { (*self.base).next }
    };

    Iter {
      base: self.base,
      next,
      _list: PhantomData,
    }
  }

  /// Address of the block the next search starts after.
  #[cfg(test)]
  pub fn cursor(&self) -> *mut Header {
    self.cursor
  }
}

pub struct Iter<'a> {
  base: *mut Header,
  next: *mut Header,
  _list: PhantomData<&'a FreeList>,
}

impl Iterator for Iter<'_> {
  type Item = FreeBlock;

  fn next(&mut self) -> Option<FreeBlock> {
    if self.next.is_null() || self.next == self.base {
      return None;
    }

    let block = self.next;
    unsafe {
      self.next = (*block).next;
      Some(FreeBlock {
        addr: block as usize,
        units: (*block).size,
      })
    }
  }
}
