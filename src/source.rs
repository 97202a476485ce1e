//! Raw memory from the operating system.
//!
//! The heap never talks to the kernel directly; it asks a [`HeapSource`] for
//! an [`Extent`] and threads it into the free list. Two system-backed sources
//! exist, matching the two [`Growth`] strategies:
//!
//! ```text
//!   Contiguous (sbrk):                 Page-mapped (mmap):
//!
//!   ┌────────┬────────┬────────┐       ┌──────────┐   ┌──────────┐
//!   │ ext 1  │ ext 2  │ ext 3  │       │  pages   │ … │  pages   │
//!   └────────┴────────┴────────┘       └──────────┘   └──────────┘
//!                              ▲                                 ▲
//!                        program break                       heap end
//! ```

use std::{cmp, ptr::{self, NonNull}};

use libc::{c_void, intptr_t, sbrk};
use log::warn;

use crate::{
  align,
  config::Growth,
  error::{AllocError, AllocResult},
  header::UNIT,
};

/// A run of fresh memory handed over by a [`HeapSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
  pub start: NonNull<u8>,
  pub len: usize,
}

/// Supplier of raw memory for a heap.
pub trait HeapSource {
  /// Obtains at least `bytes` of fresh, `UNIT`-aligned memory.
  ///
  /// The returned extent must not overlap any extent obtained before. It is
  /// never given back.
  fn obtain(
    &mut self,
    bytes: usize,
  ) -> AllocResult<Extent>;

  /// Current upper bound of the memory this source has handed out.
  fn heap_end(&mut self) -> *mut u8;
}

fn refused(
  requested: usize,
  what: &str,
) -> AllocError {
  warn!(
    "failed to get more memory: {} of {} bytes refused ({})",
    what,
    requested,
    std::io::Error::last_os_error()
  );
  AllocError::OutOfMemory { requested }
}

fn program_break() -> *mut u8 {
  unsafe { sbrk(0) as *mut u8 }
}

/// Grows the heap by moving the program break.
#[derive(Debug, Default)]
pub struct Sbrk;

impl Sbrk {
  /// Cuts the `UNIT`-aligned part out of `total` bytes granted at `cp`.
  ///
  /// Someone may have moved the break between measuring the padding and
  /// the grant, leaving less than `bytes` once realigned.
  fn trim(
    cp: *mut u8,
    total: usize,
    bytes: usize,
  ) -> AllocResult<Extent> {
    let skip = cp.align_offset(UNIT);
    let len = total.saturating_sub(skip) / UNIT * UNIT;

    if len < bytes {
      return Err(refused(bytes, "sbrk"));
    }

    let start = unsafe { NonNull::new_unchecked(cp.wrapping_add(skip)) };

    Ok(Extent { start, len })
  }
}

impl HeapSource for Sbrk {
  fn obtain(
    &mut self,
    bytes: usize,
  ) -> AllocResult<Extent> {
    let pad = program_break().align_offset(UNIT);
    let total = bytes
      .checked_add(pad)
      .filter(|&total| total <= intptr_t::MAX as usize)
      .ok_or(AllocError::TooLarge { requested: bytes })?;

    let cp = unsafe { sbrk(total as intptr_t) };

    if cp == usize::MAX as *mut c_void {
      return Err(refused(bytes, "sbrk"));
    }

    Self::trim(cp as *mut u8, total, bytes)
  }

  fn heap_end(&mut self) -> *mut u8 {
    program_break()
  }
}

/// Maps anonymous pages at an advancing heap end.
///
/// The end is seeded lazily from the program break so that mappings land
/// right above the data segment when the kernel honors the hint.
#[derive(Debug)]
pub struct PageMap {
  end: *mut u8,
}

impl PageMap {
  pub const fn new() -> Self {
    Self { end: ptr::null_mut() }
  }

  fn page_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
      size if size > 0 => size as usize,
      _ => 4096,
    }
  }

  fn seed(&mut self) -> *mut u8 {
    if self.end.is_null() {
      self.end = program_break();
    }
    self.end
  }
}

impl Default for PageMap {
  fn default() -> Self {
    Self::new()
  }
}

impl HeapSource for PageMap {
  fn obtain(
    &mut self,
    bytes: usize,
  ) -> AllocResult<Extent> {
    let hint = self.seed();
    let page = Self::page_size();

    if bytes > isize::MAX as usize - page {
      return Err(AllocError::TooLarge { requested: bytes });
    }

    let len = align!(bytes, page);

    let cp = unsafe {
      libc::mmap(
        hint as *mut c_void,
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if cp == libc::MAP_FAILED {
      return Err(refused(bytes, "mmap"));
    }

    let start = cp as *mut u8;
    self.end = cmp::max(self.end, start.wrapping_add(len));

    Ok(Extent {
      start: unsafe { NonNull::new_unchecked(start) },
      len,
    })
  }

  fn heap_end(&mut self) -> *mut u8 {
    self.seed()
  }
}

/// System source selected by a [`Growth`] value.
#[derive(Debug)]
pub enum OsHeap {
  Contiguous(Sbrk),
  PageMapped(PageMap),
}

impl OsHeap {
  pub const fn new(growth: Growth) -> Self {
    match growth {
      Growth::Contiguous => OsHeap::Contiguous(Sbrk),
      Growth::PageMapped => OsHeap::PageMapped(PageMap::new()),
    }
  }
}

impl HeapSource for OsHeap {
  fn obtain(
    &mut self,
    bytes: usize,
  ) -> AllocResult<Extent> {
    match self {
      OsHeap::Contiguous(source) => source.obtain(bytes),
      OsHeap::PageMapped(source) => source.obtain(bytes),
    }
  }

  fn heap_end(&mut self) -> *mut u8 {
    match self {
      OsHeap::Contiguous(source) => source.heap_end(),
      OsHeap::PageMapped(source) => source.heap_end(),
    }
  }
}
