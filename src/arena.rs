use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use log::warn;

use crate::{
  align,
  error::{AllocError, AllocResult},
  header::UNIT,
  source::{Extent, HeapSource},
};

/// A bounded heap source carved from one private buffer.
///
/// Extents are handed out bottom-up and are address-contiguous, like the
/// program break. Once the buffer is spent every request is refused, which
/// makes it the tool of choice for exercising out-of-memory paths.
///
/// ```text
///   ┌──────────────┬──────────────┬───────────────────────────┐
///   │   extent 1   │   extent 2   │        not yet used       │
///   └──────────────┴──────────────┴───────────────────────────┘
///   ▲ base                        ▲ heap_end                  ▲ limit
/// ```
pub struct ArenaSource {
  base: NonNull<u8>,
  used: usize,
  capacity: usize,
}

impl ArenaSource {
  /// Creates an arena able to hand out `capacity` bytes, rounded down to
  /// whole units.
  pub fn new(capacity: usize) -> AllocResult<Self> {
    let capacity = capacity / UNIT * UNIT;
    let layout = Layout::from_size_align(capacity.max(UNIT), UNIT)
      .map_err(|_| AllocError::TooLarge { requested: capacity })?;

    let base = unsafe { alloc::alloc(layout) };
    let base = NonNull::new(base).ok_or(AllocError::OutOfMemory { requested: capacity })?;

    Ok(Self { base, used: 0, capacity })
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn remaining(&self) -> usize {
    self.capacity - self.used
  }

  /// Lowest address the arena can hand out.
  pub fn base(&self) -> *mut u8 {
    self.base.as_ptr()
  }
}

impl HeapSource for ArenaSource {
  fn obtain(
    &mut self,
    bytes: usize,
  ) -> AllocResult<Extent> {
    if bytes > self.remaining() {
      warn!(
        "arena exhausted: {} bytes requested, {} of {} left",
        bytes,
        self.remaining(),
        self.capacity
      );
      return Err(AllocError::OutOfMemory { requested: bytes });
    }

    let len = align!(bytes, UNIT).min(self.remaining());
    let start = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(self.used)) };
    self.used += len;

    Ok(Extent { start, len })
  }

  fn heap_end(&mut self) -> *mut u8 {
    unsafe { self.base.as_ptr().add(self.used) }
  }
}

impl Drop for ArenaSource {
  fn drop(&mut self) {
    let layout = Layout::from_size_align(self.capacity.max(UNIT), UNIT);

    if let Ok(layout) = layout {
      unsafe { alloc::dealloc(self.base.as_ptr(), layout) };
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extents_are_contiguous() {
    let mut arena = ArenaSource::new(64 * UNIT).unwrap();

    let first = arena.obtain(10 * UNIT).unwrap();
    let second = arena.obtain(3).unwrap();

    assert_eq!(first.start.as_ptr(), arena.base());
    assert_eq!(first.len, 10 * UNIT);
    assert_eq!(second.start.as_ptr(), unsafe { arena.base().add(10 * UNIT) });
    assert_eq!(second.len, UNIT);
    assert_eq!(arena.heap_end(), unsafe { arena.base().add(11 * UNIT) });
  }

  #[test]
  fn test_refuses_past_capacity() {
    let mut arena = ArenaSource::new(4 * UNIT).unwrap();

    assert!(arena.obtain(3 * UNIT).is_ok());
    assert_eq!(
      arena.obtain(2 * UNIT),
      Err(AllocError::OutOfMemory { requested: 2 * UNIT })
    );
    assert_eq!(arena.remaining(), UNIT);
    assert!(arena.obtain(UNIT).is_ok());
  }

  #[test]
  fn test_capacity_rounds_down() {
    let arena = ArenaSource::new(5 * UNIT + 7).unwrap();

    assert_eq!(arena.capacity(), 5 * UNIT);
  }
}
