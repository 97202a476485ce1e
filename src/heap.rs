use std::ptr::{self, NonNull};

use log::debug;

use crate::{
  align::units_for,
  config::{Config, Placement},
  error::{AllocError, AllocResult},
  free_list::{FreeList, Iter},
  header::{Header, UNIT},
  source::{Extent, HeapSource},
};

/// Snapshot of the heap's bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  /// Number of blocks on the free list, sentinel excluded.
  pub free_blocks: usize,
  /// Units held by those blocks, headers included.
  pub free_units: usize,
  /// Units obtained from the source over the heap's lifetime.
  pub obtained_units: usize,
  /// Number of successful growth requests.
  pub extents: usize,
}

/// A free-list heap over memory supplied by `S`.
///
/// All state lives in this value: the free list, its sentinel and cursor,
/// and the growth source. Nothing is locked; a `Heap` must not be used from
/// two threads at once.
pub struct Heap<S> {
  free: FreeList,
  source: S,
  config: Config,
  obtained_units: usize,
  extents: usize,
}

impl<S: HeapSource> Heap<S> {
  pub const fn new(
    source: S,
    config: Config,
  ) -> Self {
    Self {
      free: FreeList::new(),
      source,
      config,
      obtained_units: 0,
      extents: 0,
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  /// Returns a block with room for at least `size` bytes.
  ///
  /// The payload is aligned to [`UNIT`] and immediately preceded by the
  /// block's header. On failure the free list is left exactly as it was.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> AllocResult<NonNull<u8>> {
    if size == 0 {
      debug!("rejecting zero-size allocation");
      return Err(AllocError::ZeroSize);
    }

    let units = units_for(size).ok_or(AllocError::TooLarge { requested: size })?;

    if self.free.is_unseeded() {
      self.grow(units)?;
    }

    loop {
      let found = unsafe {
        match self.config.placement {
          Placement::FirstFit => self.free.first_fit(units),
          Placement::BestFit => self.free.best_fit(units),
        }
      };

      if let Some(payload) = found {
        return Ok(payload);
      }

      self.grow(units)?;
    }
  }

  /// Releases the block whose payload starts at `ptr`. Null is a no-op.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a pointer returned by this heap that has not been
  /// released since.
  pub unsafe fn deallocate(
    &mut self,
    ptr: *mut u8,
  ) {
    if ptr.is_null() {
      return;
    }

    unsafe { self.free.insert(Header::from_payload(ptr)) };
  }

  /// Moves the block at `ptr` into a fresh block of `size` bytes, carrying
  /// over as much of the old contents as fits. Null behaves like
  /// [`Heap::allocate`].
  ///
  /// The block is always relocated. If the new block cannot be had, the old
  /// one is untouched and still owned by the caller.
  ///
  /// # Safety
  ///
  /// Same contract as [`Heap::deallocate`].
  pub unsafe fn reallocate(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> AllocResult<NonNull<u8>> {
    if ptr.is_null() {
      return self.allocate(size);
    }

    let fresh = self.allocate(size)?;

    unsafe {
      let capacity = Header::capacity(Header::from_payload(ptr));
      ptr::copy_nonoverlapping(ptr, fresh.as_ptr(), size.min(capacity));
      self.deallocate(ptr);
    }

    Ok(fresh)
  }

  /// Payload bytes available in the block at `ptr`.
  ///
  /// # Safety
  ///
  /// `ptr` must be a live pointer returned by this heap.
  pub unsafe fn usable_size(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    unsafe { Header::capacity(Header::from_payload(ptr.as_ptr())) }
  }

  /// Upper bound of the memory obtained so far, as reported by the source.
  pub fn heap_end(&mut self) -> *mut u8 {
    self.source.heap_end()
  }

  /// Free blocks in list order, starting after the sentinel.
  pub fn free_blocks(&self) -> Iter<'_> {
    self.free.iter()
  }

  pub fn stats(&self) -> HeapStats {
    let (free_blocks, free_units) = self
      .free
      .iter()
      .fold((0, 0), |(count, units), block| (count + 1, units + block.units));

    HeapStats {
      free_blocks,
      free_units,
      obtained_units: self.obtained_units,
      extents: self.extents,
    }
  }

  /// Obtains room for at least `units` from the source and frees it into the
  /// list. The first extent also donates one unit to the sentinel.
  fn grow(
    &mut self,
    units: usize,
  ) -> AllocResult<()> {
    let seeding = self.free.is_unseeded();
    let wanted = units.max(self.config.min_units) + usize::from(seeding);
    let bytes = wanted
      .checked_mul(UNIT)
      .ok_or(AllocError::TooLarge { requested: units })?;

    let Extent { start, len } = self.source.obtain(bytes)?;
    let mut block = start.as_ptr();
    let mut granted = len / UNIT;

    debug!(
      "grew heap by {} units ({} requested) at {:p}",
      granted, units, block
    );

    self.obtained_units += granted;
    self.extents += 1;

    unsafe {
      if seeding {
        self.free.seed(block);
        block = block.add(UNIT);
        granted -= 1;
      }

      Header::write(block, granted, ptr::null_mut());
      self.free.insert(block as *mut Header);
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arena::ArenaSource;

  fn arena_heap(
    units: usize,
    config: Config,
  ) -> Heap<ArenaSource> {
    Heap::new(ArenaSource::new(units * UNIT).unwrap(), config)
  }

  #[test]
  fn test_zero_size_is_rejected() {
    let mut heap = arena_heap(64, Config::new());

    assert_eq!(heap.allocate(0), Err(AllocError::ZeroSize));
    assert_eq!(heap.stats().extents, 0);
  }

  #[test]
  fn test_huge_request_is_rejected() {
    let mut heap = arena_heap(64, Config::new());

    assert_eq!(heap.allocate(usize::MAX), Err(AllocError::TooLarge { requested: usize::MAX }));
  }

  #[test]
  fn test_first_allocation_seeds_and_carves_tail() {
    let mut heap = arena_heap(64, Config::new().with_min_units(32));

    let p = heap.allocate(20).unwrap();
    let base = heap.source().base() as usize;

    // Sentinel at unit 0, free block at units 1..30, allocated block at 30..33.
    assert_eq!(p.as_ptr() as usize, base + 31 * UNIT);
    assert_eq!(heap.stats().free_units, 29);
    assert_eq!(heap.stats().obtained_units, 33);
    assert_eq!(unsafe { heap.usable_size(p) }, 2 * UNIT);
  }

  #[test]
  fn test_payloads_are_aligned_and_usable() {
    let mut heap = arena_heap(256, Config::new().with_min_units(16));

    let mut blocks = Vec::new();
    for size in [1, 7, 16, 17, 100, 250] {
      let p = heap.allocate(size).unwrap();
      assert_eq!(p.as_ptr() as usize % UNIT, 0);
      unsafe { ptr::write_bytes(p.as_ptr(), size as u8, size) };
      blocks.push((p, size));
    }

    for (p, size) in blocks {
      let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), size) };
      assert!(bytes.iter().all(|&b| b == size as u8));
    }
  }

  #[test]
  fn test_deallocate_null_is_noop() {
    let mut heap = arena_heap(64, Config::new().with_min_units(16));
    let p = heap.allocate(8).unwrap();
    let before: Vec<_> = heap.free_blocks().collect();

    unsafe { heap.deallocate(ptr::null_mut()) };

    assert_eq!(heap.free_blocks().collect::<Vec<_>>(), before);
    unsafe { heap.deallocate(p.as_ptr()) };
  }

  #[test]
  fn test_reuses_freed_block() {
    let mut heap = arena_heap(64, Config::new().with_min_units(32));

    let first = heap.allocate(32).unwrap();
    let _second = heap.allocate(32).unwrap();
    unsafe { heap.deallocate(first.as_ptr()) };

    let third = heap.allocate(32).unwrap();

    assert_eq!(first, third);
  }

  #[test]
  fn test_exhaustion_keeps_heap_intact() {
    let mut heap = arena_heap(17, Config::new().with_min_units(16));

    let p = heap.allocate(64).unwrap();
    let before = heap.stats();

    assert_eq!(heap.allocate(1024), Err(AllocError::OutOfMemory { requested: 65 * UNIT }));
    assert_eq!(heap.stats(), before);

    let q = heap.allocate(64).unwrap();
    assert_ne!(p, q);
  }

  #[test]
  fn test_growth_merges_contiguous_extents() {
    let mut heap = arena_heap(64, Config::new().with_min_units(8));

    let p = heap.allocate(6 * UNIT).unwrap();
    unsafe { heap.deallocate(p.as_ptr()) };
    let _q = heap.allocate(20 * UNIT).unwrap();

    // The second extent lands right above the first free block and merges with it.
    let stats = heap.stats();
    assert_eq!(stats.extents, 2);
    assert_eq!(stats.obtained_units, 9 + 21);
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.free_units, 29 - 21);
  }

  #[test]
  fn test_reallocate_null_allocates() {
    let mut heap = arena_heap(64, Config::new().with_min_units(16));

    let p = unsafe { heap.reallocate(ptr::null_mut(), 24) }.unwrap();

    assert!(unsafe { heap.usable_size(p) } >= 24);
  }

  #[test]
  fn test_reallocate_failure_keeps_original() {
    let mut heap = arena_heap(17, Config::new().with_min_units(16));

    let p = heap.allocate(16).unwrap();
    unsafe { ptr::write_bytes(p.as_ptr(), 0x5A, 16) };
    let before = heap.stats();

    let result = unsafe { heap.reallocate(p.as_ptr(), 4096) };

    assert!(matches!(result, Err(AllocError::OutOfMemory { .. })));
    assert_eq!(heap.stats(), before);
    let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), 16) };
    assert!(bytes.iter().all(|&b| b == 0x5A));
  }
}
