use std::{
  alloc::{GlobalAlloc, Layout},
  ptr,
};

use spin::Mutex;

use crate::{
  config::Config,
  error::{AllocError, AllocResult},
  header::UNIT,
  heap::{Heap, HeapStats},
  source::OsHeap,
};

/// A process-wide heap backed by the operating system.
///
/// The heap itself is strictly single-threaded; this wrapper serializes every
/// call behind a spin lock so it can be installed as the global allocator.
/// Calls are not reentrant: a logger that allocates while recording the
/// heap's own `debug!`/`warn!` lines would spin forever, so leave those levels
/// disabled when this heap is installed.
///
/// ```rust,ignore
/// use kralloc::{Config, GlobalHeap};
///
/// #[global_allocator]
/// static HEAP: GlobalHeap = GlobalHeap::new(Config::new());
/// ```
pub struct GlobalHeap {
  heap: Mutex<Heap<OsHeap>>,
}

// The list and the page-map end point into memory owned by the heap itself,
// never into thread-local state, and the mutex grants one user at a time.
unsafe impl Send for Heap<OsHeap> {}

impl GlobalHeap {
  pub const fn new(config: Config) -> Self {
    Self {
      heap: Mutex::new(Heap::new(OsHeap::new(config.growth), config)),
    }
  }

  /// Runs `f` with exclusive access to the underlying heap.
  pub fn with<R>(
    &self,
    f: impl FnOnce(&mut Heap<OsHeap>) -> R,
  ) -> R {
    let mut heap = self.heap.lock();
    f(&mut heap)
  }

  pub fn heap_end(&self) -> *mut u8 {
    self.with(|heap| heap.heap_end())
  }

  pub fn stats(&self) -> HeapStats {
    self.with(|heap| heap.stats())
  }

  fn check(layout: Layout) -> AllocResult<usize> {
    if layout.align() > UNIT {
      return Err(AllocError::Unaligned { align: layout.align() });
    }
    Ok(layout.size())
  }
}

unsafe impl GlobalAlloc for GlobalHeap {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    Self::check(layout)
      .and_then(|size| self.with(|heap| heap.allocate(size)))
      .map_or(ptr::null_mut(), |p| p.as_ptr())
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    self.with(|heap| unsafe { heap.deallocate(ptr) })
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    Self::check(layout)
      .and_then(|_| self.with(|heap| unsafe { heap.reallocate(ptr, new_size) }))
      .map_or(ptr::null_mut(), |p| p.as_ptr())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Growth;
  use serial_test::serial;

  #[test]
  #[serial]
  fn test_global_alloc_round_trip() {
    let heap = GlobalHeap::new(Config::new().with_growth(Growth::Contiguous));
    let layout = Layout::array::<u64>(8).unwrap();

    unsafe {
      let p = heap.alloc(layout) as *mut u64;
      assert!(!p.is_null());

      for i in 0..8 {
        p.add(i).write(i as u64 * 3);
      }

      let q = heap.realloc(p as *mut u8, layout, 128) as *mut u64;
      assert!(!q.is_null());
      for i in 0..8 {
        assert_eq!(q.add(i).read(), i as u64 * 3);
      }

      heap.dealloc(q as *mut u8, Layout::from_size_align(128, 8).unwrap());
    }

    assert_eq!(heap.stats().free_blocks, 1);
  }

  #[test]
  #[serial]
  fn test_shared_across_threads() {
    let heap = GlobalHeap::new(Config::new().with_growth(Growth::PageMapped));
    let layout = Layout::from_size_align(48, 16).unwrap();

    std::thread::scope(|scope| {
      for tag in 1..=4u8 {
        let heap = &heap;
        scope.spawn(move || {
          for _ in 0..200 {
            unsafe {
              let p = heap.alloc(layout);
              assert!(!p.is_null());
              p.write_bytes(tag, layout.size());
              assert!(std::slice::from_raw_parts(p, layout.size()).iter().all(|&b| b == tag));
              heap.dealloc(p, layout);
            }
          }
        });
      }
    });

    let stats = heap.stats();
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.free_units + 1, stats.obtained_units);
  }

  #[test]
  fn test_over_aligned_layout_is_refused() {
    let heap = GlobalHeap::new(Config::new());
    let layout = Layout::from_size_align(64, 64).unwrap();

    assert!(unsafe { heap.alloc(layout) }.is_null());
    assert_eq!(heap.stats().extents, 0);
  }

  #[test]
  #[serial]
  fn test_page_mapped_heap_end_moves() {
    let heap = GlobalHeap::new(Config::new().with_growth(Growth::PageMapped));

    let seeded = heap.heap_end();
    let p = unsafe { heap.alloc(Layout::from_size_align(10_000, 8).unwrap()) };

    assert!(!p.is_null());
    assert!(heap.heap_end() > seeded);
  }
}
