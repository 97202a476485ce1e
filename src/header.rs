use std::{mem, ptr::{self, NonNull}};

/// In-band metadata that precedes every block.
///
/// `size` counts header-sized units and includes the header itself. `next`
/// is only meaningful while the block sits on the free list. The alignment
/// forces every payload onto a 16-byte boundary.
#[repr(C, align(16))]
pub struct Header {
  pub next: *mut Header,
  pub size: usize,
}

/// Size of one header, which is also the allocation granule.
pub const UNIT: usize = mem::size_of::<Header>();

impl Header {
  pub const fn new(
    size: usize,
    next: *mut Header,
  ) -> Self {
    Self { next, size }
  }

  /// Writes a fresh header at `at` and returns it.
  ///
  /// # Safety
  ///
  /// `at` must be valid for writes of one `Header` and aligned to `UNIT`.
  pub unsafe fn write(
    at: *mut u8,
    size: usize,
    next: *mut Header,
  ) -> *mut Header {
    let header = at as *mut Header;
    unsafe { header.write(Header::new(size, next)) };
    header
  }

  /// Recovers the header of the block whose payload starts at `payload`.
  ///
  /// Every pointer handed out by the heap is immediately preceded by its
  /// header, so this is a single step back.
  ///
  /// # Safety
  ///
  /// `payload` must have been returned by [`Header::payload`].
  pub unsafe fn from_payload(payload: *mut u8) -> *mut Header {
    unsafe { (payload as *mut Header).sub(1) }
  }

  /// First payload byte of `block`.
  ///
  /// # Safety
  ///
  /// `block` must point to a live header.
  pub unsafe fn payload(block: *mut Header) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked(block.add(1) as *mut u8) }
  }

  /// One-past-the-end of `block`, i.e. where an address-adjacent successor
  /// would start.
  ///
  /// # Safety
  ///
  /// `block` must point to a live header whose `size` is accurate.
  pub unsafe fn end(block: *mut Header) -> *mut Header {
    unsafe { block.wrapping_add((*block).size) }
  }

  /// Carves `units` off the tail of the free block `block` and returns the
  /// header of the carved piece. The head keeps its address and linkage.
  ///
  /// # Safety
  ///
  /// `block` must be a live header with `size > units`.
  pub unsafe fn split_tail(
    block: *mut Header,
    units: usize,
  ) -> *mut Header {
    unsafe {
      (*block).size -= units;
      let tail = block.add((*block).size);
      (*tail).size = units;
      (*tail).next = ptr::null_mut();
      tail
    }
  }

  /// Bytes a caller may use in the block headed by `block`.
  ///
  /// # Safety
  ///
  /// `block` must point to a live header.
  pub unsafe fn capacity(block: *mut Header) -> usize {
    unsafe { ((*block).size - 1) * UNIT }
  }
}
