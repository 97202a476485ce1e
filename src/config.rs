//! Construction-time knobs of a [`Heap`](crate::Heap).
//!
//! Both axes have cargo-feature defaults (`best-fit`, `mmap`) so a binary can
//! pick its policy at build time, and every value can be overridden when the
//! heap is built.

/// How the allocator chooses among sufficient free blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
  /// First block in scan order that is large enough.
  FirstFit,
  /// Smallest block that is large enough; the first one seen wins ties.
  BestFit,
}

/// Where fresh memory comes from when the free list runs dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
  /// Extend the process data segment with `sbrk`.
  Contiguous,
  /// Map whole pages at an advancing heap end with `mmap`.
  PageMapped,
}

/// Minimum number of units requested from the system per growth.
pub const MIN_GROWTH_UNITS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  pub placement: Placement,
  pub growth: Growth,
  pub min_units: usize,
}

impl Config {
  pub const fn new() -> Self {
    Self {
      placement: if cfg!(feature = "best-fit") { Placement::BestFit } else { Placement::FirstFit },
      growth: if cfg!(feature = "mmap") { Growth::PageMapped } else { Growth::Contiguous },
      min_units: MIN_GROWTH_UNITS,
    }
  }

  pub const fn with_placement(
    mut self,
    placement: Placement,
  ) -> Self {
    self.placement = placement;
    self
  }

  pub const fn with_growth(
    mut self,
    growth: Growth,
  ) -> Self {
    self.growth = growth;
    self
  }

  /// Sets the growth granularity. Zero is treated as one.
  pub const fn with_min_units(
    mut self,
    min_units: usize,
  ) -> Self {
    self.min_units = if min_units == 0 { 1 } else { min_units };
    self
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new()
  }
}
