use thiserror::Error;

/// Result of a heap operation.
pub type AllocResult<T> = Result<T, AllocError>;

/// Ways an allocation request can fail.
///
/// Failures never leave the heap in a modified state: a failed allocation
/// keeps the free list untouched and a failed resize keeps the original block.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  #[error("zero-size allocation requested")]
  ZeroSize,

  #[error("out of memory: the system refused {requested} more bytes")]
  OutOfMemory { requested: usize },

  #[error("request of {requested} bytes exceeds the address space")]
  TooLarge { requested: usize },

  #[error("alignment {align} exceeds the block alignment")]
  Unaligned { align: usize },
}
