use crate::header::UNIT;

/// Rounds `value` up to the next multiple of `to`, which must be a power of two.
///
/// # Examples
///
/// ```rust
/// use kralloc::align;
///
/// assert_eq!(align!(13, 16), 16);
/// assert_eq!(align!(4097, 4096), 8192);
/// assert_eq!(align!(32, 16), 32);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr, $to:expr) => {
    ($value + $to - 1) & !($to - 1)
  };
}

/// Number of header units a block needs to hold `bytes` of payload, header included.
///
/// Returns `None` when the block size would not fit in the address space.
pub fn units_for(bytes: usize) -> Option<usize> {
  let payload = bytes.checked_add(UNIT - 1)? / UNIT;
  let units = payload.checked_add(1)?;

  units.checked_mul(UNIT).filter(|&total| total <= isize::MAX as usize)?;

  Some(units)
}
