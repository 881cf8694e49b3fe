/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two. The expansion is a plain integer
/// expression, so it can be used inside `const` items.
///
/// # Examples
///
/// ```rust
/// use fixed_arena::align_to;
///
/// assert_eq!(align_to!(13, 4), 16);
/// assert_eq!(align_to!(16, 4), 16);
/// assert_eq!(align_to!(1, 16), 16);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Calculates the machine word alignment for the given size.
///
/// Every block footprint inside the arena is rounded with this macro, which
/// keeps every block start word aligned.
///
/// # Examples
///
/// ```rust
/// use fixed_arena::align;
///
/// match core::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, ::core::mem::size_of::<usize>())
  };
}
