use thiserror::Error;

/// Reasons an arena operation can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum AllocError {
  /// The requested size was zero or negative.
  #[error("invalid allocation size: {requested} (must be > 0)")]
  InvalidSize { requested: isize },

  /// No contiguous gap of the requested size exists in the arena.
  #[error("arena capacity exhausted (requested: {requested} bytes)")]
  CapacityExhausted { requested: usize },

  /// A gap fits, but every metadata slot already describes a live block.
  #[error("metadata slots exhausted (requested: {requested} bytes)")]
  MetadataExhausted { requested: usize },

  /// No live block starts at the given offset.
  #[error("no live block starts at offset {offset:#x}")]
  InvalidFree { offset: usize },
}

pub type Result<T> = core::result::Result<T, AllocError>;
