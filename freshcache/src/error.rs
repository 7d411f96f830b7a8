use thiserror::Error;

use crate::ItemId;

/// Errors that can occur when building a policy, estimator or library.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
  /// The library was configured with zero items.
  #[error("library size cannot be zero")]
  EmptyLibrary,

  /// A cache (or cache tier) was configured with a capacity of zero.
  #[error("cache capacity cannot be zero")]
  ZeroCapacity,

  /// The cache can never hold more items than the library contains.
  #[error("cache size {cache_size} exceeds library size {library_size}")]
  CacheTooLarge {
    cache_size: usize,
    library_size: usize,
  },

  /// A per-item vector does not have one entry per library item.
  #[error("`{field}` has {actual} entries but the library holds {expected} items")]
  LengthMismatch {
    field: &'static str,
    expected: usize,
    actual: usize,
  },

  /// A cost component is negative, NaN or infinite.
  #[error("cost component `{name}` must be finite and non-negative, got {value}")]
  InvalidCost { name: &'static str, value: f64 },

  #[error("invalid value for `{field}`: {message}")]
  InvalidValue {
    field: &'static str,
    message: String,
  },

  /// A freshness-constrained policy was requested without a freshness vector.
  #[error("a freshness vector is required for freshness-constrained caches")]
  MissingFreshness,

  /// A pre-seeded cache entry is out of range, duplicated or over capacity.
  #[error("cannot pre-seed item {item}: {reason}")]
  InvalidSeed { item: ItemId, reason: &'static str },
}

/// Errors raised while serving a single request.
///
/// These are always detected before any state is mutated, so the policy
/// remains usable after returning one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
  #[error("item {item} is outside the library [0, {library_size})")]
  OutOfRange { item: ItemId, library_size: usize },
}

/// The main error type for the `fibre_freshcache` library.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  Request(#[from] RequestError),
}

/// A specialized `Result` type for `fibre_freshcache` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
