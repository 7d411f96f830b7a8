//! Joint optimization of cache membership and refresh (check) rates.
//!
//! The average system cost of caching a set `D` refreshed at rates `r` is
//!
//! ```text
//! Cost(D, r) = β·C_f + Σ_{i∈D} [ r_i·C_ch + C_ca·r_i·λ_i/(λ_i + r_i) + β·p_i·(λ_i·C_o/r_i − C_f) ]
//! ```
//!
//! and the bracketed term is item `i`'s marginal cost. An item is worth
//! caching iff its marginal cost is negative.

pub mod minimize;
pub mod per_item;
pub mod shared_rate;

pub use minimize::{MinimizerOptions, Minimum};
pub use per_item::PerItemOptimizer;
pub use shared_rate::{RefreshPlan, SharedRateOptimizer};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// How a full per-item optimizer reacts to a request for an absent item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UpdateRule {
  /// Replace the member with the largest marginal cost if the request's
  /// marginal cost is lower.
  #[default]
  MarginalCost,
  /// Reset the cache to the most popular items, ignoring marginal cost.
  Popularity,
}

/// Reports whether an iterative computation settled within its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Convergence {
  pub iterations: usize,
  pub converged: bool,
}

pub(crate) fn validate_arrival_rate(beta: f64) -> Result<(), BuildError> {
  if beta.is_finite() && beta >= 0.0 {
    Ok(())
  } else {
    Err(BuildError::InvalidValue {
      field: "beta",
      message: format!("arrival rate must be finite and non-negative, got {beta}"),
    })
  }
}

pub(crate) fn validate_cache_size(cache_size: usize, library_size: usize) -> Result<(), BuildError> {
  if cache_size == 0 {
    Err(BuildError::ZeroCapacity)
  } else if cache_size > library_size {
    Err(BuildError::CacheTooLarge {
      cache_size,
      library_size,
    })
  } else {
    Ok(())
  }
}
