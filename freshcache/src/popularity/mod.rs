//! Streaming estimators of per-item request probability.
//!
//! Every estimator follows the same contract: items that have not been
//! observed (or, for the sparse variants, not yet tracked) have probability
//! `0.0`. There is no separate "unknown" state.

pub mod exact;
pub mod lite;
pub mod sketch;
pub mod window;

pub use exact::ExactCounter;
pub use lite::LiteCounter;
pub use sketch::{CountSketch, SketchCache};
pub use window::SlidingWindow;

use ahash::AHashMap;

use crate::error::RequestError;
use crate::ItemId;

/// An estimate of each item's request probability.
#[derive(Debug, Clone, PartialEq)]
pub enum Popularity {
  /// One probability per library item.
  Dense(Vec<f64>),
  /// Probabilities for the tracked support only; every other item is `0.0`.
  Sparse(AHashMap<ItemId, f64>),
}

impl Popularity {
  /// The estimated probability of `item`, `0.0` when untracked.
  pub fn get(&self, item: ItemId) -> f64 {
    match self {
      Popularity::Dense(probs) => probs.get(item).copied().unwrap_or(0.0),
      Popularity::Sparse(probs) => probs.get(&item).copied().unwrap_or(0.0),
    }
  }

  /// The number of items with an explicit entry.
  pub fn support(&self) -> usize {
    match self {
      Popularity::Dense(probs) => probs.len(),
      Popularity::Sparse(probs) => probs.len(),
    }
  }

  /// Expands the estimate into one probability per library item.
  pub fn to_dense(&self, library_size: usize) -> Vec<f64> {
    match self {
      Popularity::Dense(probs) => {
        let mut dense = probs.clone();
        dense.resize(library_size, 0.0);
        dense
      }
      Popularity::Sparse(probs) => {
        let mut dense = vec![0.0; library_size];
        for (&item, &p) in probs {
          if item < library_size {
            dense[item] = p;
          }
        }
        dense
      }
    }
  }
}

/// A trait for request-stream popularity estimators.
pub trait PopularityEstimator {
  /// Records one observation of `item`.
  fn update(&mut self, item: ItemId) -> Result<(), RequestError>;

  /// The current probability estimate for `item`.
  fn probability(&self, item: ItemId) -> f64;

  /// The full current estimate.
  fn distribution(&self) -> Popularity;

  /// The number of counters the estimator currently holds.
  fn counters_used(&self) -> usize;
}

/// Returns up to `k` items ranked by descending score.
///
/// Ties are broken by ascending item id so rankings are reproducible
/// regardless of hash-map iteration order.
pub(crate) fn rank_top_k<I>(scores: I, k: usize) -> Vec<ItemId>
where
  I: IntoIterator<Item = (ItemId, f64)>,
{
  let mut ranked: Vec<(ItemId, f64)> = scores.into_iter().collect();
  ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
  ranked.truncate(k);
  ranked.into_iter().map(|(item, _)| item).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unobserved_items_are_zero() {
    let dense = Popularity::Dense(vec![0.5, 0.5]);
    assert_eq!(dense.get(9), 0.0);

    let mut map = AHashMap::new();
    map.insert(3, 1.0);
    let sparse = Popularity::Sparse(map);
    assert_eq!(sparse.get(3), 1.0);
    assert_eq!(sparse.get(0), 0.0);
    assert_eq!(sparse.to_dense(5), vec![0.0, 0.0, 0.0, 1.0, 0.0]);
  }

  #[test]
  fn test_rank_top_k_breaks_ties_by_id() {
    let ranked = rank_top_k([(4, 1.0), (2, 3.0), (1, 1.0), (0, 0.5)], 3);
    assert_eq!(ranked, vec![2, 1, 4]);
  }
}
