use super::{rank_top_k, Popularity, PopularityEstimator};
use crate::error::{BuildError, RequestError};
use crate::ItemId;

/// Exact per-item request counting: `p_i = count_i / Σ count`.
///
/// Before the first observation every item has probability `0.0`.
#[derive(Debug, Clone)]
pub struct ExactCounter {
  counts: Vec<u64>,
  total: u64,
}

impl ExactCounter {
  pub fn new(library_size: usize) -> Result<Self, BuildError> {
    if library_size == 0 {
      return Err(BuildError::EmptyLibrary);
    }
    Ok(Self {
      counts: vec![0; library_size],
      total: 0,
    })
  }

  #[inline]
  pub fn count(&self, item: ItemId) -> u64 {
    self.counts.get(item).copied().unwrap_or(0)
  }

  #[inline]
  pub fn total(&self) -> u64 {
    self.total
  }

  /// Returns the `k` most frequently observed items, skipping `exclude`.
  pub fn top_k(&self, k: usize, exclude: &[ItemId]) -> Vec<ItemId> {
    let scores = self
      .counts
      .iter()
      .enumerate()
      .filter(|(item, _)| !exclude.contains(item))
      .map(|(item, &count)| (item, count as f64));
    rank_top_k(scores, k)
  }
}

impl PopularityEstimator for ExactCounter {
  fn update(&mut self, item: ItemId) -> Result<(), RequestError> {
    match self.counts.get_mut(item) {
      Some(count) => {
        *count += 1;
        self.total += 1;
        Ok(())
      }
      None => Err(RequestError::OutOfRange {
        item,
        library_size: self.counts.len(),
      }),
    }
  }

  fn probability(&self, item: ItemId) -> f64 {
    if self.total == 0 {
      return 0.0;
    }
    self.count(item) as f64 / self.total as f64
  }

  fn distribution(&self) -> Popularity {
    if self.total == 0 {
      tracing::warn!("popularity requested before any observation; reporting all zeros");
      return Popularity::Dense(vec![0.0; self.counts.len()]);
    }
    let total = self.total as f64;
    Popularity::Dense(self.counts.iter().map(|&c| c as f64 / total).collect())
  }

  fn counters_used(&self) -> usize {
    self.counts.iter().filter(|&&c| c > 0).count()
  }
}
