use std::collections::VecDeque;

use ahash::AHashMap;
use rand::Rng;

use super::{rank_top_k, Popularity, PopularityEstimator};
use crate::error::{BuildError, RequestError};
use crate::rng::SimRng;
use crate::ItemId;

/// Frequency counting over the last `W` observations.
///
/// Each update pushes the new item and drops the oldest once the window is
/// full, adjusting a frequency map in O(1). With freshness weighting, every
/// occurrence of item `i` counts `F_i / W` instead of `1`.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
  library_size: usize,
  window: usize,
  top: usize,
  queue: VecDeque<ItemId>,
  // Occurrence counts; the weight of an item is `count * weight_of(item)`.
  counts: AHashMap<ItemId, u32>,
  weights: Option<Vec<f64>>,
}

impl SlidingWindow {
  /// The default window length `⌊k² · ln L⌋`, at least one.
  pub fn default_window(top: usize, library_size: usize) -> usize {
    let window = (top * top) as f64 * (library_size as f64).ln();
    (window as usize).max(1)
  }

  /// Creates an empty window that ranks the `top` most frequent items.
  pub fn new(library_size: usize, top: usize, window: Option<usize>) -> Result<Self, BuildError> {
    if library_size == 0 {
      return Err(BuildError::EmptyLibrary);
    }
    if top == 0 {
      return Err(BuildError::ZeroCapacity);
    }
    let window = window.unwrap_or_else(|| Self::default_window(top, library_size));
    if window == 0 {
      return Err(BuildError::InvalidValue {
        field: "window",
        message: "window length cannot be zero".into(),
      });
    }
    Ok(Self {
      library_size,
      window,
      top,
      queue: VecDeque::with_capacity(window),
      counts: AHashMap::new(),
      weights: None,
    })
  }

  /// Weights every occurrence of item `i` by `F_i / W`.
  ///
  /// Must be applied before the window is filled.
  pub fn weighted(mut self, freshness: &[f64]) -> Result<Self, BuildError> {
    if freshness.len() != self.library_size {
      return Err(BuildError::LengthMismatch {
        field: "freshness",
        expected: self.library_size,
        actual: freshness.len(),
      });
    }
    let window = self.window as f64;
    self.weights = Some(freshness.iter().map(|f| f / window).collect());
    Ok(self)
  }

  /// Fills the window with `W` uniformly random items.
  pub fn prefilled(mut self, rng: &mut SimRng) -> Self {
    self.queue.clear();
    self.counts.clear();
    for _ in 0..self.window {
      let item = rng.random_range(0..self.library_size);
      self.queue.push_front(item);
      *self.counts.entry(item).or_insert(0) += 1;
    }
    self
  }

  /// The window length `W`.
  #[inline]
  pub fn window(&self) -> usize {
    self.window
  }

  /// The number of observations currently held (at most `W`).
  #[inline]
  pub fn len(&self) -> usize {
    self.queue.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.queue.is_empty()
  }

  #[inline]
  fn weight_of(&self, item: ItemId) -> f64 {
    self.weights.as_ref().map_or(1.0, |w| w[item])
  }

  /// The accumulated (possibly freshness-weighted) frequency of `item`.
  pub fn frequency(&self, item: ItemId) -> f64 {
    self
      .counts
      .get(&item)
      .map_or(0.0, |&count| count as f64 * self.weight_of(item))
  }

  fn total_frequency(&self) -> f64 {
    self.counts.keys().map(|&item| self.frequency(item)).sum()
  }

  /// The `k` items with the highest window frequency.
  pub fn top_k(&self) -> Vec<ItemId> {
    rank_top_k(self.counts.keys().map(|&item| (item, self.frequency(item))), self.top)
  }

  fn forget(&mut self, item: ItemId) {
    if let Some(count) = self.counts.get_mut(&item) {
      if *count <= 1 {
        self.counts.remove(&item);
      } else {
        *count -= 1;
      }
    }
  }
}

impl PopularityEstimator for SlidingWindow {
  fn update(&mut self, item: ItemId) -> Result<(), RequestError> {
    if item >= self.library_size {
      return Err(RequestError::OutOfRange {
        item,
        library_size: self.library_size,
      });
    }

    self.queue.push_front(item);
    if self.queue.len() > self.window {
      if let Some(oldest) = self.queue.pop_back() {
        self.forget(oldest);
      }
    }
    *self.counts.entry(item).or_insert(0) += 1;
    Ok(())
  }

  fn probability(&self, item: ItemId) -> f64 {
    let total = self.total_frequency();
    if total <= 0.0 {
      return 0.0;
    }
    self.frequency(item) / total
  }

  fn distribution(&self) -> Popularity {
    let total = self.total_frequency();
    if total <= 0.0 {
      return Popularity::Sparse(AHashMap::new());
    }
    Popularity::Sparse(
      self
        .counts
        .keys()
        .map(|&item| (item, self.frequency(item) / total))
        .collect(),
    )
  }

  fn counters_used(&self) -> usize {
    self.counts.len()
  }
}
