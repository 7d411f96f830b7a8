use ahash::AHashMap;

use super::{rank_top_k, Popularity, PopularityEstimator, SlidingWindow};
use crate::error::RequestError;
use crate::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BankEntry {
  /// Index of the first request after the item joined the bank.
  first_seen: u64,
  occurrences: u64,
}

/// Lazy counting that only tracks items which ever reached a frequency
/// shortlist.
///
/// The shortlist is the top-`k` of an internal [`SlidingWindow`]. Once an
/// item joins the counter bank at request index `t0`, its probability is the
/// rate of *additional* occurrences since then:
/// `(count − 1) / (current_index + 1 − t0)`. Items outside the bank have
/// probability `0.0`.
#[derive(Debug, Clone)]
pub struct LiteCounter {
  shortlist: SlidingWindow,
  bank: AHashMap<ItemId, BankEntry>,
  // Number of requests processed so far; the current request index is one less.
  processed: u64,
}

impl LiteCounter {
  /// Creates a counter whose shortlist is fed by `shortlist`.
  pub fn new(shortlist: SlidingWindow) -> Self {
    Self {
      shortlist,
      bank: AHashMap::new(),
      processed: 0,
    }
  }

  /// Whether `item` is in the counter bank.
  #[inline]
  pub fn is_tracked(&self, item: ItemId) -> bool {
    self.bank.contains_key(&item)
  }

  /// Adds `item` to the counter bank as of the next request, if absent.
  pub fn register(&mut self, item: ItemId) {
    let first_seen = self.processed;
    self.bank.entry(item).or_insert(BankEntry {
      first_seen,
      occurrences: 1,
    });
  }

  /// The number of requests processed so far.
  #[inline]
  pub fn processed(&self) -> u64 {
    self.processed
  }

  pub fn shortlist(&self) -> &SlidingWindow {
    &self.shortlist
  }

  /// The `k` tracked items with the highest estimated probability, skipping
  /// `exclude`. Before any request has been processed this is simply the
  /// bank contents.
  pub fn top_k(&self, k: usize, exclude: &[ItemId]) -> Vec<ItemId> {
    let scores = self
      .bank
      .keys()
      .filter(|item| !exclude.contains(item))
      .map(|&item| (item, self.probability(item)));
    rank_top_k(scores, k)
  }
}

impl PopularityEstimator for LiteCounter {
  fn update(&mut self, item: ItemId) -> Result<(), RequestError> {
    self.shortlist.update(item)?;
    let next_index = self.processed + 1;

    if let Some(entry) = self.bank.get_mut(&item) {
      entry.occurrences += 1;
    }
    for candidate in self.shortlist.top_k() {
      self.bank.entry(candidate).or_insert_with(|| {
        tracing::trace!(item = candidate, first_seen = next_index, "shortlisted");
        BankEntry {
          first_seen: next_index,
          occurrences: 1,
        }
      });
    }

    self.processed = next_index;
    Ok(())
  }

  fn probability(&self, item: ItemId) -> f64 {
    match self.bank.get(&item) {
      Some(entry) if entry.first_seen < self.processed => {
        (entry.occurrences - 1) as f64 / (self.processed - entry.first_seen) as f64
      }
      _ => 0.0,
    }
  }

  fn distribution(&self) -> Popularity {
    Popularity::Sparse(
      self
        .bank
        .keys()
        .map(|&item| (item, self.probability(item)))
        .collect(),
    )
  }

  fn counters_used(&self) -> usize {
    self.bank.len()
  }
}
