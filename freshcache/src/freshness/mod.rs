//! Freshness-constrained caches.
//!
//! A cached copy of item `i` fetched at `fetch_time` may serve requests up
//! to `fetch_time + F_i`; after that it must be refreshed. When the cache is
//! full, items are ranked by their remaining value
//! `p_i · (fetch_time_i + F_i − now)`, and a new item is worth `p_i · F_i`.

pub mod single;
pub mod tandem;

pub use single::{FreshnessCache, Outcome};
pub use tandem::{TandemAction, TandemFreshnessCache, TandemOutcome, Tier};

use ahash::AHashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{BuildError, RequestError};
use crate::library::{self, Library};
use crate::popularity::{ExactCounter, LiteCounter, Popularity, PopularityEstimator};
use crate::ItemId;

/// Which popularity estimate drives a freshness cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EstimatorKind {
  /// A fixed popularity vector supplied at construction.
  Given,
  /// Exact counting over the whole request stream.
  #[default]
  Exact,
  /// Lazy counting of shortlisted items only.
  Lite,
}

/// The popularity estimate owned by a freshness cache.
#[derive(Debug, Clone)]
pub enum PopularityModel {
  Given(Vec<f64>),
  Exact(ExactCounter),
  Lite(LiteCounter),
}

impl PopularityModel {
  pub fn given(popularity: Vec<f64>, library_size: usize) -> Result<Self, BuildError> {
    library::validate_popularity(&popularity, library_size)?;
    Ok(Self::Given(popularity))
  }

  pub fn kind(&self) -> EstimatorKind {
    match self {
      PopularityModel::Given(_) => EstimatorKind::Given,
      PopularityModel::Exact(_) => EstimatorKind::Exact,
      PopularityModel::Lite(_) => EstimatorKind::Lite,
    }
  }

  pub(crate) fn observe(&mut self, item: ItemId) -> Result<(), RequestError> {
    match self {
      PopularityModel::Given(_) => Ok(()),
      PopularityModel::Exact(counter) => counter.update(item),
      PopularityModel::Lite(counter) => counter.update(item),
    }
  }

  pub fn probability(&self, item: ItemId) -> f64 {
    match self {
      PopularityModel::Given(probs) => probs.get(item).copied().unwrap_or(0.0),
      PopularityModel::Exact(counter) => counter.probability(item),
      PopularityModel::Lite(counter) => counter.probability(item),
    }
  }

  pub fn distribution(&self) -> Popularity {
    match self {
      PopularityModel::Given(probs) => Popularity::Dense(probs.clone()),
      PopularityModel::Exact(counter) => counter.distribution(),
      PopularityModel::Lite(counter) => counter.distribution(),
    }
  }

  pub fn counters_used(&self) -> usize {
    match self {
      PopularityModel::Given(probs) => probs.len(),
      PopularityModel::Exact(counter) => counter.counters_used(),
      PopularityModel::Lite(counter) => counter.counters_used(),
    }
  }

  /// Starts tracking an item admitted into spare capacity.
  pub(crate) fn register(&mut self, item: ItemId) {
    if let PopularityModel::Lite(counter) = self {
      if !counter.is_tracked(item) {
        counter.register(item);
      }
    }
  }

  /// Lite counting only contests a full cache on behalf of items it tracks;
  /// every other estimator always does.
  pub(crate) fn may_contest(&self, item: ItemId) -> bool {
    match self {
      PopularityModel::Lite(counter) => counter.is_tracked(item),
      _ => true,
    }
  }
}

/// Cached items and the time each was last fetched.
#[derive(Debug, Clone, Default)]
pub(crate) struct FetchTimes {
  entries: AHashMap<ItemId, f64>,
}

impl FetchTimes {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  #[inline]
  pub(crate) fn get(&self, item: ItemId) -> Option<f64> {
    self.entries.get(&item).copied()
  }

  #[inline]
  pub(crate) fn contains(&self, item: ItemId) -> bool {
    self.entries.contains_key(&item)
  }

  pub(crate) fn insert(&mut self, item: ItemId, fetch_time: f64) {
    self.entries.insert(item, fetch_time);
  }

  pub(crate) fn remove(&mut self, item: ItemId) -> Option<f64> {
    self.entries.remove(&item)
  }

  pub(crate) fn items(&self) -> Vec<ItemId> {
    let mut items: Vec<ItemId> = self.entries.keys().copied().collect();
    items.sort_unstable();
    items
  }

  fn ranked<F>(&self, popularity: &PopularityModel, freshness: &[f64], now: f64, prefer: F) -> Option<(ItemId, f64)>
  where
    F: Fn(f64, f64) -> bool,
  {
    let mut best: Option<(ItemId, f64)> = None;
    for (&item, &fetch_time) in &self.entries {
      let value = remaining_value(popularity.probability(item), fetch_time, freshness[item], now);
      best = match best {
        None => Some((item, value)),
        Some((held, held_value)) => {
          if prefer(value, held_value) || (value == held_value && item < held) {
            Some((item, value))
          } else {
            Some((held, held_value))
          }
        }
      };
    }
    best
  }

  /// The cached item with the lowest remaining value, lowest id on ties.
  pub(crate) fn weakest(&self, popularity: &PopularityModel, freshness: &[f64], now: f64) -> Option<(ItemId, f64)> {
    self.ranked(popularity, freshness, now, |a, b| a < b)
  }

  /// The cached item with the highest remaining value, lowest id on ties.
  pub(crate) fn strongest(&self, popularity: &PopularityModel, freshness: &[f64], now: f64) -> Option<(ItemId, f64)> {
    self.ranked(popularity, freshness, now, |a, b| a > b)
  }
}

/// Popularity-weighted freshness left on a cached copy at `now`.
#[inline]
pub(crate) fn remaining_value(probability: f64, fetch_time: f64, freshness: f64, now: f64) -> f64 {
  probability * (fetch_time + freshness - now)
}

/// The value of admitting a freshly fetched copy.
#[inline]
pub(crate) fn admission_value(probability: f64, freshness: f64) -> f64 {
  probability * freshness
}

/// Extracts the freshness vector a freshness cache needs.
pub(crate) fn require_freshness(library: &Library) -> Result<Vec<f64>, BuildError> {
  library
    .freshness()
    .map(<[f64]>::to_vec)
    .ok_or(BuildError::MissingFreshness)
}

/// Validates pre-seeded `(item, fetch_time)` pairs for one tier.
pub(crate) fn seed_tier(
  store: &mut FetchTimes,
  entries: Vec<(ItemId, f64)>,
  capacity: usize,
  library: &Library,
  other: Option<&FetchTimes>,
) -> Result<(), BuildError> {
  for (item, fetch_time) in entries {
    if library.check(item).is_err() {
      return Err(BuildError::InvalidSeed {
        item,
        reason: "item is outside the library",
      });
    }
    if !fetch_time.is_finite() {
      return Err(BuildError::InvalidSeed {
        item,
        reason: "fetch time must be finite",
      });
    }
    if store.contains(item) || other.is_some_and(|o| o.contains(item)) {
      return Err(BuildError::InvalidSeed {
        item,
        reason: "item is listed twice",
      });
    }
    if store.len() >= capacity {
      return Err(BuildError::InvalidSeed {
        item,
        reason: "cache is already full",
      });
    }
    store.insert(item, fetch_time);
  }
  Ok(())
}
