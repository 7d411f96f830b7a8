#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{admission_value, remaining_value, require_freshness, seed_tier, FetchTimes, PopularityModel};
use crate::error::{BuildError, RequestError};
use crate::library::Library;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::optimizer::validate_cache_size;
use crate::policy::{CachePolicy, MissType, Request};
use crate::popularity::Popularity;
use crate::ItemId;

/// The result of serving one request from a [`FreshnessCache`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Outcome {
  /// The request was served by a fresh cached copy.
  pub hit: bool,
  /// Why the request missed, `None` on a hit.
  pub miss: Option<MissType>,
  /// The item entered the cache on this request.
  pub admitted: bool,
  /// The item evicted to make room, if any.
  pub evicted: Option<ItemId>,
}

impl Outcome {
  const HIT: Outcome = Outcome {
    hit: true,
    miss: None,
    admitted: false,
    evicted: None,
  };

  fn miss(miss: MissType) -> Self {
    Self {
      hit: false,
      miss: Some(miss),
      admitted: false,
      evicted: None,
    }
  }
}

/// A bounded cache of `(item, fetch_time)` pairs under per-item freshness
/// budgets.
///
/// On every request the popularity estimate is updated first. A request
/// then either fills spare capacity, hits a fresh copy, refreshes a stale
/// copy in place, or, when the item is absent from a full cache, contests
/// the entry with the lowest remaining value.
#[derive(Debug, Clone)]
pub struct FreshnessCache {
  library: Library,
  freshness: Vec<f64>,
  cache_size: usize,
  popularity: PopularityModel,
  fetch: FetchTimes,
  metrics: Metrics,
}

impl FreshnessCache {
  /// Creates an empty cache. The library must carry a freshness vector.
  pub fn new(library: Library, cache_size: usize, popularity: PopularityModel) -> Result<Self, BuildError> {
    validate_cache_size(cache_size, library.size())?;
    let freshness = require_freshness(&library)?;
    Ok(Self {
      library,
      freshness,
      cache_size,
      popularity,
      fetch: FetchTimes::new(),
      metrics: Metrics::new(),
    })
  }

  /// Pre-seeds the cache with `(item, fetch_time)` pairs.
  pub fn with_contents(mut self, contents: Vec<(ItemId, f64)>) -> Result<Self, BuildError> {
    seed_tier(&mut self.fetch, contents, self.cache_size, &self.library, None)?;
    for item in self.fetch.items() {
      self.popularity.register(item);
    }
    Ok(self)
  }

  #[inline]
  pub fn capacity(&self) -> usize {
    self.cache_size
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.fetch.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.fetch.is_empty()
  }

  /// When `item`'s cached copy was fetched, if it is cached.
  pub fn fetch_time(&self, item: ItemId) -> Option<f64> {
    self.fetch.get(item)
  }

  /// Whether `item` is cached and still within its freshness budget at `time`.
  pub fn is_fresh(&self, item: ItemId, time: f64) -> bool {
    self
      .fetch
      .get(item)
      .is_some_and(|fetched| fetched + self.freshness[item] >= time)
  }

  /// The remaining value of a cached item at request `time`, `None` if the
  /// item is not cached.
  pub fn value(&self, item: ItemId, time: f64) -> Option<f64> {
    self.fetch.get(item).map(|fetched| {
      remaining_value(
        self.popularity.probability(item),
        fetched,
        self.freshness[item],
        time + 1.0,
      )
    })
  }

  pub fn popularity(&self) -> Popularity {
    self.popularity.distribution()
  }

  pub fn counters_used(&self) -> usize {
    self.popularity.counters_used()
  }

  /// Contest a full cache on behalf of `item`: evict the entry with the
  /// lowest remaining value if `item`'s admission value beats it.
  fn contest(&mut self, item: ItemId, now: f64) -> Outcome {
    let mut outcome = Outcome::miss(MissType::NotCached);
    let Some((victim, victim_value)) = self.fetch.weakest(&self.popularity, &self.freshness, now) else {
      return outcome;
    };
    let p = self.popularity.probability(item);
    let candidate = admission_value(p, self.freshness[item]);

    if p == 0.0 && victim_value == 0.0 {
      self.metrics.degenerate_states += 1;
      tracing::warn!(item, victim, "no popularity signal yet; keeping cache contents");
    }

    if candidate > victim_value {
      self.fetch.remove(victim);
      self.fetch.insert(item, now);
      tracing::debug!(item, victim, candidate, victim_value, "evicted lowest-value entry");
      outcome.admitted = true;
      outcome.evicted = Some(victim);
    } else {
      tracing::debug!(item, victim, candidate, victim_value, "rejected; served from origin");
    }
    outcome
  }

  fn serve(&mut self, item: ItemId, now: f64) -> Outcome {
    if self.fetch.len() < self.cache_size {
      let admitted = !self.fetch.contains(item);
      self.popularity.register(item);
      self.fetch.insert(item, now);
      return Outcome {
        admitted,
        ..Outcome::miss(MissType::FreshnessAdmit)
      };
    }

    if let Some(fetched) = self.fetch.get(item) {
      if fetched + self.freshness[item] >= now {
        return Outcome::HIT;
      }
      self.fetch.insert(item, now);
      return Outcome::miss(MissType::StaleRefresh);
    }

    if self.popularity.may_contest(item) {
      self.contest(item, now)
    } else {
      Outcome::miss(MissType::NotCached)
    }
  }

  fn record(&mut self, outcome: &Outcome) {
    self.metrics.requests += 1;
    match outcome.miss {
      None => self.metrics.hits += 1,
      Some(miss) => self.metrics.record_miss(miss),
    }
    if outcome.admitted {
      self.metrics.admissions += 1;
    } else if outcome.miss == Some(MissType::NotCached) {
      self.metrics.rejections += 1;
    }
    if outcome.evicted.is_some() {
      self.metrics.evictions += 1;
    }
  }
}

impl CachePolicy for FreshnessCache {
  type Outcome = Outcome;

  fn update(&mut self, request: Request) -> Result<Outcome, RequestError> {
    let Request { item, time } = request;
    self.library.check(item)?;
    self.popularity.observe(item)?;

    let outcome = self.serve(item, time + 1.0);
    debug_assert!(self.fetch.len() <= self.cache_size);
    self.record(&outcome);
    Ok(outcome)
  }

  fn currcache(&self) -> Vec<ItemId> {
    self.fetch.items()
  }

  fn probability(&self, item: ItemId) -> f64 {
    self.popularity.probability(item)
  }

  fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::popularity::{ExactCounter, LiteCounter, SlidingWindow};

  fn library(freshness: Vec<f64>) -> Library {
    Library::new(freshness.len(), 1.0, 1.0)
      .unwrap()
      .with_freshness(freshness)
      .unwrap()
  }

  #[test]
  fn test_requires_freshness() {
    let library = Library::new(3, 1.0, 1.0).unwrap();
    let err = FreshnessCache::new(library, 1, PopularityModel::Given(vec![0.2; 3])).unwrap_err();
    assert_eq!(err, BuildError::MissingFreshness);
  }

  #[test]
  fn test_spare_capacity_always_refetches() {
    let mut cache =
      FreshnessCache::new(library(vec![10.0; 3]), 2, PopularityModel::Given(vec![0.3; 3])).unwrap();
    let first = cache.update(Request::new(0, 0.0)).unwrap();
    assert_eq!(first.miss, Some(MissType::FreshnessAdmit));
    assert!(first.admitted);

    // Still under-full: the same item is fetched again rather than hit.
    let again = cache.update(Request::new(0, 1.0)).unwrap();
    assert_eq!(again.miss, Some(MissType::FreshnessAdmit));
    assert!(!again.admitted);
    assert_eq!(cache.fetch_time(0), Some(2.0));
  }

  #[test]
  fn test_stale_copy_is_refreshed_in_place() {
    let mut cache =
      FreshnessCache::new(library(vec![2.0, 2.0]), 1, PopularityModel::Given(vec![0.5, 0.5])).unwrap();
    cache.update(Request::new(0, 0.0)).unwrap(); // fetched at 1
    assert!(cache.update(Request::new(0, 2.0)).unwrap().hit); // 1 + 2 >= 3

    let stale = cache.update(Request::new(0, 3.0)).unwrap(); // 1 + 2 < 4
    assert_eq!(stale.miss, Some(MissType::StaleRefresh));
    assert_eq!(cache.fetch_time(0), Some(4.0));
    assert_eq!(cache.currcache(), vec![0]);
  }

  #[test]
  fn test_exact_counting_drives_eviction() {
    let counter = ExactCounter::new(3).unwrap();
    let mut cache = FreshnessCache::new(library(vec![5.0; 3]), 1, PopularityModel::Exact(counter)).unwrap();
    cache.update(Request::new(0, 0.0)).unwrap();

    // Item 1 seen once vs item 0 once: 1/2 * 5 = 2.5 against 1/2 * (1 + 5 - 2) = 2.0.
    let outcome = cache.update(Request::new(1, 1.0)).unwrap();
    assert_eq!(outcome.evicted, Some(0));
    assert_eq!(cache.currcache(), vec![1]);
  }

  #[test]
  fn test_lite_counting_only_contests_for_tracked_items() {
    let window = SlidingWindow::new(4, 1, Some(3)).unwrap();
    let lite = LiteCounter::new(window);
    let mut cache = FreshnessCache::new(library(vec![5.0; 4]), 1, PopularityModel::Lite(lite)).unwrap();

    cache.update(Request::new(0, 0.0)).unwrap();
    cache.update(Request::new(0, 1.0)).unwrap();
    cache.update(Request::new(0, 2.0)).unwrap();

    // Item 3 never reaches the shortlist, so it never contests the cache.
    let outcome = cache.update(Request::new(3, 3.0)).unwrap();
    assert_eq!(outcome.miss, Some(MissType::NotCached));
    assert!(!outcome.admitted);
    assert_eq!(cache.probability(3), 0.0);
    assert_eq!(cache.currcache(), vec![0]);
  }

  #[test]
  fn test_out_of_range_does_not_mutate() {
    let mut cache = FreshnessCache::new(
      library(vec![1.0; 2]),
      1,
      PopularityModel::Exact(ExactCounter::new(2).unwrap()),
    )
    .unwrap();
    let err = cache.update(Request::new(2, 0.0)).unwrap_err();
    assert_eq!(
      err,
      RequestError::OutOfRange {
        item: 2,
        library_size: 2
      }
    );
    assert!(cache.is_empty());
    assert_eq!(cache.counters_used(), 0);
    assert_eq!(cache.metrics().requests, 0);
  }

  #[test]
  fn test_seeded_contents() {
    let cache = FreshnessCache::new(library(vec![3.0; 3]), 2, PopularityModel::Given(vec![0.2, 0.3, 0.5]))
      .unwrap()
      .with_contents(vec![(2, 0.0), (1, 4.0)])
      .unwrap();
    assert_eq!(cache.currcache(), vec![1, 2]);
    assert!(cache.is_fresh(2, 3.0));
    assert!(!cache.is_fresh(2, 3.5));
    // 0.5 * (0 + 3 - 2)
    assert_eq!(cache.value(2, 1.0), Some(0.5));
  }
}
