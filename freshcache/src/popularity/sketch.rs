use super::{Popularity, PopularityEstimator};
use crate::error::{BuildError, RequestError};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::policy::{Admission, CachePolicy, Request};
use crate::rng::{self, SimRng};
use crate::ItemId;

/// A count sketch: an `l × b` matrix of signed counters.
///
/// Each row hashes an item to one bucket and a ±1 sign. An update adds the
/// sign to the item's bucket in every row; the estimate is the median over
/// rows of `bucket × sign`. Memory is `l · b` regardless of library size.
#[derive(Debug, Clone)]
pub struct CountSketch {
  library_size: usize,
  buckets: usize,
  counters: Vec<Vec<i64>>,
  hashers: Vec<ahash::RandomState>,
  total: u64,
}

impl CountSketch {
  /// Creates a sketch with `rows` hash/sign pairs drawn from `rng`.
  pub fn new(library_size: usize, rows: usize, buckets: usize, rng: &mut SimRng) -> Result<Self, BuildError> {
    if library_size == 0 {
      return Err(BuildError::EmptyLibrary);
    }
    if rows == 0 || buckets == 0 {
      return Err(BuildError::InvalidValue {
        field: if rows == 0 { "sketch_rows" } else { "sketch_buckets" },
        message: "sketch dimensions must be positive".into(),
      });
    }
    Ok(Self {
      library_size,
      buckets,
      counters: vec![vec![0; buckets]; rows],
      hashers: (0..rows).map(|_| rng::hash_seeds(rng)).collect(),
      total: 0,
    })
  }

  #[inline]
  pub fn rows(&self) -> usize {
    self.counters.len()
  }

  #[inline]
  pub fn buckets(&self) -> usize {
    self.buckets
  }

  #[inline]
  fn locate(&self, row: usize, item: ItemId) -> (usize, i64) {
    let hash = self.hashers[row].hash_one(item);
    let bucket = (hash % self.buckets as u64) as usize;
    let sign = if hash >> 63 == 0 { 1 } else { -1 };
    (bucket, sign)
  }

  /// The median over rows of the item's signed bucket value.
  pub fn estimate(&self, item: ItemId) -> f64 {
    let mut votes: Vec<i64> = (0..self.rows())
      .map(|row| {
        let (bucket, sign) = self.locate(row, item);
        self.counters[row][bucket] * sign
      })
      .collect();
    votes.sort_unstable();

    let mid = votes.len() / 2;
    if votes.len() % 2 == 1 {
      votes[mid] as f64
    } else {
      (votes[mid - 1] + votes[mid]) as f64 / 2.0
    }
  }
}

impl PopularityEstimator for CountSketch {
  fn update(&mut self, item: ItemId) -> Result<(), RequestError> {
    if item >= self.library_size {
      return Err(RequestError::OutOfRange {
        item,
        library_size: self.library_size,
      });
    }
    for row in 0..self.rows() {
      let (bucket, sign) = self.locate(row, item);
      self.counters[row][bucket] += sign;
    }
    self.total += 1;
    Ok(())
  }

  /// The estimated count over the number of updates, clamped at zero.
  fn probability(&self, item: ItemId) -> f64 {
    if self.total == 0 {
      return 0.0;
    }
    (self.estimate(item) / self.total as f64).max(0.0)
  }

  /// Estimates every library item; intended for diagnostics only.
  fn distribution(&self) -> Popularity {
    Popularity::Dense((0..self.library_size).map(|item| self.probability(item)).collect())
  }

  fn counters_used(&self) -> usize {
    self.rows() * self.buckets
  }
}

/// A small cache ranked by count-sketch estimates.
///
/// The first `capacity` distinct arrivals are admitted; the builder sizes
/// the cache to the sketch's bucket count `b` by default. After that, a new
/// arrival replaces the member with the lowest estimate only if its own
/// estimate is strictly higher.
#[derive(Debug, Clone)]
pub struct SketchCache {
  sketch: CountSketch,
  members: Vec<ItemId>,
  capacity: usize,
  metrics: Metrics,
}

impl SketchCache {
  pub fn new(sketch: CountSketch, capacity: usize) -> Result<Self, BuildError> {
    if capacity == 0 {
      return Err(BuildError::ZeroCapacity);
    }
    if capacity > sketch.library_size {
      return Err(BuildError::CacheTooLarge {
        cache_size: capacity,
        library_size: sketch.library_size,
      });
    }
    Ok(Self {
      sketch,
      members: Vec::with_capacity(capacity),
      capacity,
      metrics: Metrics::new(),
    })
  }

  pub fn sketch(&self) -> &CountSketch {
    &self.sketch
  }

  #[inline]
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// The member with the lowest estimate, first in admission order on ties.
  fn weakest_member(&self) -> Option<(usize, f64)> {
    let mut weakest: Option<(usize, f64)> = None;
    for (slot, &item) in self.members.iter().enumerate() {
      let estimate = self.sketch.estimate(item);
      if weakest.map_or(true, |(_, lowest)| estimate < lowest) {
        weakest = Some((slot, estimate));
      }
    }
    weakest
  }
}

impl CachePolicy for SketchCache {
  type Outcome = Admission;

  fn update(&mut self, request: Request) -> Result<Admission, RequestError> {
    let item = request.item;
    self.sketch.update(item)?;
    self.metrics.requests += 1;

    if self.members.contains(&item) {
      self.metrics.hits += 1;
      return Ok(Admission::HIT);
    }
    self.metrics.not_cached += 1;

    if self.members.len() < self.capacity {
      self.members.push(item);
      self.metrics.admissions += 1;
      return Ok(Admission::admitted(None));
    }

    let estimate = self.sketch.estimate(item);
    match self.weakest_member() {
      Some((slot, lowest)) if estimate > lowest => {
        let evicted = std::mem::replace(&mut self.members[slot], item);
        tracing::debug!(item, evicted, estimate, lowest, "sketch cache replaced member");
        self.metrics.admissions += 1;
        self.metrics.evictions += 1;
        Ok(Admission::admitted(Some(evicted)))
      }
      _ => {
        self.metrics.rejections += 1;
        Ok(Admission::REJECTED)
      }
    }
  }

  fn currcache(&self) -> Vec<ItemId> {
    let mut items = self.members.clone();
    items.sort_unstable();
    items
  }

  fn probability(&self, item: ItemId) -> f64 {
    self.sketch.probability(item)
  }

  fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }
}
