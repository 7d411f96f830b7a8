use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::policy::MissType;

/// Counters owned by a single policy instance.
///
/// Policies are driven by one caller in request order, so these are plain
/// integers rather than atomics.
#[derive(Debug, Default, Clone)]
pub(crate) struct Metrics {
  // --- Hit/Miss Ratios ---
  pub(crate) requests: u64,
  pub(crate) hits: u64,
  pub(crate) tier2_hits: u64,
  pub(crate) freshness_admits: u64,
  pub(crate) stale_refreshes: u64,
  pub(crate) not_cached: u64,

  // --- Admission ---
  pub(crate) admissions: u64,
  pub(crate) rejections: u64,
  pub(crate) evictions: u64,

  // --- Tier movement ---
  pub(crate) promotions: u64,
  pub(crate) demotions: u64,
  pub(crate) tier2_passes: u64,

  pub(crate) degenerate_states: u64,
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn record_miss(&mut self, miss: MissType) {
    match miss {
      MissType::FreshnessAdmit => self.freshness_admits += 1,
      MissType::StaleRefresh => self.stale_refreshes += 1,
      MissType::NotCached => self.not_cached += 1,
    }
  }

  /// Creates a point-in-time snapshot of the current counters.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    MetricsSnapshot {
      requests: self.requests,
      hits: self.hits,
      tier2_hits: self.tier2_hits,
      misses: self.requests - self.hits - self.tier2_hits,
      freshness_admits: self.freshness_admits,
      stale_refreshes: self.stale_refreshes,
      not_cached: self.not_cached,
      admissions: self.admissions,
      rejections: self.rejections,
      evictions: self.evictions,
      promotions: self.promotions,
      demotions: self.demotions,
      tier2_passes: self.tier2_passes,
      degenerate_states: self.degenerate_states,
    }
  }
}

/// A point-in-time, public-facing snapshot of a policy's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricsSnapshot {
  /// The number of requests served.
  pub requests: u64,
  /// Requests served fresh from the cache (tier 1 for tandem caches).
  pub hits: u64,
  /// Requests served fresh from tier 2 of a tandem cache.
  pub tier2_hits: u64,
  /// Requests that had to go to the origin.
  pub misses: u64,
  /// Misses where the item was admitted into spare capacity.
  pub freshness_admits: u64,
  /// Misses where a cached copy had exceeded its freshness budget.
  pub stale_refreshes: u64,
  /// Misses where the item was not cached at all.
  pub not_cached: u64,
  /// Items that entered the cache (or tier 1 or tier 2) as new members.
  pub admissions: u64,
  /// Items that lost the admission comparison and were served uncached.
  pub rejections: u64,
  /// Items removed from the cache (or from both tiers).
  pub evictions: u64,
  /// Items moved from tier 2 to tier 1.
  pub promotions: u64,
  /// Items moved from tier 1 to tier 2.
  pub demotions: u64,
  /// Requests that were not satisfied by tier 1 and reached tier 2.
  pub tier2_passes: u64,
  /// Computations that fell back to a default because there was no data yet.
  pub degenerate_states: u64,
}

impl MetricsSnapshot {
  /// The cache hit ratio over all tiers (hits / requests).
  pub fn hit_ratio(&self) -> f64 {
    if self.requests == 0 {
      0.0
    } else {
      (self.hits + self.tier2_hits) as f64 / self.requests as f64
    }
  }
}

impl fmt::Display for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "requests: {}", self.requests)?;
    writeln!(f, "  hits: {} (tier 2: {})", self.hits, self.tier2_hits)?;
    writeln!(f, "  hit ratio: {:.4}", self.hit_ratio())?;
    writeln!(
      f,
      "  misses: {} (admit: {}, stale: {}, not cached: {})",
      self.misses, self.freshness_admits, self.stale_refreshes, self.not_cached
    )?;
    writeln!(
      f,
      "  admissions: {}, rejections: {}, evictions: {}",
      self.admissions, self.rejections, self.evictions
    )?;
    write!(
      f,
      "  promotions: {}, demotions: {}, tier 2 passes: {}",
      self.promotions, self.demotions, self.tier2_passes
    )
  }
}
