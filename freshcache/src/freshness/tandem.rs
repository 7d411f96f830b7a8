use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{admission_value, require_freshness, seed_tier, FetchTimes, PopularityModel};
use crate::error::{BuildError, RequestError};
use crate::library::Library;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::optimizer::validate_cache_size;
use crate::policy::{CachePolicy, MissType, Request};
use crate::popularity::Popularity;
use crate::ItemId;

/// One of the two tiers of a [`TandemFreshnessCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Tier {
  One,
  Two,
}

impl fmt::Display for Tier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Tier::One => write!(f, "tier 1"),
      Tier::Two => write!(f, "tier 2"),
    }
  }
}

/// What a tandem cache did with one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TandemAction {
  /// A fresh copy was served; nothing moved.
  Served,
  /// The item was fetched into spare capacity of the given tier.
  Admitted(Tier),
  /// A stale copy was refreshed where it sat.
  Refreshed(Tier),
  /// A tier-2 item moved up and a tier-1 item moved down, keeping their
  /// fetch times. The refetched side gets the current time.
  Swapped { promoted: ItemId, demoted: ItemId },
  /// The request entered tier 1, the weakest tier-1 item moved down, and the
  /// weakest tier-2 item left the cache.
  Demoted { demoted: ItemId, evicted: ItemId },
  /// The weakest tier-2 item moved up over the weakest tier-1 item, which
  /// left the cache, and the request entered tier 2.
  Promoted { promoted: ItemId, evicted: ItemId },
  /// The request replaced the weakest item of one tier.
  Replaced { tier: Tier, evicted: ItemId },
  /// Neither tier admitted the request; it was served from the origin.
  Rejected,
}

/// The result of serving one request from a [`TandemFreshnessCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TandemOutcome {
  /// Fresh hit flags for tier 1 and tier 2.
  pub hit: [bool; 2],
  /// The request was not satisfied by tier 1 and was passed on to tier 2.
  pub reached_tier2: bool,
  pub miss: Option<MissType>,
  pub action: TandemAction,
}

impl TandemOutcome {
  #[inline]
  pub fn is_hit(&self) -> bool {
    self.hit[0] || self.hit[1]
  }
}

/// Two cooperating freshness caches with promotion and demotion.
///
/// Requests cascade tier 1 → tier 2 → origin. Each tier serves hits and
/// refreshes on its own; items only change tiers when a request cannot be
/// served fresh by a full tier 1, using the same remaining-value ranking as
/// [`FreshnessCache`](super::FreshnessCache). The tiers never share an item.
///
/// The comparisons are not symmetric between the tiers. A stale tier-1 item
/// is weighed against the *most* valuable tier-2 item, whereas a stale tier-2
/// item and an uncached request are weighed against the *least* valuable
/// entries.
#[derive(Debug, Clone)]
pub struct TandemFreshnessCache {
  library: Library,
  freshness: Vec<f64>,
  sizes: [usize; 2],
  popularity: PopularityModel,
  tier1: FetchTimes,
  tier2: FetchTimes,
  metrics: Metrics,
}

impl TandemFreshnessCache {
  /// Creates an empty tandem cache with `tier1_size` and `tier2_size` slots.
  pub fn new(
    library: Library,
    tier1_size: usize,
    tier2_size: usize,
    popularity: PopularityModel,
  ) -> Result<Self, BuildError> {
    validate_cache_size(tier1_size, library.size())?;
    validate_cache_size(tier2_size, library.size())?;
    validate_cache_size(tier1_size + tier2_size, library.size())?;
    let freshness = require_freshness(&library)?;
    Ok(Self {
      library,
      freshness,
      sizes: [tier1_size, tier2_size],
      popularity,
      tier1: FetchTimes::new(),
      tier2: FetchTimes::new(),
      metrics: Metrics::new(),
    })
  }

  /// Pre-seeds both tiers with `(item, fetch_time)` pairs.
  ///
  /// Tier 2 only fills once tier 1 is full, so tier-2 contents are accepted
  /// only alongside a full tier 1.
  pub fn with_contents(mut self, tier1: Vec<(ItemId, f64)>, tier2: Vec<(ItemId, f64)>) -> Result<Self, BuildError> {
    seed_tier(&mut self.tier1, tier1, self.sizes[0], &self.library, None)?;
    if let Some(&(item, _)) = tier2.first() {
      if self.tier1.len() < self.sizes[0] {
        return Err(BuildError::InvalidSeed {
          item,
          reason: "tier 2 can only be seeded behind a full tier 1",
        });
      }
    }
    seed_tier(&mut self.tier2, tier2, self.sizes[1], &self.library, Some(&self.tier1))?;
    for item in self.tier1.items().into_iter().chain(self.tier2.items()) {
      self.popularity.register(item);
    }
    Ok(self)
  }

  #[inline]
  pub fn capacity(&self, tier: Tier) -> usize {
    match tier {
      Tier::One => self.sizes[0],
      Tier::Two => self.sizes[1],
    }
  }

  /// Contents of one tier in ascending item order.
  pub fn tier(&self, tier: Tier) -> Vec<ItemId> {
    self.store(tier).items()
  }

  /// Which tier holds `item`, if any.
  pub fn locate(&self, item: ItemId) -> Option<Tier> {
    if self.tier1.contains(item) {
      Some(Tier::One)
    } else if self.tier2.contains(item) {
      Some(Tier::Two)
    } else {
      None
    }
  }

  pub fn fetch_time(&self, item: ItemId) -> Option<f64> {
    self.tier1.get(item).or_else(|| self.tier2.get(item))
  }

  pub fn popularity(&self) -> Popularity {
    self.popularity.distribution()
  }

  pub fn counters_used(&self) -> usize {
    self.popularity.counters_used()
  }

  fn store(&self, tier: Tier) -> &FetchTimes {
    match tier {
      Tier::One => &self.tier1,
      Tier::Two => &self.tier2,
    }
  }

  #[inline]
  fn is_fresh(&self, fetched: f64, item: ItemId, now: f64) -> bool {
    fetched + self.freshness[item] >= now
  }

  fn candidate_value(&self, item: ItemId) -> f64 {
    admission_value(self.popularity.probability(item), self.freshness[item])
  }

  /// A stale tier-1 item either swaps with the most valuable tier-2 item or
  /// is refreshed in place.
  fn refresh_tier1(&mut self, item: ItemId, now: f64) -> TandemAction {
    let candidate = self.candidate_value(item);
    if let Some((best, best_value)) = self.tier2.strongest(&self.popularity, &self.freshness, now) {
      if candidate < best_value {
        if let Some(fetched) = self.tier2.remove(best) {
          self.tier1.insert(best, fetched);
        }
        self.tier1.remove(item);
        self.tier2.insert(item, now);
        tracing::debug!(promoted = best, demoted = item, candidate, best_value, "stale tier-1 copy swapped down");
        return TandemAction::Swapped {
          promoted: best,
          demoted: item,
        };
      }
    }
    self.tier1.insert(item, now);
    TandemAction::Refreshed(Tier::One)
  }

  /// A stale tier-2 item either swaps with the least valuable tier-1 item or
  /// is refreshed in place.
  fn refresh_tier2(&mut self, item: ItemId, now: f64) -> TandemAction {
    let candidate = self.candidate_value(item);
    if let Some((weakest, weakest_value)) = self.tier1.weakest(&self.popularity, &self.freshness, now) {
      if candidate > weakest_value {
        if let Some(fetched) = self.tier1.remove(weakest) {
          self.tier2.insert(weakest, fetched);
        }
        self.tier2.remove(item);
        self.tier1.insert(item, now);
        tracing::debug!(promoted = item, demoted = weakest, candidate, weakest_value, "stale tier-2 copy swapped up");
        return TandemAction::Swapped {
          promoted: item,
          demoted: weakest,
        };
      }
    }
    self.tier2.insert(item, now);
    TandemAction::Refreshed(Tier::Two)
  }

  /// An uncached request contests both full tiers at once.
  fn contest(&mut self, item: ItemId, now: f64) -> TandemAction {
    let weakest1 = self.tier1.weakest(&self.popularity, &self.freshness, now);
    let weakest2 = self.tier2.weakest(&self.popularity, &self.freshness, now);
    let (Some((j, vj)), Some((k, vk))) = (weakest1, weakest2) else {
      return TandemAction::Rejected;
    };
    let candidate = self.candidate_value(item);

    let degenerate = candidate == 0.0 && vj == 0.0 && vk == 0.0;

    let action = if candidate > vj {
      if vj >= vk {
        if let Some(fetched) = self.tier1.remove(j) {
          self.tier2.insert(j, fetched);
        }
        self.tier2.remove(k);
        self.tier1.insert(item, now);
        TandemAction::Demoted { demoted: j, evicted: k }
      } else if vk > candidate {
        if let Some(fetched) = self.tier2.remove(k) {
          self.tier1.insert(k, fetched);
        }
        self.tier1.remove(j);
        self.tier2.insert(item, now);
        TandemAction::Promoted { promoted: k, evicted: j }
      } else {
        self.tier1.remove(j);
        self.tier1.insert(item, now);
        TandemAction::Replaced {
          tier: Tier::One,
          evicted: j,
        }
      }
    } else if candidate >= vk {
      self.tier2.remove(k);
      self.tier2.insert(item, now);
      TandemAction::Replaced {
        tier: Tier::Two,
        evicted: k,
      }
    } else {
      TandemAction::Rejected
    };

    if degenerate {
      self.metrics.degenerate_states += 1;
      tracing::warn!(item, ?action, "no popularity signal yet; every value is zero");
    }
    tracing::debug!(item, candidate, tier1_min = vj, tier2_min = vk, ?action, "contested both tiers");
    action
  }

  fn serve(&mut self, item: ItemId, now: f64) -> TandemOutcome {
    let mut outcome = TandemOutcome {
      hit: [false, false],
      reached_tier2: false,
      miss: None,
      action: TandemAction::Served,
    };

    if self.tier1.len() < self.sizes[0] {
      let held = self.tier1.contains(item);
      self.popularity.register(item);
      self.tier1.insert(item, now);
      outcome.miss = Some(MissType::FreshnessAdmit);
      outcome.action = if held {
        TandemAction::Refreshed(Tier::One)
      } else {
        TandemAction::Admitted(Tier::One)
      };
      return outcome;
    }

    if let Some(fetched) = self.tier1.get(item) {
      if self.is_fresh(fetched, item, now) {
        outcome.hit[0] = true;
      } else {
        outcome.miss = Some(MissType::StaleRefresh);
        outcome.action = self.refresh_tier1(item, now);
      }
      return outcome;
    }

    outcome.reached_tier2 = true;

    if self.tier2.len() < self.sizes[1] {
      let held = self.tier2.contains(item);
      self.popularity.register(item);
      self.tier2.insert(item, now);
      outcome.miss = Some(MissType::FreshnessAdmit);
      outcome.action = if held {
        TandemAction::Refreshed(Tier::Two)
      } else {
        TandemAction::Admitted(Tier::Two)
      };
      return outcome;
    }

    if let Some(fetched) = self.tier2.get(item) {
      if self.is_fresh(fetched, item, now) {
        outcome.hit[1] = true;
      } else {
        outcome.miss = Some(MissType::StaleRefresh);
        outcome.action = self.refresh_tier2(item, now);
      }
      return outcome;
    }

    outcome.miss = Some(MissType::NotCached);
    outcome.action = if self.popularity.may_contest(item) {
      self.contest(item, now)
    } else {
      TandemAction::Rejected
    };
    outcome
  }

  fn record(&mut self, outcome: &TandemOutcome) {
    let metrics = &mut self.metrics;
    metrics.requests += 1;
    if outcome.hit[0] {
      metrics.hits += 1;
    }
    if outcome.hit[1] {
      metrics.tier2_hits += 1;
    }
    if let Some(miss) = outcome.miss {
      metrics.record_miss(miss);
    }
    if outcome.reached_tier2 {
      metrics.tier2_passes += 1;
    }
    match outcome.action {
      TandemAction::Served | TandemAction::Refreshed(_) => {}
      TandemAction::Admitted(_) => metrics.admissions += 1,
      TandemAction::Swapped { .. } => {
        metrics.promotions += 1;
        metrics.demotions += 1;
      }
      TandemAction::Demoted { .. } => {
        metrics.admissions += 1;
        metrics.demotions += 1;
        metrics.evictions += 1;
      }
      TandemAction::Promoted { .. } => {
        metrics.admissions += 1;
        metrics.promotions += 1;
        metrics.evictions += 1;
      }
      TandemAction::Replaced { .. } => {
        metrics.admissions += 1;
        metrics.evictions += 1;
      }
      TandemAction::Rejected => metrics.rejections += 1,
    }
  }
}

impl CachePolicy for TandemFreshnessCache {
  type Outcome = TandemOutcome;

  fn update(&mut self, request: Request) -> Result<TandemOutcome, RequestError> {
    let Request { item, time } = request;
    self.library.check(item)?;
    self.popularity.observe(item)?;

    let outcome = self.serve(item, time + 1.0);
    debug_assert!(self.tier1.len() <= self.sizes[0]);
    debug_assert!(self.tier2.len() <= self.sizes[1]);
    debug_assert!(!(self.tier1.contains(item) && self.tier2.contains(item)));
    self.record(&outcome);
    Ok(outcome)
  }

  /// Both tiers together, ascending.
  fn currcache(&self) -> Vec<ItemId> {
    let mut items = self.tier1.items();
    items.extend(self.tier2.items());
    items.sort_unstable();
    items
  }

  fn probability(&self, item: ItemId) -> f64 {
    self.popularity.probability(item)
  }

  fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }
}
