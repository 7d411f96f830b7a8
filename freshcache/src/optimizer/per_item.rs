use rand::Rng;

use super::minimize::{self, MinimizerOptions};
use super::{validate_arrival_rate, validate_cache_size, Convergence, UpdateRule};
use crate::cost::CostModel;
use crate::error::{BuildError, RequestError};
use crate::library::{self, Library};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::policy::{Admission, CachePolicy, Request};
use crate::popularity::{rank_top_k, ExactCounter, PopularityEstimator};
use crate::rng::SimRng;
use crate::ItemId;

#[derive(Debug, Clone)]
enum PopularitySource {
  Given(Vec<f64>),
  Counted(ExactCounter),
}

/// Cost minimization with one refresh rate per cached item.
///
/// Each member `i` gets its own rate `r_i ∈ [0, λ_i]`. The cache is driven
/// request by request: it fills unconditionally, and once full an absent
/// request displaces the member with the largest marginal cost whenever the
/// request's own marginal cost is lower (or, under
/// [`UpdateRule::Popularity`], the cache is reset to the most popular items).
///
/// Without a given popularity vector, popularity is counted exactly from
/// the request stream.
#[derive(Debug, Clone)]
pub struct PerItemOptimizer {
  library: Library,
  cost: CostModel,
  beta: f64,
  cache_size: usize,
  rule: UpdateRule,
  options: MinimizerOptions,
  popularity: PopularitySource,
  rates: Vec<f64>,
  members: Vec<ItemId>,
  last_convergence: Option<Convergence>,
  metrics: Metrics,
}

impl PerItemOptimizer {
  /// Creates an optimizer. Initial rates are drawn uniformly from
  /// `[0, λ_i]` using `rng`.
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    library: Library,
    cost: CostModel,
    beta: f64,
    cache_size: usize,
    rule: UpdateRule,
    popularity: Option<Vec<f64>>,
    options: MinimizerOptions,
    rng: &mut SimRng,
  ) -> Result<Self, BuildError> {
    cost.validate()?;
    validate_arrival_rate(beta)?;
    validate_cache_size(cache_size, library.size())?;

    let popularity = match popularity {
      Some(probs) => {
        library::validate_popularity(&probs, library.size())?;
        PopularitySource::Given(probs)
      }
      None => PopularitySource::Counted(ExactCounter::new(library.size())?),
    };
    let rates = library
      .change_rates()
      .iter()
      .map(|&lambda| rng.random_range(0.0..=lambda))
      .collect();

    Ok(Self {
      library,
      cost,
      beta,
      cache_size,
      rule,
      options,
      popularity,
      rates,
      members: Vec::with_capacity(cache_size),
      last_convergence: None,
      metrics: Metrics::new(),
    })
  }

  /// Pre-seeds the cache. Items must be in range, distinct, and fit.
  pub fn with_members(mut self, members: Vec<ItemId>) -> Result<Self, BuildError> {
    if members.len() > self.cache_size {
      let item = members[self.cache_size];
      return Err(BuildError::InvalidSeed {
        item,
        reason: "cache is already full",
      });
    }
    for (pos, &item) in members.iter().enumerate() {
      if item >= self.library.size() {
        return Err(BuildError::InvalidSeed {
          item,
          reason: "item is outside the library",
        });
      }
      if members[..pos].contains(&item) {
        return Err(BuildError::InvalidSeed {
          item,
          reason: "item is listed twice",
        });
      }
    }
    self.members = members;
    if matches!(self.popularity, PopularitySource::Given(_)) {
      self.optimize_rates();
    }
    Ok(self)
  }

  fn popularity_of(&self, item: ItemId) -> f64 {
    match &self.popularity {
      PopularitySource::Given(probs) => probs[item],
      PopularitySource::Counted(counter) => counter.probability(item),
    }
  }

  /// The current refresh rate assigned to `item`, `None` outside the library.
  #[inline]
  pub fn rate(&self, item: ItemId) -> Option<f64> {
    self.rates.get(item).copied()
  }

  pub fn rates(&self) -> &[f64] {
    &self.rates
  }

  pub fn cost_model(&self) -> &CostModel {
    &self.cost
  }

  /// The marginal cost of `item` at its current rate, `None` outside the
  /// library.
  pub fn marginal_cost(&self, item: ItemId) -> Option<f64> {
    self.library.check(item).ok()?;
    Some(self.cost_of(item))
  }

  fn cost_of(&self, item: ItemId) -> f64 {
    self.cost.item_cost(
      self.rates[item],
      self.library.change_rate(item),
      self.popularity_of(item),
      self.beta,
    )
  }

  /// Average system cost of the current cache at the current rates.
  pub fn average_cost(&self) -> f64 {
    self.cost.base_cost(self.beta)
      + self.members.iter().map(|&item| self.cost_of(item)).sum::<f64>()
  }

  /// Average system cost if the whole library were cached at the current rates.
  pub fn average_cost_full_library(&self) -> f64 {
    self.cost.base_cost(self.beta)
      + (0..self.library.size()).map(|item| self.cost_of(item)).sum::<f64>()
  }

  /// Re-solves the optimal rate of every member within `[0, λ_i]`.
  ///
  /// The cost is separable across members, so each rate is an independent
  /// bounded scalar minimization.
  pub fn optimize_rates(&mut self) -> Convergence {
    let mut iterations = 0;
    let mut converged = true;
    for slot in 0..self.members.len() {
      let item = self.members[slot];
      let lambda = self.library.change_rate(item);
      let p = self.popularity_of(item);
      let minimum = minimize::golden_section(
        |rate| self.cost.item_cost(rate, lambda, p, self.beta),
        0.0,
        lambda,
        &self.options,
      );
      iterations = iterations.max(minimum.iterations);
      converged &= minimum.converged;
      self.rates[item] = minimum.x;
    }
    if !converged {
      tracing::warn!(members = self.members.len(), "per-item rate search hit its iteration budget");
    }
    let convergence = Convergence {
      iterations,
      converged,
    };
    self.last_convergence = Some(convergence);
    convergence
  }

  /// How the most recent rate solve ended, including the ones run
  /// implicitly by [`update`](CachePolicy::update) once the cache is full.
  /// `None` until rates have been solved at least once.
  pub fn last_convergence(&self) -> Option<Convergence> {
    self.last_convergence
  }

  fn cache_update(&mut self, item: ItemId) -> Admission {
    let hit = self.members.contains(&item);
    if self.members.len() < self.cache_size {
      if hit {
        return Admission::HIT;
      }
      self.members.push(item);
      return Admission::admitted(None);
    }

    self.optimize_rates();
    match self.rule {
      UpdateRule::MarginalCost => {
        if hit {
          return Admission::HIT;
        }
        let Some((slot, worst)) = self.costliest_member() else {
          return Admission::REJECTED;
        };
        let candidate = self.cost_of(item);
        if worst > candidate {
          let evicted = self.members.remove(slot);
          self.members.push(item);
          tracing::debug!(item, evicted, candidate, worst, "replaced costliest member");
          Admission::admitted(Some(evicted))
        } else {
          Admission::REJECTED
        }
      }
      UpdateRule::Popularity => {
        let previous = std::mem::take(&mut self.members);
        let scores = (0..self.library.size()).map(|i| (i, self.popularity_of(i)));
        self.members = rank_top_k(scores, self.cache_size);
        if hit {
          return Admission::HIT;
        }
        let evicted = previous.into_iter().find(|old| !self.members.contains(old));
        if self.members.contains(&item) {
          Admission::admitted(evicted)
        } else {
          Admission {
            hit: false,
            admitted: false,
            evicted,
          }
        }
      }
    }
  }

  /// The member with the largest marginal cost, first in cache order on ties.
  fn costliest_member(&self) -> Option<(usize, f64)> {
    let mut costliest: Option<(usize, f64)> = None;
    for (slot, &member) in self.members.iter().enumerate() {
      let mc = self.cost_of(member);
      if costliest.map_or(true, |(_, highest)| mc > highest) {
        costliest = Some((slot, mc));
      }
    }
    costliest
  }
}

impl CachePolicy for PerItemOptimizer {
  type Outcome = Admission;

  fn update(&mut self, request: Request) -> Result<Admission, RequestError> {
    let item = request.item;
    self.library.check(item)?;
    if let PopularitySource::Counted(counter) = &mut self.popularity {
      counter.update(item)?;
    }

    let outcome = self.cache_update(item);
    self.metrics.requests += 1;
    if outcome.hit {
      self.metrics.hits += 1;
    } else {
      self.metrics.record_miss(crate::policy::MissType::NotCached);
      if outcome.admitted {
        self.metrics.admissions += 1;
      } else {
        self.metrics.rejections += 1;
      }
    }
    if outcome.evicted.is_some() {
      self.metrics.evictions += 1;
    }
    Ok(outcome)
  }

  fn currcache(&self) -> Vec<ItemId> {
    let mut items = self.members.clone();
    items.sort_unstable();
    items
  }

  fn probability(&self, item: ItemId) -> f64 {
    if item >= self.library.size() {
      return 0.0;
    }
    self.popularity_of(item)
  }

  fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rng;

  fn optimizer(rule: UpdateRule, popularity: Option<Vec<f64>>, cache_size: usize) -> PerItemOptimizer {
    let library = Library::new(4, 1.0, 1.0).unwrap();
    PerItemOptimizer::new(
      library,
      CostModel::new(10.0, 1.0, 1.0, 1.0).unwrap(),
      1.0,
      cache_size,
      rule,
      popularity,
      MinimizerOptions::default(),
      &mut rng::seeded(7),
    )
    .unwrap()
  }

  #[test]
  fn test_initial_rates_within_bounds() {
    let opt = optimizer(UpdateRule::MarginalCost, None, 2);
    for item in 0..4 {
      let lambda = 1.0 / (item + 1) as f64;
      assert!((0.0..=lambda).contains(&opt.rate(item).unwrap()));
    }
  }

  #[test]
  fn test_fills_unconditionally() {
    let mut opt = optimizer(UpdateRule::MarginalCost, None, 2);
    assert!(opt.update(Request::new(3, 0.0)).unwrap().admitted);
    assert!(opt.update(Request::new(3, 1.0)).unwrap().hit);
    assert!(opt.update(Request::new(0, 2.0)).unwrap().admitted);
    assert_eq!(opt.currcache(), vec![0, 3]);
  }

  #[test]
  fn test_optimized_rates_respect_bounds() {
    let mut opt = optimizer(UpdateRule::MarginalCost, Some(vec![0.4, 0.3, 0.2, 0.1]), 2)
      .with_members(vec![0, 1])
      .unwrap();
    let convergence = opt.optimize_rates();
    assert!(convergence.converged);
    assert!(opt.rate(0).unwrap() <= 1.0 + 1e-12);
    assert!(opt.rate(1).unwrap() <= 0.5 + 1e-12);
    assert!(opt.average_cost() < opt.cost.base_cost(1.0));
  }

  #[test]
  fn test_marginal_rule_keeps_cache_size() {
    let mut opt = optimizer(UpdateRule::MarginalCost, None, 2);
    for (t, item) in [0, 1, 2, 2, 2, 3, 2, 1].into_iter().enumerate() {
      opt.update(Request::new(item, t as f64)).unwrap();
      assert!(opt.currcache().len() <= 2);
    }
  }

  #[test]
  fn test_popularity_rule_tracks_top_items() {
    let mut opt = optimizer(UpdateRule::Popularity, None, 2);
    for (t, item) in [0, 1, 2, 2, 3, 3, 3].into_iter().enumerate() {
      opt.update(Request::new(item, t as f64)).unwrap();
    }
    assert_eq!(opt.currcache(), vec![2, 3]);
  }

  #[test]
  fn test_streaming_update_reports_rate_budget() {
    let library = Library::new(4, 1.0, 1.0).unwrap();
    let options = MinimizerOptions {
      tolerance: 1e-10,
      max_iterations: 2,
    };
    let mut opt = PerItemOptimizer::new(
      library,
      CostModel::new(10.0, 1.0, 1.0, 1.0).unwrap(),
      1.0,
      2,
      UpdateRule::MarginalCost,
      None,
      options,
      &mut rng::seeded(7),
    )
    .unwrap();

    opt.update(Request::new(0, 0.0)).unwrap();
    opt.update(Request::new(1, 1.0)).unwrap();
    assert_eq!(opt.last_convergence(), None);

    opt.update(Request::new(2, 2.0)).unwrap();
    assert_eq!(
      opt.last_convergence(),
      Some(Convergence {
        iterations: 2,
        converged: false
      })
    );
  }

  #[test]
  fn test_out_of_library_queries_are_none() {
    let opt = optimizer(UpdateRule::MarginalCost, Some(vec![0.4, 0.3, 0.2, 0.1]), 2);
    assert_eq!(opt.rate(4), None);
    assert_eq!(opt.marginal_cost(4), None);
    assert!(opt.marginal_cost(3).is_some());
  }

  #[test]
  fn test_bad_seed_is_rejected() {
    let err = optimizer(UpdateRule::MarginalCost, None, 2)
      .with_members(vec![1, 1])
      .unwrap_err();
    assert_eq!(
      err,
      BuildError::InvalidSeed {
        item: 1,
        reason: "item is listed twice"
      }
    );
  }
}
