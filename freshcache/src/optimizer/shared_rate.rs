use super::minimize::{self, MinimizerOptions, Minimum};
use super::{validate_arrival_rate, validate_cache_size, Convergence};
use crate::cost::CostModel;
use crate::error::BuildError;
use crate::library::{self, Library};
use crate::popularity::rank_top_k;
use crate::ItemId;

/// The converged output of a [`SharedRateOptimizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshPlan {
  /// Cached items in ascending id order.
  pub members: Vec<ItemId>,
  /// The refresh rate shared by every member.
  pub rate: f64,
  pub average_cost: f64,
  pub convergence: Convergence,
}

/// Cost minimization with one refresh rate shared by the whole cache.
///
/// Alternates between solving the optimal shared rate for a fixed cache and
/// re-deriving the cache from the sign of each item's marginal cost at that
/// rate, until the cache stops changing or the round budget is spent.
#[derive(Debug, Clone)]
pub struct SharedRateOptimizer {
  library: Library,
  cost: CostModel,
  beta: f64,
  popularity: Vec<f64>,
  cache_size: usize,
  options: MinimizerOptions,
  max_rounds: usize,
  members: Vec<ItemId>,
  rate: f64,
  solved: Option<Convergence>,
}

impl SharedRateOptimizer {
  /// Creates an optimizer for a known popularity profile.
  ///
  /// The search starts from the `cache_size` most popular items.
  pub fn new(
    library: Library,
    cost: CostModel,
    beta: f64,
    popularity: Vec<f64>,
    cache_size: usize,
    options: MinimizerOptions,
    max_rounds: usize,
  ) -> Result<Self, BuildError> {
    cost.validate()?;
    validate_arrival_rate(beta)?;
    validate_cache_size(cache_size, library.size())?;
    library::validate_popularity(&popularity, library.size())?;
    if max_rounds == 0 {
      return Err(BuildError::InvalidValue {
        field: "max_fixed_point_iterations",
        message: "at least one round is required".into(),
      });
    }

    let members = rank_top_k(popularity.iter().copied().enumerate(), cache_size);
    Ok(Self {
      library,
      cost,
      beta,
      popularity,
      cache_size,
      options,
      max_rounds,
      members,
      rate: 0.0,
      solved: None,
    })
  }

  /// The current shared refresh rate.
  #[inline]
  pub fn rate(&self) -> f64 {
    self.rate
  }

  pub fn cost_model(&self) -> &CostModel {
    &self.cost
  }

  /// Replaces the popularity profile. The next [`solve`](Self::solve) resumes
  /// from the current cache.
  pub fn set_popularity(&mut self, popularity: Vec<f64>) -> Result<(), BuildError> {
    library::validate_popularity(&popularity, self.library.size())?;
    self.popularity = popularity;
    self.solved = None;
    Ok(())
  }

  /// Average system cost of caching `members` at the shared `rate`.
  pub fn average_cost_at(&self, members: &[ItemId], rate: f64) -> f64 {
    self.cost.base_cost(self.beta)
      + members
        .iter()
        .map(|&item| {
          self
            .cost
            .item_cost(rate, self.library.change_rate(item), self.popularity[item], self.beta)
        })
        .sum::<f64>()
  }

  /// Average system cost of the current cache at the current rate.
  pub fn average_cost(&self) -> f64 {
    self.average_cost_at(&self.members, self.rate)
  }

  /// The marginal cost of `item` at the current rate, `None` if the item
  /// is not part of the library.
  pub fn marginal_cost(&self, item: ItemId) -> Option<f64> {
    self.library.check(item).ok()?;
    Some(self.cost_of(item))
  }

  fn cost_of(&self, item: ItemId) -> f64 {
    self.cost.item_cost(
      self.rate,
      self.library.change_rate(item),
      self.popularity[item],
      self.beta,
    )
  }

  /// The marginal cost of every library item at the current rate.
  pub fn marginal_costs(&self) -> Vec<f64> {
    (0..self.library.size()).map(|item| self.cost_of(item)).collect()
  }

  /// Solves the shared rate minimizing the average cost of `members`.
  ///
  /// An empty cache has the constant cost `β·C_f`; in that case the current
  /// rate is kept and reported as the minimizer.
  pub fn optimal_rate(&self, members: &[ItemId]) -> Minimum {
    if members.is_empty() {
      tracing::warn!(rate = self.rate, "empty cache has no rate dependence; keeping current rate");
      return Minimum {
        x: self.rate,
        value: self.cost.base_cost(self.beta),
        iterations: 0,
        converged: true,
      };
    }
    let start = self.library.change_rates().iter().copied().fold(0.0, f64::max);
    minimize::minimize_nonnegative(|rate| self.average_cost_at(members, rate), start, &self.options)
  }

  /// Items with negative marginal cost at `rate`, most negative first,
  /// truncated to the cache size.
  fn select(&self, rate: f64) -> Vec<ItemId> {
    let mut candidates: Vec<(ItemId, f64)> = (0..self.library.size())
      .map(|item| {
        let mc = self
          .cost
          .item_cost(rate, self.library.change_rate(item), self.popularity[item], self.beta);
        (item, mc)
      })
      .filter(|(_, mc)| *mc < 0.0)
      .collect();
    candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    candidates.truncate(self.cache_size);
    candidates.into_iter().map(|(item, _)| item).collect()
  }

  /// Runs the rate/membership fixed point until the cache is stable.
  pub fn solve(&mut self) -> RefreshPlan {
    let convergence = match self.solved {
      Some(convergence) => convergence,
      None => {
        let convergence = self.refresh_rate_cache();
        self.solved = Some(convergence);
        convergence
      }
    };
    RefreshPlan {
      members: self.sorted_members(),
      rate: self.rate,
      average_cost: self.average_cost(),
      convergence,
    }
  }

  /// Solves and returns the resulting cache, ascending by id.
  pub fn currcache(&mut self) -> Vec<ItemId> {
    self.solve().members
  }

  fn sorted_members(&self) -> Vec<ItemId> {
    let mut members = self.members.clone();
    members.sort_unstable();
    members
  }

  fn refresh_rate_cache(&mut self) -> Convergence {
    for round in 1..=self.max_rounds {
      let minimum = self.optimal_rate(&self.members);
      self.rate = minimum.x;

      let mut next = self.select(self.rate);
      next.sort_unstable();
      let stable = next == self.sorted_members();
      self.members = next;

      if stable {
        tracing::info!(
          rounds = round,
          rate = self.rate,
          members = self.members.len(),
          "shared refresh rate converged"
        );
        return Convergence {
          iterations: round,
          converged: minimum.converged,
        };
      }
    }

    tracing::warn!(
      rounds = self.max_rounds,
      rate = self.rate,
      "shared refresh rate did not reach a fixed point"
    );
    Convergence {
      iterations: self.max_rounds,
      converged: false,
    }
  }
}
