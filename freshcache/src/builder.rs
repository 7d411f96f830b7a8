use crate::config::PolicyConfig;
use crate::cost::CostModel;
use crate::error::BuildError;
use crate::freshness::{EstimatorKind, FreshnessCache, PopularityModel, TandemFreshnessCache};
use crate::library::Library;
use crate::optimizer::{MinimizerOptions, PerItemOptimizer, SharedRateOptimizer, UpdateRule};
use crate::popularity::{CountSketch, ExactCounter, LiteCounter, SketchCache, SlidingWindow};
use crate::rng::{self, SimRng};
use crate::ItemId;

/// A builder for every policy and estimator in the crate.
///
/// Numeric settings live in a [`PolicyConfig`]; the builder adds the inputs
/// that are not plain configuration (a given popularity vector and
/// pre-seeded cache contents). Each `build_*` method validates everything
/// it uses and creates its own [`SimRng`] from the configured seed, so two
/// builds from the same builder are identical.
#[derive(Debug, Clone, Default)]
pub struct PolicyBuilder {
  config: PolicyConfig,
  popularity: Option<Vec<f64>>,
  contents: Vec<(ItemId, f64)>,
  tier2_contents: Vec<(ItemId, f64)>,
  members: Vec<ItemId>,
  uniform_freshness: Option<f64>,
}

// --- Configuration Methods ---
impl PolicyBuilder {
  /// Creates a new `PolicyBuilder` with default settings.
  pub fn new() -> Self {
    Self::default()
  }

  /// Starts from an existing configuration, such as one loaded with `serde`.
  pub fn from_config(config: PolicyConfig) -> Self {
    Self {
      config,
      ..Self::default()
    }
  }

  pub fn config(&self) -> &PolicyConfig {
    &self.config
  }

  /// Sets the number of items in the library.
  pub fn library_size(mut self, size: usize) -> Self {
    self.config.library_size = size;
    if let Some(freshness) = self.uniform_freshness {
      self.config.freshness = Some(vec![freshness; size]);
    }
    self
  }

  /// Sets the cache capacity (tier 1 for a tandem cache).
  pub fn cache_size(mut self, size: usize) -> Self {
    self.config.cache_size = size;
    self
  }

  /// Sets the tier-2 capacity of a tandem cache.
  pub fn tier2_size(mut self, size: usize) -> Self {
    self.config.tier2_size = size;
    self
  }

  pub fn cost(mut self, cost: CostModel) -> Self {
    self.config.cost = cost;
    self
  }

  /// Sets the external request arrival rate `β`.
  pub fn beta(mut self, beta: f64) -> Self {
    self.config.beta = beta;
    self
  }

  /// Sets the change-rate profile `λ_i = λ₀ / (i + 1)^z`.
  pub fn change_rates(mut self, lambda0: f64, z: f64) -> Self {
    self.config.lambda0 = lambda0;
    self.config.z = z;
    self
  }

  /// Sets the per-item freshness budgets.
  pub fn freshness(mut self, freshness: Vec<f64>) -> Self {
    self.config.freshness = Some(freshness);
    self.uniform_freshness = None;
    self
  }

  /// Gives every item the same freshness budget, following later changes
  /// to the library size.
  pub fn uniform_freshness(mut self, freshness: f64) -> Self {
    self.config.freshness = Some(vec![freshness; self.config.library_size]);
    self.uniform_freshness = Some(freshness);
    self
  }

  /// Sets the sliding-window length used by lite counting.
  pub fn window(mut self, window: usize) -> Self {
    self.config.window = Some(window);
    self
  }

  /// Sets how many top window items feed the lite counter bank.
  pub fn shortlist(mut self, shortlist: usize) -> Self {
    self.config.shortlist = Some(shortlist);
    self
  }

  pub fn weight_by_freshness(mut self, enabled: bool) -> Self {
    self.config.weight_by_freshness = enabled;
    self
  }

  /// Whether the sliding window starts full of random items. Defaults to `true`.
  pub fn prefill_window(mut self, enabled: bool) -> Self {
    self.config.prefill_window = enabled;
    self
  }

  /// Selects how freshness caches estimate popularity.
  pub fn estimator(mut self, kind: EstimatorKind) -> Self {
    self.config.estimator = kind;
    self
  }

  pub fn update_rule(mut self, rule: UpdateRule) -> Self {
    self.config.update_rule = rule;
    self
  }

  /// Sets the count-sketch dimensions.
  pub fn sketch(mut self, rows: usize, buckets: usize) -> Self {
    self.config.sketch_rows = rows;
    self.config.sketch_buckets = buckets;
    self
  }

  /// Overrides the sketch cache capacity, which otherwise equals the
  /// bucket count.
  pub fn sketch_capacity(mut self, capacity: usize) -> Self {
    self.config.sketch_capacity = Some(capacity);
    self
  }

  pub fn seed(mut self, seed: u64) -> Self {
    self.config.seed = seed;
    self
  }

  pub fn minimizer(mut self, options: MinimizerOptions) -> Self {
    self.config.minimizer = options;
    self
  }

  /// Caps the shared-rate fixed point at `rounds` rate/membership rounds.
  pub fn max_fixed_point_iterations(mut self, rounds: usize) -> Self {
    self.config.max_fixed_point_iterations = rounds;
    self
  }

  /// Supplies a known popularity vector instead of estimating it.
  ///
  /// Freshness caches switch to [`EstimatorKind::Given`].
  pub fn popularity(mut self, popularity: Vec<f64>) -> Self {
    self.popularity = Some(popularity);
    self.config.estimator = EstimatorKind::Given;
    self
  }

  /// Pre-seeds a freshness cache (tier 1 of a tandem cache).
  pub fn contents(mut self, contents: Vec<(ItemId, f64)>) -> Self {
    self.contents = contents;
    self
  }

  /// Pre-seeds tier 2 of a tandem cache.
  pub fn tier2_contents(mut self, contents: Vec<(ItemId, f64)>) -> Self {
    self.tier2_contents = contents;
    self
  }

  /// Pre-seeds the members of a per-item optimizer.
  pub fn members(mut self, members: Vec<ItemId>) -> Self {
    self.members = members;
    self
  }
}

// --- Build Methods ---
impl PolicyBuilder {
  /// Builds the item library: change rates plus optional freshness budgets.
  pub fn build_library(&self) -> Result<Library, BuildError> {
    let library = Library::new(self.config.library_size, self.config.lambda0, self.config.z)?;
    match &self.config.freshness {
      Some(freshness) => library.with_freshness(freshness.clone()),
      None => Ok(library),
    }
  }

  /// Builds the sliding window used as the lite shortlist.
  pub fn build_window(&self, rng: &mut SimRng) -> Result<SlidingWindow, BuildError> {
    let config = &self.config;
    let top = config.shortlist.unwrap_or(config.cache_size);
    let mut window = SlidingWindow::new(config.library_size, top, config.window)?;
    if config.weight_by_freshness {
      let freshness = config.freshness.as_deref().ok_or(BuildError::MissingFreshness)?;
      window = window.weighted(freshness)?;
    }
    if config.prefill_window {
      window = window.prefilled(rng);
    }
    Ok(window)
  }

  /// Builds a single freshness-constrained cache.
  pub fn build_freshness(self) -> Result<FreshnessCache, BuildError> {
    self.validate()?;
    let mut rng = rng::seeded(self.config.seed);
    let library = self.build_library()?;
    let model = self.popularity_model(&mut rng)?;
    FreshnessCache::new(library, self.config.cache_size, model)?.with_contents(self.contents)
  }

  /// Builds a two-tier freshness-constrained cache.
  pub fn build_tandem(self) -> Result<TandemFreshnessCache, BuildError> {
    self.validate()?;
    let mut rng = rng::seeded(self.config.seed);
    let library = self.build_library()?;
    let model = self.popularity_model(&mut rng)?;
    TandemFreshnessCache::new(library, self.config.cache_size, self.config.tier2_size, model)?
      .with_contents(self.contents, self.tier2_contents)
  }

  /// Builds the shared-rate optimizer. Requires a popularity vector.
  pub fn build_shared_rate(self) -> Result<SharedRateOptimizer, BuildError> {
    self.validate()?;
    let library = self.build_library()?;
    let popularity = self.popularity.ok_or_else(|| BuildError::InvalidValue {
      field: "popularity",
      message: "the shared-rate optimizer needs a popularity vector".into(),
    })?;
    SharedRateOptimizer::new(
      library,
      self.config.cost,
      self.config.beta,
      popularity,
      self.config.cache_size,
      self.config.minimizer,
      self.config.max_fixed_point_iterations,
    )
  }

  /// Builds the per-item optimizer. Without a popularity vector it counts
  /// popularity from the request stream.
  pub fn build_per_item(self) -> Result<PerItemOptimizer, BuildError> {
    self.validate()?;
    let mut rng = rng::seeded(self.config.seed);
    let library = self.build_library()?;
    let optimizer = PerItemOptimizer::new(
      library,
      self.config.cost,
      self.config.beta,
      self.config.cache_size,
      self.config.update_rule,
      self.popularity,
      self.config.minimizer,
      &mut rng,
    )?;
    if self.members.is_empty() {
      Ok(optimizer)
    } else {
      optimizer.with_members(self.members)
    }
  }

  /// Builds a cache ranked by a count sketch. It holds one member per
  /// bucket (at most the whole library) unless a capacity is set.
  pub fn build_sketch(self) -> Result<SketchCache, BuildError> {
    let mut rng = rng::seeded(self.config.seed);
    let sketch = CountSketch::new(
      self.config.library_size,
      self.config.sketch_rows,
      self.config.sketch_buckets,
      &mut rng,
    )?;
    let capacity = self
      .config
      .sketch_capacity
      .unwrap_or_else(|| self.config.sketch_buckets.min(self.config.library_size));
    SketchCache::new(sketch, capacity)
  }

  fn popularity_model(&self, rng: &mut SimRng) -> Result<PopularityModel, BuildError> {
    let size = self.config.library_size;
    match self.config.estimator {
      EstimatorKind::Given => {
        let popularity = self.popularity.clone().ok_or_else(|| BuildError::InvalidValue {
          field: "popularity",
          message: "the given estimator needs a popularity vector".into(),
        })?;
        PopularityModel::given(popularity, size)
      }
      EstimatorKind::Exact => Ok(PopularityModel::Exact(ExactCounter::new(size)?)),
      EstimatorKind::Lite => Ok(PopularityModel::Lite(LiteCounter::new(self.build_window(rng)?))),
    }
  }

  /// Validates the settings shared by several policies.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    let config = &self.config;
    if config.library_size == 0 {
      return Err(BuildError::EmptyLibrary);
    }
    config.cost.validate()?;
    if !(config.minimizer.tolerance.is_finite() && config.minimizer.tolerance > 0.0) {
      return Err(BuildError::InvalidValue {
        field: "minimizer.tolerance",
        message: format!("tolerance must be positive, got {}", config.minimizer.tolerance),
      });
    }
    if config.minimizer.max_iterations == 0 {
      return Err(BuildError::InvalidValue {
        field: "minimizer.max_iterations",
        message: "at least one iteration is required".into(),
      });
    }
    Ok(())
  }
}
