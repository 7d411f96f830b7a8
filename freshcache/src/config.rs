#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cost::CostModel;
use crate::freshness::EstimatorKind;
use crate::optimizer::{MinimizerOptions, UpdateRule};

/// Plain numeric configuration shared by every policy the builder can make.
///
/// Fields that a particular policy does not use are ignored by it. With the
/// `serde` feature, missing fields deserialize to their defaults.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PolicyConfig {
  /// Number of items `L` in the library.
  pub library_size: usize,
  /// Capacity of the cache, or of tier 1 for a tandem cache.
  pub cache_size: usize,
  /// Capacity of tier 2 for a tandem cache.
  pub tier2_size: usize,
  pub cost: CostModel,
  /// External request arrival rate `β`.
  pub beta: f64,
  /// Change-rate scale `λ₀` in `λ_i = λ₀ / (i + 1)^z`.
  pub lambda0: f64,
  /// Change-rate exponent `z`.
  pub z: f64,
  /// Per-item freshness budgets `F`, required by freshness caches.
  pub freshness: Option<Vec<f64>>,
  /// Sliding-window length. Defaults to `⌊k² · ln L⌋` for shortlist size `k`.
  pub window: Option<usize>,
  /// Shortlist size `k` for lite counting. Defaults to the cache size.
  pub shortlist: Option<usize>,
  /// Weight window occurrences by `F_i / W` instead of counting them as one.
  pub weight_by_freshness: bool,
  /// Start the sliding window full of uniformly random items.
  pub prefill_window: bool,
  pub estimator: EstimatorKind,
  pub update_rule: UpdateRule,
  pub sketch_rows: usize,
  pub sketch_buckets: usize,
  /// Sketch cache capacity. Defaults to `sketch_buckets`, capped at `L`.
  pub sketch_capacity: Option<usize>,
  /// Seed for every stochastic initialization.
  pub seed: u64,
  pub minimizer: MinimizerOptions,
  /// Round budget for the shared-rate fixed point.
  pub max_fixed_point_iterations: usize,
}

impl Default for PolicyConfig {
  fn default() -> Self {
    Self {
      library_size: 100,
      cache_size: 10,
      tier2_size: 10,
      cost: CostModel::default(),
      beta: 1.0,
      lambda0: 1.0,
      z: 1.0,
      freshness: None,
      window: None,
      shortlist: None,
      weight_by_freshness: false,
      prefill_window: true,
      estimator: EstimatorKind::default(),
      update_rule: UpdateRule::default(),
      sketch_rows: 5,
      sketch_buckets: 64,
      sketch_capacity: None,
      seed: 7,
      minimizer: MinimizerOptions::default(),
      max_fixed_point_iterations: 100,
    }
  }
}
