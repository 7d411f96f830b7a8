#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// Guard added to every refresh rate that appears in a denominator.
///
/// The average-cost and marginal-cost formulas share this single constant
/// (both are built from [`CostModel::item_cost`]), so an item's admission
/// decision never depends on which formula evaluated it.
pub const RATE_EPSILON: f64 = 1e-15;

/// The per-event costs shared by the optimizers and the freshness caches.
///
/// Immutable once constructed: `(C_f, C_ca, C_ch, C_o)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CostModel {
  fetch: f64,
  caching: f64,
  checking: f64,
  staleness: f64,
}

impl Default for CostModel {
  fn default() -> Self {
    Self {
      fetch: 1.0,
      caching: 1.0,
      checking: 1.0,
      staleness: 1.0,
    }
  }
}

impl CostModel {
  /// Creates a cost model. Every component must be finite and non-negative.
  pub fn new(fetch: f64, caching: f64, checking: f64, staleness: f64) -> Result<Self, BuildError> {
    let model = Self {
      fetch,
      caching,
      checking,
      staleness,
    };
    model.validate()?;
    Ok(model)
  }

  /// Re-checks the components; used for models that arrive through `serde`.
  pub fn validate(&self) -> Result<(), BuildError> {
    let components = [
      ("fetch", self.fetch),
      ("caching", self.caching),
      ("checking", self.checking),
      ("staleness", self.staleness),
    ];
    for (name, value) in components {
      if !value.is_finite() || value < 0.0 {
        return Err(BuildError::InvalidCost { name, value });
      }
    }
    Ok(())
  }

  /// Cost of one fetch from the origin (`C_f`).
  #[inline]
  pub fn fetch(&self) -> f64 {
    self.fetch
  }

  /// Extra caching cost per item under churn (`C_ca`).
  #[inline]
  pub fn caching(&self) -> f64 {
    self.caching
  }

  /// Cost of one freshness check (`C_ch`).
  #[inline]
  pub fn checking(&self) -> f64 {
    self.checking
  }

  /// Staleness cost coefficient (`C_o`).
  #[inline]
  pub fn staleness(&self) -> f64 {
    self.staleness
  }

  /// Returns a copy with a different fetch cost.
  pub fn with_fetch(self, fetch: f64) -> Result<Self, BuildError> {
    Self::new(fetch, self.caching, self.checking, self.staleness)
  }

  /// The cost paid when nothing is cached: every arrival is a fetch.
  #[inline]
  pub fn base_cost(&self, beta: f64) -> f64 {
    beta * self.fetch
  }

  /// The change in average system cost from caching one item refreshed at
  /// `rate`, i.e. its marginal cost.
  ///
  /// `r·C_ch + C_ca·r·λ/(λ + r) + β·p·(λ·C_o/r − C_f)`
  #[inline]
  pub fn item_cost(&self, rate: f64, change_rate: f64, popularity: f64, beta: f64) -> f64 {
    rate * self.checking
      + self.caching * rate * change_rate / (change_rate + rate)
      + beta * popularity * (change_rate * self.staleness / (rate + RATE_EPSILON) - self.fetch)
  }
}
