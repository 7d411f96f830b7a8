use crate::error::{BuildError, RequestError};
use crate::ItemId;

/// The fixed universe of cacheable items, indexed `0..size`.
///
/// Each item carries an intrinsic change rate `λ_i = λ₀ / (i + 1)^z`, so
/// lower-indexed items are more volatile, and optionally a freshness budget
/// `F_i`: the longest a cached copy may go unrevalidated.
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
  change_rates: Vec<f64>,
  freshness: Option<Vec<f64>>,
}

impl Library {
  /// Creates a library of `size` items with change rates `λ₀ / (i + 1)^z`.
  pub fn new(size: usize, lambda0: f64, z: f64) -> Result<Self, BuildError> {
    if size == 0 {
      return Err(BuildError::EmptyLibrary);
    }
    if !lambda0.is_finite() || lambda0 <= 0.0 {
      return Err(BuildError::InvalidValue {
        field: "lambda0",
        message: format!("must be finite and positive, got {lambda0}"),
      });
    }
    if !z.is_finite() {
      return Err(BuildError::InvalidValue {
        field: "z",
        message: format!("must be finite, got {z}"),
      });
    }

    let change_rates = (1..=size).map(|rank| lambda0 / (rank as f64).powf(z)).collect();
    Ok(Self {
      change_rates,
      freshness: None,
    })
  }

  /// Attaches a per-item freshness budget. Every entry must be finite and
  /// non-negative, and there must be exactly one entry per item.
  pub fn with_freshness(mut self, freshness: Vec<f64>) -> Result<Self, BuildError> {
    if freshness.len() != self.size() {
      return Err(BuildError::LengthMismatch {
        field: "freshness",
        expected: self.size(),
        actual: freshness.len(),
      });
    }
    if let Some(bad) = freshness.iter().find(|f| !f.is_finite() || **f < 0.0) {
      return Err(BuildError::InvalidValue {
        field: "freshness",
        message: format!("budgets must be finite and non-negative, got {bad}"),
      });
    }
    self.freshness = Some(freshness);
    Ok(self)
  }

  #[inline]
  pub fn size(&self) -> usize {
    self.change_rates.len()
  }

  #[inline]
  pub fn change_rate(&self, item: ItemId) -> f64 {
    self.change_rates[item]
  }

  pub fn change_rates(&self) -> &[f64] {
    &self.change_rates
  }

  pub fn freshness(&self) -> Option<&[f64]> {
    self.freshness.as_deref()
  }

  /// Fails with `OutOfRange` if `item` is not part of the library.
  #[inline]
  pub fn check(&self, item: ItemId) -> Result<(), RequestError> {
    if item < self.size() {
      Ok(())
    } else {
      Err(RequestError::OutOfRange {
        item,
        library_size: self.size(),
      })
    }
  }
}

/// Validates a given popularity vector against a library size.
pub(crate) fn validate_popularity(popularity: &[f64], library_size: usize) -> Result<(), BuildError> {
  if popularity.len() != library_size {
    return Err(BuildError::LengthMismatch {
      field: "popularity",
      expected: library_size,
      actual: popularity.len(),
    });
  }
  if let Some(bad) = popularity.iter().find(|p| !p.is_finite() || **p < 0.0) {
    return Err(BuildError::InvalidValue {
      field: "popularity",
      message: format!("probabilities must be finite and non-negative, got {bad}"),
    });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_change_rates_follow_power_law() {
    let library = Library::new(5, 1.0, 1.0).unwrap();
    let expected = [1.0, 0.5, 1.0 / 3.0, 0.25, 0.2];
    for (got, want) in library.change_rates().iter().zip(expected) {
      assert!((got - want).abs() < 1e-12);
    }
  }

  #[test]
  fn test_freshness_length_must_match() {
    let err = Library::new(3, 1.0, 1.0)
      .unwrap()
      .with_freshness(vec![1.0, 2.0])
      .unwrap_err();
    assert_eq!(
      err,
      BuildError::LengthMismatch {
        field: "freshness",
        expected: 3,
        actual: 2
      }
    );
  }

  #[test]
  fn test_rejects_bad_shape_parameters() {
    assert_eq!(Library::new(0, 1.0, 1.0).unwrap_err(), BuildError::EmptyLibrary);
    assert!(Library::new(3, 0.0, 1.0).is_err());
    assert!(Library::new(3, 1.0, f64::NAN).is_err());
  }

  #[test]
  fn test_check_range() {
    let library = Library::new(2, 1.0, 0.0).unwrap();
    assert!(library.check(1).is_ok());
    assert_eq!(
      library.check(2),
      Err(RequestError::OutOfRange {
        item: 2,
        library_size: 2
      })
    );
  }
}
