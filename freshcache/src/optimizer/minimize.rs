//! Bounded scalar minimization for unimodal cost curves.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const INV_PHI: f64 = 0.618_033_988_749_894_9;

/// Iteration and tolerance budget for a minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MinimizerOptions {
  /// Width of the final bracketing interval.
  pub tolerance: f64,
  /// Maximum golden-section steps; the same cap bounds bracket doubling.
  pub max_iterations: usize,
}

impl Default for MinimizerOptions {
  fn default() -> Self {
    Self {
      tolerance: 1e-10,
      max_iterations: 500,
    }
  }
}

/// The result of a minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimum {
  pub x: f64,
  pub value: f64,
  pub iterations: usize,
  /// `false` when the budget ran out before the tolerance was reached.
  pub converged: bool,
}

/// Golden-section search for the minimum of `f` on `[lo, hi]`.
pub fn golden_section<F>(f: F, lo: f64, hi: f64, options: &MinimizerOptions) -> Minimum
where
  F: Fn(f64) -> f64,
{
  let (mut a, mut b) = if lo <= hi { (lo, hi) } else { (hi, lo) };
  let mut c = b - INV_PHI * (b - a);
  let mut d = a + INV_PHI * (b - a);
  let mut fc = f(c);
  let mut fd = f(d);
  let mut iterations = 0;

  while b - a > options.tolerance && iterations < options.max_iterations {
    if fc < fd {
      b = d;
      d = c;
      fd = fc;
      c = b - INV_PHI * (b - a);
      fc = f(c);
    } else {
      a = c;
      c = d;
      fc = fd;
      d = a + INV_PHI * (b - a);
      fd = f(d);
    }
    iterations += 1;
  }

  let x = (a + b) / 2.0;
  Minimum {
    x,
    value: f(x),
    iterations,
    converged: b - a <= options.tolerance,
  }
}

/// Minimizes `f` over `[0, ∞)`.
///
/// The upper bound starts at `start` and doubles until the curve turns
/// upward; if it never does within the budget the result is reported as
/// not converged at the last bound tried.
pub fn minimize_nonnegative<F>(f: F, start: f64, options: &MinimizerOptions) -> Minimum
where
  F: Fn(f64) -> f64,
{
  let mut hi = if start.is_finite() && start > 0.0 { start } else { 1.0 };
  let mut f_hi = f(hi);
  let mut doublings = 0;

  loop {
    if doublings >= options.max_iterations {
      tracing::warn!(bound = hi, "refresh rate bracket never closed; cost keeps falling");
      return Minimum {
        x: hi,
        value: f_hi,
        iterations: doublings,
        converged: false,
      };
    }
    let next = hi * 2.0;
    let f_next = f(next);
    doublings += 1;
    if f_next >= f_hi || !next.is_finite() {
      hi = next;
      break;
    }
    hi = next;
    f_hi = f_next;
  }

  let mut minimum = golden_section(f, 0.0, hi, options);
  minimum.iterations += doublings;
  minimum
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_golden_section_finds_parabola_vertex() {
    let min = golden_section(|x| (x - 1.5).powi(2) + 2.0, 0.0, 4.0, &MinimizerOptions::default());
    assert!(min.converged);
    assert!((min.x - 1.5).abs() < 1e-6);
    assert!((min.value - 2.0).abs() < 1e-12);
  }

  #[test]
  fn test_boundary_minimum() {
    let min = golden_section(|x| x, 0.0, 1.0, &MinimizerOptions::default());
    assert!(min.x < 1e-9);
  }

  #[test]
  fn test_nonnegative_brackets_far_minimum() {
    let min = minimize_nonnegative(|x| (x - 100.0).powi(2), 1.0, &MinimizerOptions::default());
    assert!(min.converged);
    assert!((min.x - 100.0).abs() < 1e-6);
  }

  #[test]
  fn test_decreasing_curve_reports_nonconvergence() {
    let options = MinimizerOptions {
      tolerance: 1e-10,
      max_iterations: 20,
    };
    let min = minimize_nonnegative(|x| -x, 1.0, &options);
    assert!(!min.converged);
    assert_eq!(min.iterations, 20);
  }

  #[test]
  fn test_iteration_budget_is_respected() {
    let options = MinimizerOptions {
      tolerance: 0.0,
      max_iterations: 5,
    };
    let min = golden_section(|x| (x - 0.3).powi(2), 0.0, 1.0, &options);
    assert_eq!(min.iterations, 5);
    assert!(!min.converged);
  }
}
