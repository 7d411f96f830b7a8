#![allow(dead_code)]

use fibre_freshcache::{rng, ItemId, Request};
use rand_distr::{Distribution, Zipf};

// Draws `count` requests from a Zipf(`exponent`) law over `library_size`
// items. Item 0 is the most popular. Request `t` arrives at time `t`.
pub fn zipf_requests(library_size: usize, exponent: f64, count: usize, seed: u64) -> Vec<Request> {
  let mut rng = rng::seeded(seed);
  let zipf = Zipf::new(library_size as f64, exponent).unwrap();
  (0..count)
    .map(|t| {
      let rank = zipf.sample(&mut rng) as ItemId;
      Request::new(rank - 1, t as f64)
    })
    .collect()
}

// The exact Zipf probabilities matching `zipf_requests`.
pub fn zipf_popularity(library_size: usize, exponent: f64) -> Vec<f64> {
  let weights: Vec<f64> = (1..=library_size).map(|k| (k as f64).powf(-exponent)).collect();
  let total: f64 = weights.iter().sum();
  weights.into_iter().map(|w| w / total).collect()
}

pub fn requests(items: &[ItemId]) -> Vec<Request> {
  items
    .iter()
    .enumerate()
    .map(|(t, &item)| Request::new(item, t as f64))
    .collect()
}

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
  assert!(
    (actual - expected).abs() <= tolerance,
    "expected {expected}, got {actual} (tolerance {tolerance})"
  );
}
