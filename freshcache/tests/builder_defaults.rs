use fibre_freshcache::popularity::SlidingWindow;
use fibre_freshcache::{
  BuildError, CachePolicy, CostModel, EstimatorKind, MinimizerOptions, PolicyBuilder, PolicyConfig, Request,
  UpdateRule,
};
use pretty_assertions::assert_eq;

#[test]
fn test_default_config() {
  let config = PolicyConfig::default();
  assert_eq!(config.cost, CostModel::default());
  assert_eq!(config.estimator, EstimatorKind::Exact);
  assert_eq!(config.update_rule, UpdateRule::MarginalCost);
  assert_eq!(config.minimizer, MinimizerOptions::default());
  assert!(config.prefill_window);
  assert!(config.freshness.is_none());
  assert!(config.max_fixed_point_iterations > 0);
}

#[test]
fn test_default_window_scales_with_shortlist_and_library() {
  // ⌊3² · ln 100⌋ = ⌊41.44⌋
  assert_eq!(SlidingWindow::default_window(3, 100), 41);
  // A one-item library has ln L = 0; the window never collapses to zero.
  assert_eq!(SlidingWindow::default_window(4, 1), 1);
}

#[test]
fn test_construction_rejects_bad_parameters() {
  let err = PolicyBuilder::new()
    .library_size(3)
    .cache_size(1)
    .freshness(vec![1.0, 1.0])
    .build_freshness()
    .unwrap_err();
  assert_eq!(
    err,
    BuildError::LengthMismatch {
      field: "freshness",
      expected: 3,
      actual: 2
    }
  );

  let err = PolicyBuilder::new()
    .library_size(3)
    .cache_size(4)
    .uniform_freshness(1.0)
    .build_freshness()
    .unwrap_err();
  assert_eq!(
    err,
    BuildError::CacheTooLarge {
      cache_size: 4,
      library_size: 3
    }
  );

  assert_eq!(
    CostModel::new(1.0, -0.5, 1.0, 1.0).unwrap_err(),
    BuildError::InvalidCost {
      name: "caching",
      value: -0.5
    }
  );

  let err = PolicyBuilder::new().library_size(0).build_sketch().unwrap_err();
  assert_eq!(err, BuildError::EmptyLibrary);
}

#[test]
fn test_shared_rate_requires_popularity() {
  let err = PolicyBuilder::new()
    .library_size(5)
    .cache_size(2)
    .build_shared_rate()
    .unwrap_err();
  assert!(matches!(err, BuildError::InvalidValue { field: "popularity", .. }));
}

#[test]
fn test_seed_changes_initial_rates_only_through_rng() {
  let rates = |seed| {
    PolicyBuilder::new()
      .library_size(8)
      .cache_size(2)
      .seed(seed)
      .build_per_item()
      .unwrap()
      .rates()
      .to_vec()
  };
  assert_eq!(rates(1), rates(1));
  assert_ne!(rates(1), rates(2));
}

#[test]
fn test_config_round_trips_through_json() {
  let builder = PolicyBuilder::new()
    .library_size(20)
    .cache_size(4)
    .uniform_freshness(6.0)
    .window(30)
    .shortlist(3)
    .estimator(EstimatorKind::Lite)
    .update_rule(UpdateRule::Popularity)
    .seed(99);

  let json = serde_json::to_string(builder.config()).unwrap();
  let restored: PolicyConfig = serde_json::from_str(&json).unwrap();
  assert_eq!(&restored, builder.config());

  let requests: Vec<Request> = (0..40).map(|t| Request::new((t * 7) % 20, t as f64)).collect();
  let mut a = builder.build_freshness().unwrap();
  let mut b = PolicyBuilder::from_config(restored).build_freshness().unwrap();
  for request in requests {
    assert_eq!(a.update(request).unwrap(), b.update(request).unwrap());
  }
}

#[test]
fn test_partial_json_fills_defaults() {
  let config: PolicyConfig = serde_json::from_str(r#"{ "library_size": 12, "cache_size": 3 }"#).unwrap();
  assert_eq!(config.library_size, 12);
  assert_eq!(config.cache_size, 3);
  assert_eq!(config.seed, PolicyConfig::default().seed);
}
