// freshcache/tests/invariants.rs

mod common;

use common::{zipf_popularity, zipf_requests};
use fibre_freshcache::freshness::Tier;
use fibre_freshcache::popularity::{ExactCounter, PopularityEstimator};
use fibre_freshcache::{
  CachePolicy, CostModel, EstimatorKind, PolicyBuilder, Request, RequestError, UpdateRule,
};
use pretty_assertions::assert_eq;

const LIBRARY: usize = 50;

fn base() -> PolicyBuilder {
  PolicyBuilder::new()
    .library_size(LIBRARY)
    .cache_size(5)
    .tier2_size(5)
    .freshness((0..LIBRARY).map(|i| 5.0 + (i % 7) as f64 * 3.0).collect())
    .cost(CostModel::new(10.0, 1.0, 1.0, 1.0).unwrap())
    .seed(42)
}

fn assert_bounded<P: CachePolicy>(mut policy: P, capacity: usize, requests: &[Request]) {
  for &request in requests {
    policy.update(request).unwrap();
    assert!(policy.currcache().len() <= capacity);
  }
}

#[test]
fn test_every_policy_respects_its_capacity() {
  let requests = zipf_requests(LIBRARY, 0.8, 1500, 1);

  for kind in [EstimatorKind::Exact, EstimatorKind::Lite] {
    assert_bounded(base().estimator(kind).build_freshness().unwrap(), 5, &requests);
    assert_bounded(base().estimator(kind).build_tandem().unwrap(), 10, &requests);
  }
  assert_bounded(
    base().popularity(zipf_popularity(LIBRARY, 0.8)).build_freshness().unwrap(),
    5,
    &requests,
  );
  for rule in [UpdateRule::MarginalCost, UpdateRule::Popularity] {
    assert_bounded(base().update_rule(rule).build_per_item().unwrap(), 5, &requests[..300]);
  }
  assert_bounded(base().sketch(4, 32).build_sketch().unwrap(), 32, &requests);
  assert_bounded(base().sketch(4, 32).sketch_capacity(5).build_sketch().unwrap(), 5, &requests);
}

#[test]
fn test_hits_are_always_fresh() {
  let requests = zipf_requests(LIBRARY, 1.0, 2000, 2);
  let freshness = base().config().freshness.clone().unwrap();
  let mut cache = base().build_freshness().unwrap();

  let mut hits = 0;
  for request in requests {
    let outcome = cache.update(request).unwrap();
    if outcome.hit {
      hits += 1;
      let fetched = cache.fetch_time(request.item).unwrap();
      assert!(fetched + freshness[request.item] >= request.time + 1.0);
    }
  }
  assert!(hits > 0);
}

#[test]
fn test_tandem_tiers_stay_disjoint_and_fresh() {
  let requests = zipf_requests(LIBRARY, 1.0, 2000, 3);
  let freshness = base().config().freshness.clone().unwrap();
  let mut cache = base().build_tandem().unwrap();

  for request in requests {
    let outcome = cache.update(request).unwrap();
    let tier1 = cache.tier(Tier::One);
    let tier2 = cache.tier(Tier::Two);
    assert!(tier1.len() <= 5 && tier2.len() <= 5);
    assert!(tier1.iter().all(|item| !tier2.contains(item)));

    if outcome.is_hit() {
      let fetched = cache.fetch_time(request.item).unwrap();
      assert!(fetched + freshness[request.item] >= request.time + 1.0);
    }
    if outcome.hit[1] {
      assert!(outcome.reached_tier2);
    }
  }
}

#[test]
fn test_higher_fetch_cost_never_lowers_the_rate() {
  let members = [0, 1, 2];
  let mut previous = 0.0;
  for fetch in [0.5, 1.0, 2.0, 5.0, 10.0, 50.0] {
    let opt = base()
      .cost(CostModel::new(fetch, 1.0, 1.0, 1.0).unwrap())
      .popularity(zipf_popularity(LIBRARY, 0.8))
      .build_shared_rate()
      .unwrap();
    let rate = opt.optimal_rate(&members).x;
    assert!(rate >= previous - 1e-6, "rate fell from {previous} to {rate} at C_f = {fetch}");
    previous = rate;
  }
}

#[test]
fn test_shared_rate_members_have_negative_marginal_cost() {
  for exponent in [0.6, 0.8, 1.0, 1.2] {
    for cache_size in [2, 5, 10] {
      let mut opt = base()
        .cache_size(cache_size)
        .popularity(zipf_popularity(LIBRARY, exponent))
        .build_shared_rate()
        .unwrap();
      let plan = opt.solve();
      let mc = opt.marginal_costs();

      let worst_member = plan.members.iter().map(|&i| mc[i]).fold(f64::MIN, f64::max);
      for &member in &plan.members {
        assert!(mc[member] < 0.0);
      }
      for item in (0..LIBRARY).filter(|i| !plan.members.contains(i)) {
        let crowded_out = plan.members.len() == cache_size && mc[item] >= worst_member;
        assert!(mc[item] >= 0.0 || crowded_out, "item {item} should have been cached");
      }
    }
  }
}

#[test]
fn test_exact_counting_replays_identically() {
  let requests = zipf_requests(LIBRARY, 0.9, 1000, 4);
  let run = || {
    let mut counter = ExactCounter::new(LIBRARY).unwrap();
    for request in &requests {
      counter.update(request.item).unwrap();
    }
    counter.distribution()
  };
  assert_eq!(run(), run());
}

#[test]
fn test_same_seed_same_simulation() {
  let requests = zipf_requests(LIBRARY, 0.9, 500, 5);
  let build = || base().estimator(EstimatorKind::Lite).build_tandem().unwrap();
  let (mut a, mut b) = (build(), build());
  for &request in &requests {
    assert_eq!(a.update(request).unwrap(), b.update(request).unwrap());
  }
  assert_eq!(a.metrics(), b.metrics());

  let (mut a, mut b) = (base().build_per_item().unwrap(), base().build_per_item().unwrap());
  assert_eq!(a.rates(), b.rates());
  for &request in &requests[..100] {
    assert_eq!(a.update(request).unwrap(), b.update(request).unwrap());
  }
}

#[test]
fn test_out_of_range_requests_leave_state_untouched() {
  let warmup = zipf_requests(LIBRARY, 0.9, 50, 6);
  let bad = Request::new(LIBRARY, 99.0);
  let expected = RequestError::OutOfRange {
    item: LIBRARY,
    library_size: LIBRARY,
  };

  let mut cache = base().build_freshness().unwrap();
  for &request in &warmup {
    cache.update(request).unwrap();
  }
  let (before, metrics) = (cache.currcache(), cache.metrics());
  assert_eq!(cache.update(bad).unwrap_err(), expected);
  assert_eq!(cache.currcache(), before);
  assert_eq!(cache.metrics(), metrics);

  let mut tandem = base().build_tandem().unwrap();
  assert_eq!(tandem.update(bad).unwrap_err(), expected);
  assert!(tandem.currcache().is_empty());

  let mut opt = base().build_per_item().unwrap();
  assert_eq!(opt.update(bad).unwrap_err(), expected);
  assert_eq!(opt.metrics().requests, 0);

  let mut sketch = base().build_sketch().unwrap();
  assert_eq!(sketch.update(bad).unwrap_err(), expected);
  assert_eq!(sketch.probability(0), 0.0);
}
