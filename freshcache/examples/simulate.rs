use fibre_freshcache::freshness::TandemAction;
use fibre_freshcache::{policy, rng, CachePolicy, CostModel, EstimatorKind, PolicyBuilder, Request};
use rand_distr::{Distribution, Zipf};
use tracing_subscriber::EnvFilter;

const LIBRARY: usize = 200;

fn main() {
  // RUST_LOG=fibre_freshcache=debug shows every admission decision.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let mut rng = rng::seeded(2024);
  let zipf = Zipf::new(LIBRARY as f64, 0.9).expect("valid Zipf parameters");
  let requests: Vec<Request> = (0..5_000)
    .map(|t| Request::new(zipf.sample(&mut rng) as usize - 1, t as f64))
    .collect();

  let builder = PolicyBuilder::new()
    .library_size(LIBRARY)
    .cache_size(10)
    .tier2_size(10)
    .freshness((0..LIBRARY).map(|i| 50.0 + (i % 5) as f64 * 25.0).collect())
    .cost(CostModel::new(10.0, 1.0, 1.0, 1.0).expect("valid costs"));

  for kind in [EstimatorKind::Exact, EstimatorKind::Lite] {
    let mut cache = builder.clone().estimator(kind).build_freshness().expect("Failed to build cache");
    let metrics = policy::replay(&mut cache, requests.iter().copied()).expect("requests are in range");
    println!("\n== single tier, {kind:?} counting ({} counters)", cache.counters_used());
    println!("{metrics}");
  }

  let mut tandem = builder.clone().build_tandem().expect("Failed to build tandem cache");
  let mut swaps = 0;
  for &request in &requests {
    let outcome = tandem.update(request).expect("requests are in range");
    if matches!(outcome.action, TandemAction::Swapped { .. }) {
      swaps += 1;
    }
  }
  println!("\n== tandem, exact counting ({swaps} swaps)");
  println!("{}", tandem.metrics());

  let popularity: Vec<f64> = {
    let weights: Vec<f64> = (1..=LIBRARY).map(|k| (k as f64).powf(-0.9)).collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
  };
  let mut optimizer = builder
    .popularity(popularity)
    .build_shared_rate()
    .expect("Failed to build optimizer");
  let plan = optimizer.solve();
  println!(
    "\n== shared refresh rate {:.4}, cost {:.4}, {} items cached, converged: {}",
    plan.rate,
    plan.average_cost,
    plan.members.len(),
    plan.convergence.converged
  );
}
