use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use fibre_freshcache::{
  policy, rng, CachePolicy, CostModel, EstimatorKind, PolicyBuilder, Request, UpdateRule,
};
use rand_distr::{Distribution, Zipf};

const LIBRARY: usize = 1_000;
const REQUESTS: usize = 10_000;

fn zipf_requests(exponent: f64, seed: u64) -> Vec<Request> {
  let mut rng = rng::seeded(seed);
  // The new Zipf distribution requires a f64 for the library size.
  let zipf = Zipf::new(LIBRARY as f64, exponent).unwrap();
  (0..REQUESTS)
    .map(|t| Request::new(zipf.sample(&mut rng) as usize - 1, t as f64))
    .collect()
}

fn base() -> PolicyBuilder {
  PolicyBuilder::new()
    .library_size(LIBRARY)
    .cache_size(50)
    .tier2_size(50)
    .uniform_freshness(200.0)
    .cost(CostModel::new(10.0, 1.0, 1.0, 1.0).unwrap())
}

fn replay<P: CachePolicy>(mut policy: P, requests: &[Request]) {
  black_box(policy::replay(&mut policy, requests.iter().copied()).unwrap());
}

fn bench_freshness(c: &mut Criterion) {
  let requests = zipf_requests(0.9, 1);
  let mut group = c.benchmark_group("freshness");
  group.throughput(Throughput::Elements(REQUESTS as u64));

  for kind in [EstimatorKind::Exact, EstimatorKind::Lite] {
    group.bench_function(format!("single_{kind:?}"), |b| {
      b.iter_batched(
        || base().estimator(kind).build_freshness().unwrap(),
        |cache| replay(cache, &requests),
        BatchSize::LargeInput,
      )
    });
    group.bench_function(format!("tandem_{kind:?}"), |b| {
      b.iter_batched(
        || base().estimator(kind).build_tandem().unwrap(),
        |cache| replay(cache, &requests),
        BatchSize::LargeInput,
      )
    });
  }
  group.finish();
}

fn bench_optimizers(c: &mut Criterion) {
  let requests = zipf_requests(0.9, 2);
  let mut group = c.benchmark_group("optimizer");

  let popularity: Vec<f64> = {
    let weights: Vec<f64> = (1..=LIBRARY).map(|k| (k as f64).powf(-0.9)).collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
  };
  group.bench_function("shared_rate_solve", |b| {
    b.iter_batched(
      || base().popularity(popularity.clone()).build_shared_rate().unwrap(),
      |mut opt| black_box(opt.solve()),
      BatchSize::SmallInput,
    )
  });

  group.throughput(Throughput::Elements(1_000));
  for rule in [UpdateRule::MarginalCost, UpdateRule::Popularity] {
    group.bench_function(format!("per_item_{rule:?}"), |b| {
      b.iter_batched(
        || base().update_rule(rule).build_per_item().unwrap(),
        |opt| replay(opt, &requests[..1_000]),
        BatchSize::LargeInput,
      )
    });
  }
  group.finish();
}

fn bench_sketch(c: &mut Criterion) {
  let requests = zipf_requests(0.9, 3);
  let mut group = c.benchmark_group("sketch");
  group.throughput(Throughput::Elements(REQUESTS as u64));
  group.bench_function("sketch_cache", |b| {
    b.iter_batched(
      || base().sketch(5, 32).build_sketch().unwrap(),
      |cache| replay(cache, &requests),
      BatchSize::LargeInput,
    )
  });
  group.finish();
}

criterion_group!(benches, bench_freshness, bench_optimizers, bench_sketch);
criterion_main!(benches);
