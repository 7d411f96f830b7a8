//! Parallel parameter sweeps.
//!
//! Every case gets its own builder, so each simulation owns an independent
//! policy and random source. Results come back in input order.

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::builder::PolicyBuilder;
use crate::error::{BuildError, Result};
use crate::metrics::MetricsSnapshot;
use crate::policy::{self, CachePolicy, Request};

/// Runs `case` once per builder, in parallel.
pub fn run<T, F>(builders: Vec<PolicyBuilder>, case: F) -> Vec<Result<T>>
where
  T: Send,
  F: Fn(PolicyBuilder) -> Result<T> + Sync + Send,
{
  builders.into_par_iter().map(case).collect()
}

/// Builds one policy per builder and replays the same request sequence
/// through each of them.
pub fn replay_each<P, B>(builders: Vec<PolicyBuilder>, build: B, requests: &[Request]) -> Vec<Result<MetricsSnapshot>>
where
  P: CachePolicy,
  B: Fn(PolicyBuilder) -> Result<P, BuildError> + Sync + Send,
{
  run(builders, |builder| {
    let mut policy = build(builder)?;
    let snapshot = policy::replay(&mut policy, requests.iter().copied())?;
    tracing::debug!(requests = snapshot.requests, hit_ratio = snapshot.hit_ratio(), "sweep case finished");
    Ok(snapshot)
  })
}
