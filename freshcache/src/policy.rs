use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::RequestError;
use crate::metrics::MetricsSnapshot;
use crate::ItemId;

/// One observed request: which item, and when it arrived.
///
/// `time` is in the same units as the freshness budgets (request count or
/// wall-clock time, at the caller's choice).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Request {
  pub item: ItemId,
  pub time: f64,
}

impl Request {
  pub fn new(item: ItemId, time: f64) -> Self {
    Self { item, time }
  }
}

/// Classification of a cache miss, used for cost accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MissType {
  /// The cache had spare capacity and the item was fetched into it.
  FreshnessAdmit,
  /// The item was cached but its copy exceeded its freshness budget and
  /// was refreshed in place.
  StaleRefresh,
  /// The item was not cached.
  NotCached,
}

impl fmt::Display for MissType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MissType::FreshnessAdmit => write!(f, "admitted into spare capacity"),
      MissType::StaleRefresh => write!(f, "refreshed a stale copy"),
      MissType::NotCached => write!(f, "not cached"),
    }
  }
}

/// The outcome of one request against a policy without freshness budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Admission {
  /// The item was already cached when the request arrived.
  pub hit: bool,
  /// The item entered the cache on this request.
  pub admitted: bool,
  /// The member displaced to make room, if any.
  pub evicted: Option<ItemId>,
}

impl Admission {
  pub(crate) const HIT: Admission = Admission {
    hit: true,
    admitted: false,
    evicted: None,
  };

  pub(crate) const REJECTED: Admission = Admission {
    hit: false,
    admitted: false,
    evicted: None,
  };

  pub(crate) fn admitted(evicted: Option<ItemId>) -> Self {
    Self {
      hit: false,
      admitted: true,
      evicted,
    }
  }
}

/// The capability shared by every request-driven caching policy.
///
/// Variants are independent types; composite policies (such as the tandem
/// cache) delegate to shared building blocks instead of extending another
/// policy.
pub trait CachePolicy {
  /// The per-request result reported to the caller.
  type Outcome;

  /// Serves one request, updating the policy's estimates and contents.
  ///
  /// Fails with [`RequestError::OutOfRange`] before touching any state if
  /// the item is not part of the library.
  fn update(&mut self, request: Request) -> Result<Self::Outcome, RequestError>;

  /// Returns the current cache contents in ascending item order.
  fn currcache(&self) -> Vec<ItemId>;

  /// Returns the policy's current popularity estimate for `item`.
  ///
  /// Items the policy has never observed have probability `0.0`.
  fn probability(&self, item: ItemId) -> f64;

  /// Returns a snapshot of the policy's counters.
  fn metrics(&self) -> MetricsSnapshot;
}

/// Drives `policy` through `requests` in order and returns its final counters.
///
/// Stops at the first out-of-range request; earlier requests stay applied.
pub fn replay<P, I>(policy: &mut P, requests: I) -> Result<MetricsSnapshot, RequestError>
where
  P: CachePolicy + ?Sized,
  I: IntoIterator<Item = Request>,
{
  for request in requests {
    policy.update(request)?;
  }
  Ok(policy.metrics())
}
